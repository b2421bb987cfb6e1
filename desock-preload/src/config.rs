//! Environment configuration, read once when the library is first used.

/// Output format for diagnostics on stderr.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesockConfig {
    /// Full `EnvFilter` directive from `RUST_LOG`; overrides `level`.
    pub filter: Option<String>,
    pub level: &'static str,
    pub format: LogFormat,
}

impl Default for DesockConfig {
    fn default() -> Self {
        Self {
            filter: None,
            level: "warn",
            format: LogFormat::Text,
        }
    }
}

impl DesockConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let level = match lookup("DESOCK_LOG").as_deref() {
            Some("trace") => "trace",
            Some("debug") => "debug",
            Some("info") => "info",
            Some("error") => "error",
            Some("off") => "off",
            _ => "warn",
        };

        let format = match lookup("DESOCK_LOG_FORMAT").as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        Self {
            filter: lookup("RUST_LOG").filter(|f| !f.is_empty()),
            level,
            format,
        }
    }

    /// The directive handed to `EnvFilter`.
    pub fn filter_directive(&self) -> String {
        match &self.filter {
            Some(filter) => filter.clone(),
            None => format!("desock={level},desock_preload={level}", level = self.level),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> DesockConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        DesockConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_to_warn_text() {
        let defaults = config(&[]);
        assert_eq!(defaults, DesockConfig::default());
        assert_eq!(defaults.filter_directive(), "desock=warn,desock_preload=warn");
    }

    #[test]
    fn desock_log_sets_level() {
        let debug = config(&[("DESOCK_LOG", "debug"), ("DESOCK_LOG_FORMAT", "json")]);
        assert_eq!(debug.level, "debug");
        assert_eq!(debug.format, LogFormat::Json);
        assert_eq!(debug.filter_directive(), "desock=debug,desock_preload=debug");
    }

    #[test]
    fn unknown_level_falls_back_to_warn() {
        let unknown = config(&[("DESOCK_LOG", "verbose"), ("DESOCK_LOG_FORMAT", "yaml")]);
        assert_eq!(unknown.level, "warn");
        assert_eq!(unknown.format, LogFormat::Text);
    }

    #[test]
    fn rust_log_wins() {
        let explicit = config(&[("DESOCK_LOG", "debug"), ("RUST_LOG", "desock::synth=trace")]);
        assert_eq!(explicit.filter_directive(), "desock::synth=trace");

        let empty = config(&[("RUST_LOG", "")]);
        assert_eq!(empty.filter, None);
    }
}
