//! desock-preload: `LD_PRELOAD` shim over the desock readiness core.
//!
//! Exports `poll`, `ppoll`, `select` and `pselect` with the platform's
//! signatures, plus the registration hooks the descriptor substitution layer
//! uses to describe the descriptors it hands out.

mod abi;
mod config;
mod kernel;
pub mod shim;

use std::sync::LazyLock;

use desock::DesockContext;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub use abi::*;
pub use config::{DesockConfig, LogFormat};

static CONTEXT: LazyLock<DesockContext> = LazyLock::new(|| {
    let config = DesockConfig::from_env();
    init_tracing(&config);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "desock loaded");
    DesockContext::new()
});

/// The process-wide context behind the exported symbols.
pub fn context() -> &'static DesockContext {
    &CONTEXT
}

/// Initialize tracing with DESOCK_LOG and DESOCK_LOG_FORMAT support.
///
/// Silently yields to a subscriber the host process already installed.
fn init_tracing(config: &DesockConfig) {
    let filter = EnvFilter::try_new(config.filter_directive())
        .unwrap_or_else(|_| EnvFilter::new(DesockConfig::default().filter_directive()));

    match config.format {
        LogFormat::Json => {
            let subscriber = tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr));
            let _ = subscriber.try_init();
        }
        LogFormat::Text => {
            let subscriber = tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr));
            let _ = subscriber.try_init();
        }
    }
}
