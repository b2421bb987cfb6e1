//! Descriptor classification.
//!
//! The substitution layer (socket/accept/connect replacements) records every
//! descriptor it hands out in place of a real socket. The synthesizers only
//! ever query it through [`DescriptorClassifier`].

use std::os::fd::RawFd;

use dashmap::DashMap;

use crate::error::TableError;

/// How a descriptor participates in readiness emulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Not desocketed; readiness is owned by the kernel.
    Foreign,
    /// Desocketed stream endpoint; always readable and writable.
    Desocketed,
    /// Desocketed server endpoint awaiting its one virtual connection.
    Listening,
}

impl Classification {
    pub fn is_desocketed(self) -> bool {
        !matches!(self, Classification::Foreign)
    }

    pub fn is_listening(self) -> bool {
        matches!(self, Classification::Listening)
    }
}

/// Read-only view of the descriptor substitution state.
pub trait DescriptorClassifier: Send + Sync {
    fn classify(&self, fd: RawFd) -> Classification;

    fn is_desocketed(&self, fd: RawFd) -> bool {
        self.classify(fd).is_desocketed()
    }

    /// Only meaningful for desocketed descriptors; foreign ones are never listening.
    fn is_listening(&self, fd: RawFd) -> bool {
        self.classify(fd).is_listening()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DescriptorRecord {
    pub listening: bool,
}

/// Process-wide table of desocketed descriptors.
#[derive(Debug, Default)]
pub struct FdTable {
    records: DashMap<RawFd, DescriptorRecord>,
}

impl FdTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `fd` as desocketed. Re-registering replaces the previous record.
    pub fn register(&self, fd: RawFd, listening: bool) -> Result<(), TableError> {
        if fd < 0 {
            return Err(TableError::InvalidDescriptor(fd));
        }
        if self.records.insert(fd, DescriptorRecord { listening }).is_some() {
            tracing::debug!(fd, listening, "Replaced desocketed descriptor record");
        } else {
            tracing::debug!(fd, listening, "Registered desocketed descriptor");
        }
        Ok(())
    }

    pub fn set_listening(&self, fd: RawFd, listening: bool) -> Result<(), TableError> {
        let mut record = self
            .records
            .get_mut(&fd)
            .ok_or(TableError::UnknownDescriptor(fd))?;
        record.listening = listening;
        tracing::debug!(fd, listening, "Updated listening mode");
        Ok(())
    }

    /// Forget `fd` (closed by the application). Returns the dropped record, if any.
    pub fn unregister(&self, fd: RawFd) -> Option<DescriptorRecord> {
        let removed = self.records.remove(&fd).map(|(_, record)| record);
        if removed.is_some() {
            tracing::debug!(fd, "Unregistered desocketed descriptor");
        }
        removed
    }

    pub fn get(&self, fd: RawFd) -> Option<DescriptorRecord> {
        self.records.get(&fd).map(|r| *r)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl DescriptorClassifier for FdTable {
    fn classify(&self, fd: RawFd) -> Classification {
        match self.get(fd) {
            None => Classification::Foreign,
            Some(DescriptorRecord { listening: true }) => Classification::Listening,
            Some(DescriptorRecord { listening: false }) => Classification::Desocketed,
        }
    }
}
