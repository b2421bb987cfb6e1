use nix::errno::Errno;
use thiserror::Error;

/// Rejected caller-supplied timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TimeoutError {
    #[error("negative timeout seconds: {0}")]
    NegativeSeconds(i64),

    #[error("negative sub-second timeout component: {0}")]
    NegativeFraction(i64),

    #[error("sub-second timeout component out of range: {0}")]
    FractionOutOfRange(i64),
}

/// Failure of the admission permit primitive itself (not "no permit available").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GateError {
    #[error("admission permit primitive has been closed")]
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TableError {
    #[error("invalid descriptor: {0}")]
    InvalidDescriptor(i32),

    #[error("descriptor {0} is not desocketed")]
    UnknownDescriptor(i32),
}

/// Maps a rejected operation onto the errno the C ABI reports.
pub trait AsErrno {
    fn errno(&self) -> Errno;
}

impl AsErrno for TimeoutError {
    fn errno(&self) -> Errno {
        Errno::EINVAL
    }
}

impl AsErrno for TableError {
    fn errno(&self) -> Errno {
        Errno::EBADF
    }
}
