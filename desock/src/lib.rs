//! desock: readiness emulation for desocketed descriptors.
//!
//! A desocketed descriptor is a pipe, file or stdio descriptor standing in for
//! a network socket. This crate decides what `poll`/`select` report for them
//! and serializes the single virtual "connection accepted" event on a
//! listening descriptor across concurrent callers.

mod context;
pub mod error;
pub mod gate;
pub mod synth;
pub mod table;
pub mod timeout;

pub use context::DesockContext;
pub use error::{AsErrno, GateError, TableError, TimeoutError};
pub use gate::{AdmissionGate, GateSnapshot};
pub use synth::{Synthesized, WatchSets};
pub use table::{Classification, DescriptorClassifier, DescriptorRecord, FdTable};
pub use timeout::KernelTimeout;
