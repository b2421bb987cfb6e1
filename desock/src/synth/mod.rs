//! Readiness synthesis for desocketed descriptors.
//!
//! Phase one of every multiplexing call: rewrite the caller's watch set in
//! place and count the descriptors reported ready. No kernel I/O happens here.
//! When the count is zero the dispatch layer runs phase two, the genuine
//! kernel call, over the caller's original watch set.

mod poll;
mod select;

pub use poll::synthesize_poll;
pub use select::{WatchSets, has_desock_fds, synthesize_select};

use crate::gate::{AdmissionGate, fatal};

/// Outcome of phase one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Synthesized {
    pub ready: usize,
}

impl Synthesized {
    /// Nothing was fabricated; the kernel must decide (and honor the timeout).
    pub fn needs_real_wait(&self) -> bool {
        self.ready == 0
    }
}

/// What happens to the listening descriptor's "connection pending" readiness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Admission {
    /// The permit was consumed; readiness stands.
    Admitted,
    /// The permit is exhausted and other descriptors are ready; hide the listener.
    Suppressed,
}

/// Gate the listening descriptor of one call. `ready` counts it already.
pub(crate) fn admit_listener(call: &'static str, gate: &AdmissionGate, ready: usize) -> Admission {
    gate.clear_pending_block();

    match gate.try_admit() {
        Ok(true) => Admission::Admitted,
        Ok(false) if ready <= 1 => {
            // Only the listener is of interest: nothing else can make progress,
            // so sleep until the virtual connection is released.
            tracing::debug!(call, "Listener exhausted and alone, blocking for admission");
            if let Err(e) = gate.block_until_admit() {
                fatal(call, e);
            }
            Admission::Admitted
        }
        Ok(false) => {
            gate.mark_pending_block();
            tracing::debug!(call, ready, "Listener exhausted, suppressing readiness");
            Admission::Suppressed
        }
        Err(e) => fatal(call, e),
    }
}
