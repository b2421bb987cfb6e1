//! Admission gate: the single virtual connection on a listening descriptor.
//!
//! A counting permit starts at one. The first multiplexing call (or explicit
//! accept) that finds a listening descriptor ready consumes it; only an
//! external release (the virtual connection being torn down) brings it back.
//!
//! The sticky `pending_block` flag tells the accept implementation that the
//! most recent multiplexing call hid a listening descriptor because the permit
//! was exhausted, so accept must wait instead of returning immediately.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use tokio::sync::{Semaphore, TryAcquireError};

use crate::error::GateError;

/// Point-in-time view of the gate, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GateSnapshot {
    pub permits: usize,
    pub pending_block: bool,
}

pub struct AdmissionGate {
    permits: Semaphore,
    pending_block: AtomicBool,
    /// Serializes releases so the permit never exceeds one.
    release_lock: Mutex<()>,
}

impl AdmissionGate {
    pub const INITIAL_PERMITS: usize = 1;

    pub fn new() -> Self {
        Self {
            permits: Semaphore::new(Self::INITIAL_PERMITS),
            pending_block: AtomicBool::new(false),
            release_lock: Mutex::new(()),
        }
    }

    /// Consume the permit if one is available. Never blocks.
    ///
    /// `Ok(false)` means the virtual connection was already admitted.
    pub fn try_admit(&self) -> Result<bool, GateError> {
        match self.permits.try_acquire() {
            Ok(permit) => {
                permit.forget();
                tracing::debug!("Admission permit consumed");
                Ok(true)
            }
            Err(TryAcquireError::NoPermits) => Ok(false),
            Err(TryAcquireError::Closed) => Err(GateError::Closed),
        }
    }

    /// Park the calling thread until a permit is released, then consume it.
    pub fn block_until_admit(&self) -> Result<(), GateError> {
        tracing::debug!("Waiting for admission permit");
        let permit = futures::executor::block_on(self.permits.acquire())
            .map_err(|_| GateError::Closed)?;
        permit.forget();
        tracing::debug!("Admission permit consumed after wait");
        Ok(())
    }

    /// Return the permit after the virtual connection is torn down.
    ///
    /// A no-op when a permit is already outstanding.
    pub fn release(&self) {
        let _guard = self
            .release_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if self.permits.available_permits() < Self::INITIAL_PERMITS {
            self.permits.add_permits(1);
            tracing::debug!("Admission permit released");
        } else {
            tracing::warn!("Admission permit released while already available");
        }
    }

    pub fn mark_pending_block(&self) {
        self.pending_block.store(true, Ordering::Release);
    }

    pub fn is_pending_block(&self) -> bool {
        self.pending_block.load(Ordering::Acquire)
    }

    pub fn clear_pending_block(&self) {
        self.pending_block.store(false, Ordering::Release);
    }

    /// Read and clear `pending_block` in one step (accept side).
    pub fn take_pending_block(&self) -> bool {
        self.pending_block.swap(false, Ordering::AcqRel)
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    pub fn snapshot(&self) -> GateSnapshot {
        GateSnapshot {
            permits: self.available(),
            pending_block: self.is_pending_block(),
        }
    }
}

/// Admission state is undefined past a gate failure; terminate the process.
pub fn fatal(call: &'static str, error: GateError) -> ! {
    tracing::error!(call, error = %error, "Admission gate failure, aborting");
    std::process::abort()
}

impl Default for AdmissionGate {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AdmissionGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snapshot = self.snapshot();
        f.debug_struct("AdmissionGate")
            .field("permits", &snapshot.permits)
            .field("pending_block", &snapshot.pending_block)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc;
    use std::time::Duration;

    use super::*;

    #[test]
    fn starts_with_one_permit() {
        let gate = AdmissionGate::new();
        insta::assert_json_snapshot!(gate.snapshot(), @r#"
        {
          "permits": 1,
          "pending_block": false
        }
        "#);
    }

    #[test]
    fn try_admit_consumes_once() {
        let gate = AdmissionGate::new();
        assert_eq!(gate.try_admit(), Ok(true));
        assert_eq!(gate.try_admit(), Ok(false));
        assert_eq!(gate.try_admit(), Ok(false));
        assert_eq!(gate.available(), 0);
    }

    #[test]
    fn release_rearms_but_never_exceeds_one() {
        let gate = AdmissionGate::new();
        gate.release();
        assert_eq!(gate.available(), 1);

        assert_eq!(gate.try_admit(), Ok(true));
        gate.release();
        gate.release();
        assert_eq!(gate.available(), 1);
        assert_eq!(gate.try_admit(), Ok(true));
        assert_eq!(gate.try_admit(), Ok(false));
    }

    #[test]
    fn closed_permit_is_an_error() {
        let gate = AdmissionGate::new();
        gate.permits.close();
        assert_eq!(gate.try_admit(), Err(GateError::Closed));
        assert_eq!(gate.block_until_admit(), Err(GateError::Closed));
    }

    #[test]
    fn pending_block_is_sticky_until_cleared() {
        let gate = AdmissionGate::new();
        assert!(!gate.is_pending_block());

        gate.mark_pending_block();
        assert!(gate.is_pending_block());
        assert!(gate.is_pending_block());

        gate.clear_pending_block();
        assert!(!gate.is_pending_block());

        gate.mark_pending_block();
        assert!(gate.take_pending_block());
        assert!(!gate.take_pending_block());
    }

    #[test]
    fn exactly_one_concurrent_admission() {
        let gate = Arc::new(AdmissionGate::new());
        let admitted = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let gate = Arc::clone(&gate);
                let admitted = Arc::clone(&admitted);
                std::thread::spawn(move || {
                    if gate.try_admit().unwrap() {
                        admitted.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(admitted.load(Ordering::SeqCst), 1);
        assert_eq!(gate.available(), 0);
    }

    #[test]
    fn block_until_admit_waits_for_release() {
        let gate = Arc::new(AdmissionGate::new());
        assert_eq!(gate.try_admit(), Ok(true));

        let (tx, rx) = mpsc::channel();
        let waiter = {
            let gate = Arc::clone(&gate);
            std::thread::spawn(move || {
                gate.block_until_admit().unwrap();
                tx.send(()).unwrap();
            })
        };

        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());

        gate.release();
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        waiter.join().unwrap();
        assert_eq!(gate.available(), 0);
    }
}
