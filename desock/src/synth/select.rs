use std::ffi::c_int;

use libc::fd_set;

use super::{Admission, Synthesized, admit_listener};
use crate::gate::AdmissionGate;
use crate::table::DescriptorClassifier;

/// The up-to-three descriptor sets of a `select`/`pselect` call.
#[derive(Default)]
pub struct WatchSets<'a> {
    pub readable: Option<&'a mut fd_set>,
    pub writable: Option<&'a mut fd_set>,
    pub exceptional: Option<&'a mut fd_set>,
}

impl WatchSets<'_> {
    /// All three sets absent (a plain sleep).
    pub fn is_empty(&self) -> bool {
        self.readable.is_none() && self.writable.is_none() && self.exceptional.is_none()
    }
}

fn upper_bound(n: c_int) -> c_int {
    n.clamp(0, libc::FD_SETSIZE as c_int)
}

fn contains(set: &Option<&mut fd_set>, fd: c_int) -> bool {
    // SAFETY: `fd` is within `[0, FD_SETSIZE)` and `set` is a valid reference.
    set.as_deref()
        .is_some_and(|set| unsafe { libc::FD_ISSET(fd, set) })
}

fn remove(set: &mut Option<&mut fd_set>, fd: c_int) {
    if let Some(set) = set.as_deref_mut() {
        // SAFETY: as in `contains`.
        unsafe { libc::FD_CLR(fd, set) };
    }
}

/// Whether any readable or writable member of `[0, n)` is desocketed.
pub fn has_desock_fds<C>(n: c_int, sets: &WatchSets<'_>, classifier: &C) -> bool
where
    C: DescriptorClassifier + ?Sized,
{
    (0..upper_bound(n)).any(|fd| {
        (contains(&sets.readable, fd) || contains(&sets.writable, fd))
            && classifier.is_desocketed(fd)
    })
}

/// Fabricate `select` results in place.
///
/// Readable members stay set when desocketed, writable members when
/// desocketed and not listening; everything else is cleared. The exceptional
/// set is always emptied. A listening descriptor in the readable set goes
/// through the admission gate.
pub fn synthesize_select<C>(
    n: c_int,
    sets: &mut WatchSets<'_>,
    classifier: &C,
    gate: &AdmissionGate,
) -> Synthesized
where
    C: DescriptorClassifier + ?Sized,
{
    let mut ready = 0;
    let mut listener = None;

    for fd in 0..upper_bound(n) {
        let readable = contains(&sets.readable, fd);
        let writable = contains(&sets.writable, fd);
        if !readable && !writable {
            continue;
        }

        let class = classifier.classify(fd);
        tracing::trace!(fd, ?class, readable, writable, "select member");

        if readable {
            if class.is_desocketed() {
                if class.is_listening() {
                    listener = Some(fd);
                }
                ready += 1;
            } else {
                remove(&mut sets.readable, fd);
            }
        }

        if writable {
            if class.is_desocketed() && !class.is_listening() {
                ready += 1;
            } else {
                remove(&mut sets.writable, fd);
            }
        }
    }

    if let Some(set) = sets.exceptional.as_deref_mut() {
        // SAFETY: `set` is a valid, exclusively borrowed fd_set.
        unsafe { libc::FD_ZERO(set) };
    }

    if let Some(fd) = listener
        && admit_listener("select", gate, ready) == Admission::Suppressed
    {
        remove(&mut sets.readable, fd);
        ready -= 1;
    }

    Synthesized { ready }
}
