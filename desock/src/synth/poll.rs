use libc::{POLLIN, POLLOUT, pollfd};

use super::{Admission, Synthesized, admit_listener};
use crate::gate::AdmissionGate;
use crate::table::{Classification, DescriptorClassifier};

/// Fabricate `revents` for a `poll`/`ppoll` watch set.
///
/// Desocketed descriptors get whatever read/write interest they asked for;
/// listening ones never report `POLLOUT` and their `POLLIN` goes through the
/// admission gate. Foreign descriptors are left at zero for the kernel.
pub fn synthesize_poll<C>(
    fds: &mut [pollfd],
    classifier: &C,
    gate: &AdmissionGate,
) -> Synthesized
where
    C: DescriptorClassifier + ?Sized,
{
    let mut ready = 0;
    let mut listener = None;

    for (i, entry) in fds.iter_mut().enumerate() {
        let class = classifier.classify(entry.fd);
        entry.revents = match class {
            Classification::Foreign => 0,
            Classification::Desocketed => entry.events & (POLLIN | POLLOUT),
            Classification::Listening => {
                let revents = entry.events & POLLIN;
                if revents != 0 {
                    listener = Some(i);
                }
                revents
            }
        };
        tracing::trace!(fd = entry.fd, ?class, revents = entry.revents, "poll entry");

        if entry.revents != 0 {
            ready += 1;
        }
    }

    if let Some(i) = listener
        && admit_listener("poll", gate, ready) == Admission::Suppressed
    {
        fds[i].revents = 0;
        ready -= 1;
    }

    Synthesized { ready }
}
