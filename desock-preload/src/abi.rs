//! Exported C ABI.
//!
//! Symbols are only unmangled outside of unit tests, so the test harness keeps
//! the real libc `poll`/`select`.

use std::ffi::c_int;

use desock::AsErrno;
use desock::gate::fatal;
use libc::{fd_set, nfds_t, pollfd, sigset_t, timespec, timeval};

use crate::{context, shim};

/// `poll(2)` over desocketed descriptors.
///
/// # Safety
/// Same contract as `poll(2)`.
#[cfg_attr(not(test), unsafe(no_mangle))]
pub unsafe extern "C" fn poll(fds: *mut pollfd, nfds: nfds_t, timeout: c_int) -> c_int {
    unsafe { shim::poll(context(), fds, nfds, timeout) }
}

/// `ppoll(2)` over desocketed descriptors.
///
/// # Safety
/// Same contract as `ppoll(2)`.
#[cfg_attr(not(test), unsafe(no_mangle))]
pub unsafe extern "C" fn ppoll(
    fds: *mut pollfd,
    nfds: nfds_t,
    timeout: *const timespec,
    mask: *const sigset_t,
) -> c_int {
    unsafe { shim::ppoll(context(), fds, nfds, timeout, mask) }
}

/// `select(2)` over desocketed descriptors.
///
/// # Safety
/// Same contract as `select(2)`.
#[cfg_attr(not(test), unsafe(no_mangle))]
pub unsafe extern "C" fn select(
    n: c_int,
    readfds: *mut fd_set,
    writefds: *mut fd_set,
    exceptfds: *mut fd_set,
    timeout: *mut timeval,
) -> c_int {
    unsafe { shim::select(context(), n, readfds, writefds, exceptfds, timeout) }
}

/// `pselect(2)` over desocketed descriptors.
///
/// # Safety
/// Same contract as `pselect(2)`.
#[cfg_attr(not(test), unsafe(no_mangle))]
pub unsafe extern "C" fn pselect(
    n: c_int,
    readfds: *mut fd_set,
    writefds: *mut fd_set,
    exceptfds: *mut fd_set,
    timeout: *const timespec,
    mask: *const sigset_t,
) -> c_int {
    unsafe { shim::pselect(context(), n, readfds, writefds, exceptfds, timeout, mask) }
}

/// Record `fd` as desocketed; `listening != 0` marks a server descriptor.
#[cfg_attr(not(test), unsafe(no_mangle))]
pub extern "C" fn desock_register(fd: c_int, listening: c_int) -> c_int {
    match context().table().register(fd, listening != 0) {
        Ok(()) => 0,
        Err(e) => {
            e.errno().set();
            -1
        }
    }
}

/// Switch a registered descriptor into or out of listening mode (`listen()`).
#[cfg_attr(not(test), unsafe(no_mangle))]
pub extern "C" fn desock_set_listening(fd: c_int, listening: c_int) -> c_int {
    match context().table().set_listening(fd, listening != 0) {
        Ok(()) => 0,
        Err(e) => {
            e.errno().set();
            -1
        }
    }
}

/// Forget `fd` after the application closed it.
#[cfg_attr(not(test), unsafe(no_mangle))]
pub extern "C" fn desock_unregister(fd: c_int) {
    context().table().unregister(fd);
}

/// Consume the admission permit without blocking (explicit `accept`).
/// Returns 1 when admitted, 0 when the virtual connection is already taken.
#[cfg_attr(not(test), unsafe(no_mangle))]
pub extern "C" fn desock_try_admit() -> c_int {
    match context().gate().try_admit() {
        Ok(admitted) => c_int::from(admitted),
        Err(e) => fatal("accept", e),
    }
}

/// Block until the admission permit is released, then consume it.
#[cfg_attr(not(test), unsafe(no_mangle))]
pub extern "C" fn desock_block_until_admit() {
    if let Err(e) = context().gate().block_until_admit() {
        fatal("accept", e);
    }
}

/// Return the admission permit once the virtual connection is torn down.
#[cfg_attr(not(test), unsafe(no_mangle))]
pub extern "C" fn desock_release_connection() {
    context().gate().release();
}

/// Whether the last multiplexing call hid an exhausted listener; clears the flag.
#[cfg_attr(not(test), unsafe(no_mangle))]
pub extern "C" fn desock_accept_should_block() -> c_int {
    c_int::from(context().gate().take_pending_block())
}

#[cfg(test)]
mod tests {
    use desock::DescriptorClassifier;
    use nix::errno::Errno;

    use super::*;

    // These share the process-wide context, so each test uses its own fds.

    #[test]
    fn register_rejects_negative_fd() {
        assert_eq!(desock_register(-4, 0), -1);
        assert_eq!(Errno::last(), Errno::EBADF);
    }

    #[test]
    fn set_listening_requires_registration() {
        assert_eq!(desock_set_listening(9001, 1), -1);
        assert_eq!(Errno::last(), Errno::EBADF);

        assert_eq!(desock_register(9001, 0), 0);
        assert_eq!(desock_set_listening(9001, 1), 0);
        assert!(context().table().is_listening(9001));
        desock_unregister(9001);
        assert!(context().table().get(9001).is_none());
    }

    #[test]
    fn accept_side_gate_hooks() {
        assert_eq!(desock_try_admit(), 1);
        assert_eq!(desock_try_admit(), 0);

        context().gate().mark_pending_block();
        assert_eq!(desock_accept_should_block(), 1);
        assert_eq!(desock_accept_should_block(), 0);

        desock_release_connection();
        desock_block_until_admit();
        assert_eq!(desock_try_admit(), 0);
    }
}
