//! Dispatch for the intercepted multiplexing calls.
//!
//! Every entry point runs in two phases: synthesize readiness for desocketed
//! descriptors, and only when nothing was fabricated hand the caller's
//! original arguments to the kernel. The context is explicit so tests can
//! drive independent instances.

use std::ffi::c_int;
use std::ptr;

use desock::{AsErrno, DesockContext, KernelTimeout, Synthesized, TimeoutError, WatchSets};
use libc::{fd_set, nfds_t, pollfd, sigset_t, timespec, timeval};
use nix::errno::Errno;

use crate::kernel;

/// # Safety
/// `fds` must point to `nfds` valid entries (or be null with `nfds == 0`).
pub unsafe fn poll(ctx: &DesockContext, fds: *mut pollfd, nfds: nfds_t, timeout: c_int) -> c_int {
    tracing::debug!(?fds, nfds, timeout, "poll");

    if let Some(entries) = unsafe { entries(fds, nfds) } {
        let synthesized = ctx.synthesize_poll(entries);
        if !synthesized.needs_real_wait() {
            return ready_count("poll", synthesized);
        }
    }

    passthrough("poll", unsafe { kernel::poll(fds, nfds, timeout) })
}

/// # Safety
/// As [`poll`]; `timeout` and `mask` null or valid.
pub unsafe fn ppoll(
    ctx: &DesockContext,
    fds: *mut pollfd,
    nfds: nfds_t,
    timeout: *const timespec,
    mask: *const sigset_t,
) -> c_int {
    tracing::debug!(?fds, nfds, ?timeout, ?mask, "ppoll");

    if let Some(entries) = unsafe { entries(fds, nfds) } {
        let synthesized = ctx.synthesize_poll(entries);
        if !synthesized.needs_real_wait() {
            return ready_count("ppoll", synthesized);
        }
    }

    passthrough("ppoll", unsafe { kernel::ppoll(fds, nfds, timeout, mask) })
}

/// # Safety
/// Each set pointer is null or points to a valid `fd_set`; `timeout` null or valid.
pub unsafe fn select(
    ctx: &DesockContext,
    n: c_int,
    readfds: *mut fd_set,
    writefds: *mut fd_set,
    exceptfds: *mut fd_set,
    timeout: *mut timeval,
) -> c_int {
    tracing::debug!(n, ?readfds, ?writefds, ?exceptfds, ?timeout, "select");

    let timeout = match unsafe { timeout.as_ref() } {
        None => None,
        Some(tv) => match KernelTimeout::from_timeval(tv.tv_sec.into(), tv.tv_usec.into()) {
            Ok(t) => Some(t),
            Err(e) => return reject("select", e),
        },
    };

    unsafe { select_sets("select", ctx, n, [readfds, writefds, exceptfds], timeout, ptr::null()) }
}

/// # Safety
/// As [`select`]; `mask` null or valid.
pub unsafe fn pselect(
    ctx: &DesockContext,
    n: c_int,
    readfds: *mut fd_set,
    writefds: *mut fd_set,
    exceptfds: *mut fd_set,
    timeout: *const timespec,
    mask: *const sigset_t,
) -> c_int {
    tracing::debug!(n, ?readfds, ?writefds, ?exceptfds, ?timeout, ?mask, "pselect");

    let timeout = match unsafe { timeout.as_ref() } {
        None => None,
        Some(ts) => match KernelTimeout::from_timespec(ts.tv_sec.into(), ts.tv_nsec.into()) {
            Ok(t) => Some(t),
            Err(e) => return reject("pselect", e),
        },
    };

    unsafe { select_sets("pselect", ctx, n, [readfds, writefds, exceptfds], timeout, mask) }
}

unsafe fn select_sets(
    call: &'static str,
    ctx: &DesockContext,
    n: c_int,
    raw: [*mut fd_set; 3],
    timeout: Option<KernelTimeout>,
    mask: *const sigset_t,
) -> c_int {
    let [readfds, writefds, exceptfds] = raw;
    let original = raw.map(|set| unsafe { set.as_ref() }.copied());

    let synthesized = {
        let mut sets = WatchSets {
            readable: unsafe { readfds.as_mut() },
            writable: unsafe { writefds.as_mut() },
            exceptional: unsafe { exceptfds.as_mut() },
        };
        if sets.is_empty() || !ctx.has_desock_fds(n, &sets) {
            None
        } else {
            Some(ctx.synthesize_select(n, &mut sets))
        }
    };

    match synthesized {
        Some(s) if !s.needs_real_wait() => return ready_count(call, s),
        // Synthesis cleared members the kernel now has to see.
        Some(_) => {
            for (set, saved) in raw.into_iter().zip(original) {
                if let (Some(set), Some(saved)) = (unsafe { set.as_mut() }, saved) {
                    *set = saved;
                }
            }
        }
        None => {}
    }

    passthrough(call, unsafe {
        kernel::pselect6(n, readfds, writefds, exceptfds, timeout, mask)
    })
}

/// The caller's `pollfd` array, or `None` when it cannot be inspected.
unsafe fn entries<'a>(fds: *mut pollfd, nfds: nfds_t) -> Option<&'a mut [pollfd]> {
    if nfds == 0 {
        return Some(Default::default());
    }
    if fds.is_null() || nfds > c_int::MAX as nfds_t {
        // Let the kernel report EFAULT / EINVAL.
        return None;
    }
    Some(unsafe { std::slice::from_raw_parts_mut(fds, nfds as usize) })
}

fn ready_count(call: &'static str, synthesized: Synthesized) -> c_int {
    let ready = c_int::try_from(synthesized.ready).unwrap_or(c_int::MAX);
    tracing::debug!(call, ready, "Synthesized readiness");
    ready
}

/// Log a kernel result without disturbing the `errno` it left behind.
fn passthrough(call: &'static str, rc: c_int) -> c_int {
    let errno = Errno::last_raw();
    if rc < 0 {
        tracing::debug!(call, rc, errno = %Errno::from_raw(errno), "Kernel call failed");
    } else {
        tracing::debug!(call, rc, "Kernel call returned");
    }
    Errno::set_raw(errno);
    rc
}

fn reject(call: &'static str, error: TimeoutError) -> c_int {
    tracing::warn!(call, error = %error, "Rejected timeout");
    error.errno().set();
    -1
}
