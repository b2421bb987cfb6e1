//! Genuine kernel multiplexing calls.
//!
//! Issued as raw system calls: going through libc would land right back in
//! our own exported `poll`/`select` symbols. Results and `errno` are the
//! kernel's, untranslated.

use std::ffi::c_int;
use std::ptr;

use desock::KernelTimeout;
use libc::{fd_set, nfds_t, pollfd, sigset_t, timespec};

/// Size of the kernel's signal set (`_NSIG / 8`), not glibc's `sigset_t`.
#[cfg(any(target_arch = "mips", target_arch = "mips64"))]
const KERNEL_SIGSET_SIZE: usize = 16;
#[cfg(not(any(target_arch = "mips", target_arch = "mips64")))]
const KERNEL_SIGSET_SIZE: usize = 8;

/// # Safety
/// Same contract as `poll(2)`.
#[cfg(any(target_arch = "x86_64", target_arch = "x86"))]
pub unsafe fn poll(fds: *mut pollfd, nfds: nfds_t, timeout: c_int) -> c_int {
    unsafe { libc::syscall(libc::SYS_poll, fds, nfds, timeout) as c_int }
}

/// # Safety
/// Same contract as `poll(2)`.
#[cfg(not(any(target_arch = "x86_64", target_arch = "x86")))]
pub unsafe fn poll(fds: *mut pollfd, nfds: nfds_t, timeout: c_int) -> c_int {
    // No SYS_poll here; ppoll with no mask is equivalent.
    let ts = KernelTimeout::from_millis(timeout).map(|t| t.to_timespec());
    let tsp = ts.as_ref().map_or(ptr::null(), ptr::from_ref);
    unsafe { ppoll(fds, nfds, tsp, ptr::null()) }
}

/// # Safety
/// Same contract as `ppoll(2)`.
pub unsafe fn ppoll(
    fds: *mut pollfd,
    nfds: nfds_t,
    timeout: *const timespec,
    mask: *const sigset_t,
) -> c_int {
    // The kernel writes the remaining time back; the caller's copy is const.
    let mut ts = unsafe { timeout.as_ref() }.copied();
    let tsp = ts.as_mut().map_or(ptr::null_mut(), ptr::from_mut);
    unsafe { libc::syscall(libc::SYS_ppoll, fds, nfds, tsp, mask, KERNEL_SIGSET_SIZE) as c_int }
}

/// `pselect6` with a normalized timeout (`None` waits forever).
///
/// Only the `SYS_pselect6` entry is used. On 32-bit targets `libc::timespec`
/// has a 32-bit `tv_sec`, so timeouts beyond `i32::MAX` seconds saturate
/// there; `SYS_pselect6_time64` would lift that limit.
///
/// # Safety
/// Same contract as `pselect(2)`.
pub unsafe fn pselect6(
    n: c_int,
    readfds: *mut fd_set,
    writefds: *mut fd_set,
    exceptfds: *mut fd_set,
    timeout: Option<KernelTimeout>,
    mask: *const sigset_t,
) -> c_int {
    let mut ts = timeout.map(|t| t.to_timespec());
    let tsp = ts.as_mut().map_or(ptr::null_mut(), ptr::from_mut);
    // Sixth argument is `{ const sigset_t *ss; size_t ss_len; }`.
    let mask_arg: [usize; 2] = [mask as usize, KERNEL_SIGSET_SIZE];
    unsafe {
        libc::syscall(
            libc::SYS_pselect6,
            n,
            readfds,
            writefds,
            exceptfds,
            tsp,
            mask_arg.as_ptr(),
        ) as c_int
    }
}
