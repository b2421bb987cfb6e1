//! Timeout normalization for the forwarded kernel calls.
//!
//! The kernel's `pselect6`/`ppoll` take `(seconds, nanoseconds)`. Callers hand
//! in `timeval`s, `timespec`s or milliseconds. Excess microseconds in a
//! `timeval` carry into seconds, as `select` does; a `timespec` with
//! `tv_nsec` out of range is rejected, as `pselect` does. Anything that cannot
//! be represented clamps to the largest representable duration.

use std::ffi::c_int;

use crate::error::TimeoutError;

const MICROS_PER_SEC: i64 = 1_000_000;
const NANOS_PER_SEC: i64 = 1_000_000_000;
const NANOS_PER_MICRO: i64 = 1_000;
const NANOS_PER_MILLI: i64 = 1_000_000;
const MILLIS_PER_SEC: i64 = 1_000;

/// A validated, normalized kernel timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelTimeout {
    secs: i64,
    nanos: i64,
}

impl KernelTimeout {
    pub const MAX_SECS: i64 = i64::MAX;

    /// The largest representable duration.
    pub const MAX: KernelTimeout = KernelTimeout {
        secs: Self::MAX_SECS,
        nanos: NANOS_PER_SEC - 1,
    };

    pub const ZERO: KernelTimeout = KernelTimeout { secs: 0, nanos: 0 };

    pub fn from_timeval(secs: i64, micros: i64) -> Result<Self, TimeoutError> {
        Self::normalize(secs, micros, MICROS_PER_SEC, NANOS_PER_MICRO)
    }

    pub fn from_timespec(secs: i64, nanos: i64) -> Result<Self, TimeoutError> {
        if nanos >= NANOS_PER_SEC {
            return Err(TimeoutError::FractionOutOfRange(nanos));
        }
        Self::normalize(secs, nanos, NANOS_PER_SEC, 1)
    }

    /// `poll`-style milliseconds; negative means wait forever (`None`).
    pub fn from_millis(millis: c_int) -> Option<Self> {
        if millis < 0 {
            return None;
        }
        let millis = i64::from(millis);
        Some(Self {
            secs: millis / MILLIS_PER_SEC,
            nanos: (millis % MILLIS_PER_SEC) * NANOS_PER_MILLI,
        })
    }

    fn normalize(
        secs: i64,
        fraction: i64,
        per_sec: i64,
        nanos_per_unit: i64,
    ) -> Result<Self, TimeoutError> {
        if secs < 0 {
            return Err(TimeoutError::NegativeSeconds(secs));
        }
        if fraction < 0 {
            return Err(TimeoutError::NegativeFraction(fraction));
        }

        let carry = fraction / per_sec;
        if carry > Self::MAX_SECS - secs {
            return Ok(Self::MAX);
        }

        Ok(Self {
            secs: secs + carry,
            nanos: (fraction % per_sec) * nanos_per_unit,
        })
    }

    pub fn secs(&self) -> i64 {
        self.secs
    }

    pub fn nanos(&self) -> i64 {
        self.nanos
    }

    /// Seconds as stored in a possibly narrower `time_t`, saturating.
    pub fn saturating_secs<T>(&self) -> T
    where
        T: TryFrom<i64> + Bounded,
    {
        T::try_from(self.secs).unwrap_or(T::MAX_VALUE)
    }

    pub fn to_timespec(&self) -> libc::timespec {
        // Some targets carry private padding in `timespec`.
        // SAFETY: `timespec` is plain old data; all-zero is a valid value.
        let mut ts: libc::timespec = unsafe { std::mem::zeroed() };
        ts.tv_sec = self.saturating_secs::<libc::time_t>();
        ts.tv_nsec = self.nanos as _;
        ts
    }
}

/// Integer types a kernel seconds field may use.
pub trait Bounded {
    const MAX_VALUE: Self;
}

impl Bounded for i32 {
    const MAX_VALUE: Self = i32::MAX;
}

impl Bounded for i64 {
    const MAX_VALUE: Self = i64::MAX;
}
