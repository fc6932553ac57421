//! # BackOff
//!
//! Backoff state for the retry loop of [`SpinLock::acquire`](crate::SpinLock::acquire).
//!
//! The first few calls to [`BackOff::snooze`] busy-wait for an exponentially
//! growing number of [`core::hint::spin_loop`] hints, which is enough to ride
//! out a holder that is about to release. Once the spin budget is spent every
//! further call hands the rest of the time slice back to the scheduler with
//! [`std::thread::yield_now`], so a waiter that keeps losing never starves the
//! thread it is waiting on.
//!
//! ## Example
//! ```rust
//! use adaptive_lock::BackOff;
//!
//! let backoff = BackOff::new();
//!
//! loop {
//!     if try_acquire_lock() {
//!         break;
//!     }
//!     backoff.snooze();
//! }
//!
//! fn try_acquire_lock() -> bool {
//!     // pseudo lock acquisition
//!     true
//! }
//! ```
//!
//! Under the `loom` feature the spin phase shrinks to a single hint, and the
//! hint itself becomes a yield: loom cannot observe a pause instruction, and
//! every retry has to be a scheduling point for the model to make progress.

use core::cell::Cell;

use crate::sync;

/// Number of doubling spin rounds before switching to yielding.
#[cfg(not(feature = "loom"))]
const SPIN_LIMIT: u32 = 6;

#[cfg(feature = "loom")]
const SPIN_LIMIT: u32 = 1;

/// Per-call exponential backoff that ends in cooperative yielding.
///
/// A `BackOff` is meant to live on the stack of a single acquire attempt; it
/// is neither `Sync` nor shared between threads.
///
/// # Examples
///
/// ```rust
/// use adaptive_lock::BackOff;
///
/// let backoff = BackOff::new();
/// assert!(!backoff.is_yielding());
///
/// for _ in 0..16 {
///     backoff.snooze();
/// }
/// assert!(backoff.is_yielding());
/// ```
#[derive(Debug)]
pub struct BackOff {
    step: Cell<u32>,
}

impl BackOff {
    /// Creates a new [`BackOff`] at the start of its spin phase.
    #[inline(always)]
    pub const fn new() -> Self {
        Self { step: Cell::new(0) }
    }

    /// Waits before the next retry.
    ///
    /// Spins `2^step` times while in the spin phase, then yields the calling
    /// thread on every call.
    #[inline]
    pub fn snooze(&self) {
        let step = self.step.get();

        if step < SPIN_LIMIT {
            for _ in 0..(1u32 << step) {
                sync::spin_loop();
            }
            self.step.set(step + 1);
        } else {
            sync::yield_now();
        }
    }

    /// Returns `true` once the spin budget is exhausted and [`snooze`](BackOff::snooze)
    /// only yields.
    #[inline(always)]
    pub fn is_yielding(&self) -> bool {
        self.step.get() >= SPIN_LIMIT
    }

    /// Restarts the spin phase.
    #[inline(always)]
    pub fn reset(&self) {
        self.step.set(0);
    }
}

impl Default for BackOff {
    fn default() -> Self {
        Self::new()
    }
}
