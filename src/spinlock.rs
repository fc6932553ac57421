//! # SpinLock
//!
//! A raw test-and-set spin lock: one atomic flag, no protected data.
//!
//! The flag is taken with a compare-and-swap and dropped with a plain store.
//! Between failed attempts [`SpinLock::acquire`] backs off with a [`BackOff`],
//! which ends in yielding the time slice, so a contended spin lock never pins
//! a core while the holder is descheduled.
//!
//! [`AdaptiveLock`](crate::AdaptiveLock) is built from two of these: one is
//! the ownership flag callers contend on, the other guards its waiter
//! bookkeeping. For data protected by a spin lock use
//! [`SpinMutex`](crate::SpinMutex).
//!
//! ## Example
//! ```rust
//! use adaptive_lock::SpinLock;
//!
//! let lock = SpinLock::new();
//!
//! lock.acquire();
//! assert!(lock.is_locked());
//! assert!(!lock.try_acquire());
//!
//! // SAFETY: acquired above on this thread.
//! unsafe { lock.release() };
//! assert!(!lock.is_locked());
//! ```
//!
//! ## Caveats
//! - Not fair: a thread may lose every race under heavy contention.
//! - Not re-entrant: acquiring twice on one thread never returns.
//! - Keep critical sections short and never block while holding it.

use core::sync::atomic::Ordering::{Acquire, Relaxed, Release};

use crate::sync::AtomicBool;
use crate::BackOff;

/// A test-and-set spin lock over a single [`AtomicBool`].
#[derive(Debug)]
pub struct SpinLock {
    locked: AtomicBool,
}

impl SpinLock {
    loom_const_fn! {
        /// Creates an unlocked [`SpinLock`].
        #[inline(always)]
        pub fn new() -> Self {
            SpinLock {
                locked: AtomicBool::new(false),
            }
        }
    }

    /// Attempts to take the lock without waiting.
    ///
    /// Returns `true` if the flag went from unlocked to locked on this call.
    /// A failed attempt has no side effects.
    #[inline]
    pub fn try_acquire(&self) -> bool {
        self.locked
            .compare_exchange(false, true, Acquire, Relaxed)
            .is_ok()
    }

    /// Takes the lock, retrying with backoff until it succeeds.
    #[inline]
    pub fn acquire(&self) {
        let backoff = BackOff::new();
        while !self.try_acquire() {
            backoff.snooze();
        }
    }

    /// Releases the lock.
    ///
    /// # Safety
    /// - The calling context must hold the lock.
    /// - Releasing a lock held by someone else breaks mutual exclusion for
    ///   whatever it protects.
    #[inline]
    pub unsafe fn release(&self) {
        self.locked.store(false, Release);
    }

    /// Checks whether the lock is currently held.
    ///
    /// The answer may be stale by the time the caller looks at it.
    #[inline(always)]
    pub fn is_locked(&self) -> bool {
        self.locked.load(Relaxed)
    }
}

impl Default for SpinLock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(all(test, not(feature = "loom")))]
mod test {
    use super::SpinLock;
    use std::cell::UnsafeCell;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_basic_acquire_release() {
        let lock = SpinLock::new();
        assert!(!lock.is_locked());

        lock.acquire();
        assert!(lock.is_locked());

        unsafe { lock.release() };
        assert!(!lock.is_locked(), "Lock should be released");
    }

    #[test]
    fn test_try_acquire_behavior() {
        let lock = SpinLock::new();

        assert!(lock.try_acquire());
        assert!(!lock.try_acquire(), "Lock should not be acquirable while held");

        unsafe { lock.release() };
        assert!(lock.try_acquire(), "Lock should succeed after release");
        unsafe { lock.release() };
    }

    struct Counter {
        lock: SpinLock,
        value: UnsafeCell<usize>,
    }

    unsafe impl Sync for Counter {}

    #[test]
    fn test_concurrent_access() {
        let counter = Arc::new(Counter {
            lock: SpinLock::new(),
            value: UnsafeCell::new(0),
        });
        let mut handles = vec![];

        for _ in 0..8 {
            let counter = counter.clone();
            handles.push(thread::spawn(move || {
                for _ in 0..10_000 {
                    counter.lock.acquire();
                    unsafe { *counter.value.get() += 1 };
                    unsafe { counter.lock.release() };
                }
            }));
        }

        for h in handles {
            h.join().unwrap();
        }

        let final_value = unsafe { *counter.value.get() };
        assert_eq!(final_value, 8 * 10_000, "Counter should match total increments");
    }
}
