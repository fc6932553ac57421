//! [`lock_api`] integration.
//!
//! Implements [`lock_api::RawMutex`] for [`SpinLock`] and [`AdaptiveLock`] so
//! they can back [`lock_api::Mutex`] and anything else written against that
//! trait.
//!
//! ```rust
//! use adaptive_lock::lock_api::RawAdaptiveMutex;
//!
//! let mutex = RawAdaptiveMutex::new(1);
//! *mutex.lock() += 1;
//! assert_eq!(*mutex.lock(), 2);
//! ```

use ::lock_api::{GuardSend, RawMutex};

use crate::adaptive::Accounting;
use crate::{AdaptiveLock, SpinLock};

/// A [`lock_api::Mutex`] backed by a [`SpinLock`].
pub type RawSpinMutex<T> = ::lock_api::Mutex<SpinLock, T>;

/// A [`lock_api::MutexGuard`] for [`RawSpinMutex`].
pub type RawSpinMutexGuard<'a, T> = ::lock_api::MutexGuard<'a, SpinLock, T>;

/// A [`lock_api::Mutex`] backed by an [`AdaptiveLock`].
pub type RawAdaptiveMutex<T> = ::lock_api::Mutex<AdaptiveLock, T>;

/// A [`lock_api::MutexGuard`] for [`RawAdaptiveMutex`].
pub type RawAdaptiveMutexGuard<'a, T> = ::lock_api::MutexGuard<'a, AdaptiveLock, T>;

unsafe impl RawMutex for SpinLock {
    #[allow(clippy::declare_interior_mutable_const)]
    const INIT: SpinLock = SpinLock::new();

    type GuardMarker = GuardSend;

    #[inline]
    fn lock(&self) {
        self.acquire();
    }

    #[inline]
    fn try_lock(&self) -> bool {
        self.try_acquire()
    }

    #[inline]
    unsafe fn unlock(&self) {
        self.release();
    }

    #[inline]
    fn is_locked(&self) -> bool {
        SpinLock::is_locked(self)
    }
}

unsafe impl<A: Accounting> RawMutex for AdaptiveLock<A> {
    #[allow(clippy::declare_interior_mutable_const)]
    const INIT: AdaptiveLock<A> = AdaptiveLock::init();

    type GuardMarker = GuardSend;

    #[inline]
    fn lock(&self) {
        self.acquire();
    }

    #[inline]
    fn try_lock(&self) -> bool {
        self.try_acquire()
    }

    #[inline]
    unsafe fn unlock(&self) {
        self.release();
    }

    #[inline]
    fn is_locked(&self) -> bool {
        AdaptiveLock::is_locked(self)
    }
}

#[cfg(test)]
mod tests {
    use super::{RawAdaptiveMutex, RawSpinMutex};
    use crate::{AdaptiveLock, Balanced};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_lock_api_mutex_counts() {
        let mutex = Arc::new(RawAdaptiveMutex::new(0u64));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let mutex = mutex.clone();
                thread::spawn(move || {
                    for _ in 0..5_000 {
                        *mutex.lock() += 1;
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(*mutex.lock(), 4 * 5_000);
        assert!(!mutex.is_locked());
    }

    #[test]
    fn test_lock_api_spin_try_lock() {
        let mutex = RawSpinMutex::new("held");
        let guard = mutex.lock();
        assert!(mutex.try_lock().is_none());
        drop(guard);
        assert_eq!(*mutex.try_lock().unwrap(), "held");
    }

    #[test]
    fn test_balanced_lock_behind_lock_api() {
        let mutex: ::lock_api::Mutex<AdaptiveLock<Balanced>, _> = ::lock_api::Mutex::new(vec![]);
        mutex.lock().push(1);
        assert_eq!(*mutex.lock(), vec![1]);
    }
}
