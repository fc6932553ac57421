//! # Mutex
//!
//! A value protected by any [`Lockable`], with an RAII guard.
//!
//! [`Mutex`] pairs the raw primitives of this crate with the data they
//! protect, so callers never touch `release` directly: the [`MutexGuard`]
//! returned by [`Mutex::lock`] releases the lock when dropped.
//!
//! ## Example
//! ```rust
//! use adaptive_lock::{AdaptiveMutex, Mutex, SpinLock};
//!
//! let lock = AdaptiveMutex::new(0);
//! {
//!     let mut guard = lock.lock();
//!     *guard += 1;
//! } // released when guard is dropped
//! assert_eq!(*lock.lock(), 1);
//!
//! // Statics need the const constructor.
//! static COUNTER: Mutex<u32, SpinLock> = Mutex::with_raw(SpinLock::new(), 0);
//! *COUNTER.lock() += 1;
//! assert_eq!(*COUNTER.lock(), 1);
//! ```
//!
//! Unlike [`std::sync::Mutex`] there is no poisoning: a panic inside the
//! critical section releases the lock as the guard unwinds, and the data is
//! left as the panicking thread wrote it.

use core::cell::UnsafeCell;
use core::fmt;
use core::ops::{Deref, DerefMut};

use crate::{AdaptiveLock, Lockable, SpinLock};

/// Mutual exclusion over a `T`, using `L` as the raw lock.
pub struct Mutex<T, L = AdaptiveLock> {
    raw: L,
    data: UnsafeCell<T>,
}

/// A [`Mutex`] over a [`SpinLock`].
pub type SpinMutex<T> = Mutex<T, SpinLock>;

/// A [`Mutex`] over an [`AdaptiveLock`].
pub type AdaptiveMutex<T> = Mutex<T, AdaptiveLock>;

/// A guard that releases the [`Mutex`] when dropped.
///
/// Returned by [`Mutex::lock`] and [`Mutex::try_lock`]; derefs to the
/// protected value.
#[must_use = "if unused the Mutex will immediately unlock"]
pub struct MutexGuard<'a, T, L: Lockable> {
    mutex: &'a Mutex<T, L>,
}

impl<T, L: Lockable + Default> Mutex<T, L> {
    /// Creates a new [`Mutex`] wrapping the given data.
    #[inline]
    pub fn new(data: T) -> Self {
        Self::with_raw(L::default(), data)
    }
}

impl<T, L: Lockable> Mutex<T, L> {
    /// Creates a new [`Mutex`] around an already built raw lock.
    ///
    /// The raw lock must be unlocked.
    #[inline(always)]
    pub const fn with_raw(raw: L, data: T) -> Self {
        Mutex {
            raw,
            data: UnsafeCell::new(data),
        }
    }

    /// Acquires the lock, waiting as the raw lock dictates.
    #[inline]
    pub fn lock(&self) -> MutexGuard<'_, T, L> {
        self.raw.acquire();
        MutexGuard { mutex: self }
    }

    /// Attempts to acquire the lock without waiting.
    ///
    /// Returns `Some(MutexGuard)` if the lock was free, or `None` otherwise.
    #[inline]
    pub fn try_lock(&self) -> Option<MutexGuard<'_, T, L>> {
        if self.raw.try_acquire() {
            Some(MutexGuard { mutex: self })
        } else {
            None
        }
    }

    /// Runs a closure with exclusive access to the data.
    ///
    /// # Example
    /// ```
    /// use adaptive_lock::AdaptiveMutex;
    /// let lock = AdaptiveMutex::new(0i32);
    /// let seen = lock.with_lock(|data| {
    ///     *data += 1;
    ///     *data
    /// });
    /// assert_eq!(seen, 1);
    /// ```
    #[inline]
    pub fn with_lock<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.lock();
        f(&mut *guard)
    }

    /// Checks whether the lock is currently held.
    #[inline(always)]
    pub fn is_locked(&self) -> bool {
        self.raw.is_locked()
    }

    /// Mutable access without locking; the borrow proves exclusivity.
    #[inline]
    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }

    /// Consumes the mutex and returns the data.
    #[inline]
    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }

    /// The underlying raw lock, for diagnostics.
    #[inline(always)]
    pub fn raw(&self) -> &L {
        &self.raw
    }
}

impl<T: Default, L: Lockable + Default> Default for Mutex<T, L> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug, L: Lockable> fmt::Debug for Mutex<T, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("Mutex");
        match self.try_lock() {
            Some(guard) => d.field("data", &&*guard),
            None => d.field("data", &format_args!("<locked>")),
        };
        d.finish()
    }
}

impl<T, L: Lockable> Drop for MutexGuard<'_, T, L> {
    #[inline]
    fn drop(&mut self) {
        // SAFETY: a guard only exists while its lock is held.
        unsafe { self.mutex.raw.release() }
    }
}

impl<T, L: Lockable> Deref for MutexGuard<'_, T, L> {
    type Target = T;
    #[inline(always)]
    fn deref(&self) -> &T {
        unsafe { &*self.mutex.data.get() }
    }
}

impl<T, L: Lockable> DerefMut for MutexGuard<'_, T, L> {
    #[inline(always)]
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.mutex.data.get() }
    }
}

impl<T: fmt::Debug, L: Lockable> fmt::Debug for MutexGuard<'_, T, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

// Safety: the raw lock enforces mutual exclusion over `data`.
unsafe impl<T: Send, L: Lockable + Send> Send for Mutex<T, L> {}
unsafe impl<T: Send, L: Lockable + Sync> Sync for Mutex<T, L> {}
unsafe impl<T: Sync, L: Lockable + Sync> Sync for MutexGuard<'_, T, L> {}

#[cfg(all(test, not(feature = "loom")))]
mod test {
    use crate::{AdaptiveMutex, SpinMutex};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_basic_lock_unlock() {
        let lock = AdaptiveMutex::new(10);

        {
            let mut guard = lock.lock();
            *guard += 5;
            assert_eq!(*guard, 15);
            assert!(lock.is_locked());
        } // guard dropped here, automatically unlocks

        assert!(!lock.is_locked(), "Lock should be released after guard drop");
        assert_eq!(lock.into_inner(), 15);
    }

    #[test]
    fn test_try_lock_behavior() {
        let lock = SpinMutex::new(42);

        let guard = lock.lock();
        assert!(lock.try_lock().is_none(), "Lock should not be acquirable while held");

        drop(guard);
        let guard2 = lock.try_lock();
        assert!(guard2.is_some(), "Lock should succeed after previous guard drop");
    }

    #[test]
    fn test_concurrent_access() {
        let lock = Arc::new(AdaptiveMutex::new(0usize));
        let mut handles = vec![];

        for _ in 0..8 {
            let lock_cloned = lock.clone();
            handles.push(thread::spawn(move || {
                for _ in 0..10_000 {
                    let mut guard = lock_cloned.lock();
                    *guard += 1;
                }
            }));
        }

        for h in handles {
            h.join().unwrap();
        }

        let final_value = *lock.lock();
        assert_eq!(final_value, 8 * 10_000, "Counter should match total increments");
        let raw = lock.raw();
        assert_eq!(i64::from(raw.waiters()), raw.wakeups_posted() as i64);
    }

    #[test]
    fn test_panic_in_critical_section_releases() {
        let lock = Arc::new(AdaptiveMutex::new(vec![1, 2, 3]));

        let result = {
            let lock = lock.clone();
            thread::spawn(move || {
                let mut guard = lock.lock();
                guard.push(4);
                panic!("boom");
            })
            .join()
        };
        assert!(result.is_err());

        assert!(!lock.is_locked());
        assert_eq!(*lock.lock(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_debug_shows_data_or_locked() {
        let lock = SpinMutex::new(7);
        assert_eq!(format!("{lock:?}"), "Mutex { data: 7 }");

        let _guard = lock.lock();
        assert_eq!(format!("{lock:?}"), "Mutex { data: <locked> }");
    }
}
