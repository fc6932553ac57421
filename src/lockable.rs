//! The raw lock capability shared by [`SpinLock`] and [`AdaptiveLock`].

use crate::adaptive::Accounting;
use crate::{AdaptiveLock, SpinLock};

/// A raw mutual-exclusion primitive with no protected data.
///
/// This is the surface [`Mutex`](crate::Mutex) and the comparison driver are
/// written against.
///
/// # Safety
/// Implementations must guarantee that between a successful `acquire` or
/// `try_acquire` and the matching `release`, no other call to `acquire` or
/// `try_acquire` on the same lock succeeds.
pub unsafe trait Lockable {
    /// Blocks until the calling thread holds the lock.
    fn acquire(&self);

    /// Takes the lock if it is free. Returns whether it was taken.
    fn try_acquire(&self) -> bool;

    /// Releases the lock.
    ///
    /// # Safety
    /// The calling context must hold the lock.
    unsafe fn release(&self);

    /// Checks whether the lock is currently held.
    fn is_locked(&self) -> bool;
}

unsafe impl Lockable for SpinLock {
    #[inline]
    fn acquire(&self) {
        SpinLock::acquire(self)
    }

    #[inline]
    fn try_acquire(&self) -> bool {
        SpinLock::try_acquire(self)
    }

    #[inline]
    unsafe fn release(&self) {
        SpinLock::release(self)
    }

    #[inline]
    fn is_locked(&self) -> bool {
        SpinLock::is_locked(self)
    }
}

unsafe impl<A: Accounting> Lockable for AdaptiveLock<A> {
    #[inline]
    fn acquire(&self) {
        AdaptiveLock::acquire(self)
    }

    #[inline]
    fn try_acquire(&self) -> bool {
        AdaptiveLock::try_acquire(self)
    }

    #[inline]
    unsafe fn release(&self) {
        AdaptiveLock::release(self)
    }

    #[inline]
    fn is_locked(&self) -> bool {
        AdaptiveLock::is_locked(self)
    }
}
