//! # AdaptiveLock
//!
//! A lock that spins while contention is low and parks waiters while it is
//! high.
//!
//! Ownership is a plain [`SpinLock`] flag. Every attempt on it, and every
//! change to the waiter bookkeeping, happens under a second spin lock, the
//! *guard*, which is only ever held for a handful of instructions:
//!
//! - **Fast path.** Take the guard, win the ownership flag, drop the guard.
//!   No syscalls, no blocking primitive.
//! - **Slow path.** If the flag is taken, register as a waiter, drop the
//!   guard and park on a single-slot notification. Once woken, clear the
//!   pending-wakeup flag, deregister, and start over from the fast path.
//! - **Release.** Under the guard: if anyone is registered and no wakeup is
//!   already in flight, mark one in flight and post it. Then clear ownership,
//!   whether or not anyone was woken.
//!
//! A woken thread is not handed the lock. It races any newcomer for the flag
//! and may lose, in which case it parks again. The lock is therefore not
//! fair, and it is not re-entrant.
//!
//! ## Waiter accounting
//!
//! The `A` parameter picks what `release` does to the waiter count when it
//! posts a wakeup. [`Compensated`] (the default) reserves an extra slot for
//! the woken thread on every post, and the woken thread gives back only its
//! own registration. The count therefore grows by one per wakeup and never
//! returns to zero once the lock has been contended: at rest it equals
//! [`wakeups_posted`](AdaptiveLock::wakeups_posted). [`Balanced`], built with
//! [`AdaptiveLock::balanced`], leaves the count alone on post, so it always
//! equals the number of registered waiters. Both keep mutual exclusion and
//! progress.
//!
//! ## Example
//! ```rust
//! use adaptive_lock::AdaptiveLock;
//! use std::sync::Arc;
//! use std::thread;
//!
//! let lock = Arc::new(AdaptiveLock::new());
//!
//! let handles: Vec<_> = (0..4)
//!     .map(|_| {
//!         let lock = lock.clone();
//!         thread::spawn(move || {
//!             lock.acquire();
//!             // critical section
//!             // SAFETY: acquired above on this thread.
//!             unsafe { lock.release() };
//!         })
//!     })
//!     .collect();
//!
//! for h in handles {
//!     h.join().unwrap();
//! }
//! assert!(!lock.is_locked());
//! assert_eq!(i64::from(lock.waiters()), lock.wakeups_posted() as i64);
//! ```

use core::fmt;
use core::marker::PhantomData;
use core::sync::atomic::Ordering::Relaxed;

use log::trace;

use crate::signal::Signal;
use crate::sync::{AtomicBool, AtomicI32, AtomicU64};
use crate::SpinLock;

mod private {
    pub trait Sealed {}
}

/// How [`AdaptiveLock::release`] accounts for the waiter it wakes.
///
/// This trait is sealed; [`Balanced`] and [`Compensated`] are the only
/// implementations.
pub trait Accounting: private::Sealed {
    /// Whether posting a wakeup also increments the waiter count.
    const RESERVE_ON_POST: bool;
}

/// The waiter count tracks registered waiters exactly and returns to zero
/// once contention ends.
#[derive(Debug, Clone, Copy, Default)]
pub struct Balanced;

/// Every posted wakeup adds one to the waiter count on top of the waiter's
/// own registration; the woken thread removes only one.
///
/// Once a lock has been contended its count stays positive, so every release
/// with no wakeup in flight posts one that nobody may be waiting for. The
/// count is an `i32` and is never reset: after about 2^31 posted wakeups it
/// wraps to a negative value, `release` stops seeing waiters, and threads
/// parked from then on are never woken. Use [`Balanced`] for locks that
/// outlive that many contended hand-offs.
#[derive(Debug, Clone, Copy, Default)]
pub struct Compensated;

impl private::Sealed for Balanced {}
impl private::Sealed for Compensated {}

impl Accounting for Balanced {
    const RESERVE_ON_POST: bool = false;
}

impl Accounting for Compensated {
    const RESERVE_ON_POST: bool = true;
}

/// A spin lock that parks its excess waiters.
///
/// See the [module-level documentation](self) for the protocol.
pub struct AdaptiveLock<A = Compensated> {
    ownership: SpinLock,
    guard: SpinLock,
    waiters: AtomicI32,
    wakeup_pending: AtomicBool,
    notify: Signal,
    wakeups: AtomicU64,
    _accounting: PhantomData<A>,
}

/// Holds the bookkeeping guard and releases it on drop.
struct Bookkeeping<'a> {
    guard: &'a SpinLock,
}

impl Drop for Bookkeeping<'_> {
    #[inline]
    fn drop(&mut self) {
        // SAFETY: only built by `AdaptiveLock::bookkeeping` after acquiring.
        unsafe { self.guard.release() }
    }
}

impl AdaptiveLock<Compensated> {
    loom_const_fn! {
        /// Creates an unlocked [`AdaptiveLock`] with [`Compensated`] accounting.
        #[inline]
        pub fn new() -> Self {
            Self::init()
        }
    }
}

impl AdaptiveLock<Balanced> {
    loom_const_fn! {
        /// Creates an unlocked [`AdaptiveLock`] with [`Balanced`] accounting.
        #[inline]
        pub fn balanced() -> Self {
            Self::init()
        }
    }
}

impl<A: Accounting> AdaptiveLock<A> {
    loom_const_fn! {
        pub(crate) fn init() -> Self {
            AdaptiveLock {
                ownership: SpinLock::new(),
                guard: SpinLock::new(),
                waiters: AtomicI32::new(0),
                wakeup_pending: AtomicBool::new(false),
                notify: Signal::new(),
                wakeups: AtomicU64::new(0),
                _accounting: PhantomData,
            }
        }
    }

    #[inline]
    fn bookkeeping(&self) -> Bookkeeping<'_> {
        self.guard.acquire();
        Bookkeeping { guard: &self.guard }
    }

    /// Blocks until the calling thread owns the lock.
    ///
    /// Calling this again before [`release`](Self::release) deadlocks.
    pub fn acquire(&self) {
        loop {
            {
                let _bookkeeping = self.bookkeeping();
                if self.ownership.try_acquire() {
                    return;
                }
                self.waiters.fetch_add(1, Relaxed);
            }

            trace!("adaptive lock {:p}: contended, parking", self);
            self.notify.wait();

            {
                let _bookkeeping = self.bookkeeping();
                self.wakeup_pending.store(false, Relaxed);
                self.waiters.fetch_sub(1, Relaxed);
            }
            trace!("adaptive lock {:p}: woken, retrying", self);
        }
    }

    /// Takes the lock if it is free, without registering as a waiter.
    #[inline]
    pub fn try_acquire(&self) -> bool {
        let _bookkeeping = self.bookkeeping();
        self.ownership.try_acquire()
    }

    /// Releases the lock, waking one parked waiter if none is already waking.
    ///
    /// # Safety
    /// - The calling context must own the lock, acquired through
    ///   [`acquire`](Self::acquire) or a successful
    ///   [`try_acquire`](Self::try_acquire).
    /// - Each acquisition is released exactly once.
    ///
    /// # Panics
    /// If a wakeup is about to be posted while the previous one still sits
    /// in the notification slot. The pending flag rules this out; the check
    /// stays on in release builds.
    pub unsafe fn release(&self) {
        let woke = {
            let _bookkeeping = self.bookkeeping();

            let woke = self.waiters.load(Relaxed) > 0 && !self.wakeup_pending.load(Relaxed);
            if woke {
                if A::RESERVE_ON_POST {
                    self.waiters.fetch_add(1, Relaxed);
                }
                self.wakeup_pending.store(true, Relaxed);
                self.wakeups.fetch_add(1, Relaxed);

                // The pending flag is what keeps a second post out of a full slot.
                let posted = self.notify.post();
                assert!(posted, "wakeup posted while a previous one is unconsumed");
            }

            // SAFETY: the caller owns the lock.
            unsafe { self.ownership.release() };
            woke
        };

        if woke {
            trace!("adaptive lock {:p}: released, woke one waiter", self);
        }
    }

    /// Checks whether some thread owns the lock.
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.ownership.is_locked()
    }

    /// Current value of the waiter count.
    ///
    /// With [`Balanced`] accounting this is the number of registered waiters.
    /// With [`Compensated`] it is the registered waiters plus one per posted
    /// wakeup, and wraps after about 2^31 posts.
    /// Racy; meant for tests and diagnostics.
    #[inline]
    pub fn waiters(&self) -> i32 {
        self.waiters.load(Relaxed)
    }

    /// Whether a posted wakeup has not been picked up yet.
    #[inline]
    pub fn is_wakeup_pending(&self) -> bool {
        self.wakeup_pending.load(Relaxed)
    }

    /// Total number of wakeups `release` has posted over the lock's lifetime.
    #[inline]
    pub fn wakeups_posted(&self) -> u64 {
        self.wakeups.load(Relaxed)
    }

    /// Whether a posted wakeup is sitting in the notification slot, not yet
    /// received by any waiter.
    pub fn is_signal_queued(&self) -> bool {
        self.notify.is_full()
    }
}

impl<A: Accounting> Default for AdaptiveLock<A> {
    fn default() -> Self {
        Self::init()
    }
}

impl<A> fmt::Debug for AdaptiveLock<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdaptiveLock")
            .field("locked", &self.ownership.is_locked())
            .field("waiters", &self.waiters.load(Relaxed))
            .field("wakeup_pending", &self.wakeup_pending.load(Relaxed))
            .finish()
    }
}

#[cfg(all(test, not(feature = "loom")))]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    fn wait_until(what: &str, cond: impl Fn() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !cond() {
            assert!(Instant::now() < deadline, "timed out waiting for {what}");
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_fast_path_never_parks() {
        let lock = AdaptiveLock::new();

        for _ in 0..10_000 {
            lock.acquire();
            assert!(lock.is_locked());
            assert_eq!(lock.waiters(), 0);
            unsafe { lock.release() };
        }

        assert!(!lock.is_locked());
        assert_eq!(lock.waiters(), 0);
        assert_eq!(lock.wakeups_posted(), 0, "Uncontended use touched the notification slot");
        assert!(!lock.is_signal_queued());
    }

    #[test]
    fn test_try_acquire_does_not_register() {
        let lock = AdaptiveLock::new();

        assert!(lock.try_acquire());
        assert!(!lock.try_acquire());
        assert_eq!(lock.waiters(), 0);

        unsafe { lock.release() };
        assert!(!lock.is_locked());
        assert_eq!(lock.wakeups_posted(), 0);
    }

    /// Spawns a thread that blocks on `lock` while this thread holds it, and
    /// returns once that thread has registered as a waiter.
    fn park_second_thread<A>(lock: &Arc<AdaptiveLock<A>>) -> (thread::JoinHandle<()>, mpsc::Receiver<()>)
    where
        A: Accounting + Send + Sync + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let handle = {
            let lock = lock.clone();
            thread::spawn(move || {
                lock.acquire();
                tx.send(()).unwrap();
                unsafe { lock.release() };
            })
        };

        wait_until("second thread to register", || lock.waiters() == 1);
        assert!(rx.try_recv().is_err(), "Second thread got in while the lock was held");
        (handle, rx)
    }

    #[test]
    fn test_blocked_waiter_proceeds_after_release() {
        let lock = Arc::new(AdaptiveLock::balanced());
        lock.acquire();

        let (t2, rx) = park_second_thread(&lock);
        assert!(lock.is_locked());

        unsafe { lock.release() };
        rx.recv_timeout(Duration::from_secs(5))
            .expect("Parked thread never acquired the lock");
        t2.join().unwrap();

        assert!(!lock.is_locked());
        assert_eq!(lock.waiters(), 0);
        assert_eq!(lock.wakeups_posted(), 1);
        assert!(!lock.is_wakeup_pending());
        assert!(!lock.is_signal_queued());
    }

    #[test]
    fn test_waiter_count_drifts_by_one_per_wakeup() {
        let lock = Arc::new(AdaptiveLock::new());
        lock.acquire();

        let (t2, rx) = park_second_thread(&lock);

        // Registration +1, post +1, wake -1; then the second thread's own
        // release sees a non-zero count and posts a wakeup nobody waits for.
        unsafe { lock.release() };
        rx.recv_timeout(Duration::from_secs(5))
            .expect("Parked thread never acquired the lock");
        t2.join().unwrap();

        assert!(!lock.is_locked());
        assert_eq!(lock.wakeups_posted(), 2);
        assert_eq!(lock.waiters(), 2);
        assert!(lock.is_wakeup_pending());
        assert!(lock.is_signal_queued(), "Stale wakeup should stay in the slot");

        // The stale wakeup is absorbed: further releases post nothing.
        lock.acquire();
        unsafe { lock.release() };
        assert_eq!(lock.wakeups_posted(), 2);
    }

    #[test]
    fn test_pending_flag_keeps_second_post_out_of_full_slot() {
        let lock = Arc::new(AdaptiveLock::new());
        lock.acquire();
        let (t2, rx) = park_second_thread(&lock);
        unsafe { lock.release() };
        rx.recv_timeout(Duration::from_secs(5))
            .expect("Parked thread never acquired the lock");
        t2.join().unwrap();
        assert!(lock.is_signal_queued());

        // With a stale wakeup queued, contended releases must all be gated.
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let lock = lock.clone();
                thread::spawn(move || {
                    for _ in 0..1_000 {
                        lock.acquire();
                        unsafe { lock.release() };
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().expect("a release posted into a full slot");
        }

        assert!(!lock.is_locked());
        assert_eq!(i64::from(lock.waiters()), lock.wakeups_posted() as i64);
    }

    #[test]
    fn test_waiter_count_wraps_past_i32_max() {
        let lock = AdaptiveLock::new();
        // As if 2^31 - 1 wakeups had already been posted.
        lock.waiters.store(i32::MAX, Relaxed);

        lock.acquire();
        unsafe { lock.release() };
        assert_eq!(lock.waiters(), i32::MIN);
        assert_eq!(lock.wakeups_posted(), 1);

        // Drain the wakeup the way a woken waiter would.
        lock.notify.wait();
        lock.wakeup_pending.store(false, Relaxed);

        // A negative count reads as "nobody waiting": no further posts.
        lock.acquire();
        unsafe { lock.release() };
        assert_eq!(lock.wakeups_posted(), 1);
        assert!(!lock.is_signal_queued());
    }

    #[test]
    #[should_panic(expected = "wakeup posted while a previous one is unconsumed")]
    fn test_release_rejects_post_into_full_slot() {
        let lock = AdaptiveLock::balanced();
        assert!(lock.notify.post());
        lock.waiters.store(1, Relaxed);

        lock.acquire();
        unsafe { lock.release() };
    }

    #[test]
    fn test_debug_output() {
        let lock = AdaptiveLock::new();
        let s = format!("{lock:?}");
        assert!(s.contains("locked: false"));
        assert!(s.contains("waiters: 0"));
    }
}
