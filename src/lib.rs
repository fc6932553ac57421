//! # adaptive-lock 🌀
//!
//! A lock that behaves like a **spin lock while contention is low** and
//! **parks its excess waiters while contention is high**.
//!
//! The crate includes:
//!
//! - [`SpinLock`] — a raw test-and-set spin lock with cooperative backoff.
//! - [`AdaptiveLock`] — a spin lock fast path composed with a blocking slow
//!   path that wakes one waiter at a time.
//! - [`BackOff`] — exponential spinning that ends in yielding the time slice.
//! - [`Lockable`] — the raw `acquire`/`release` capability both locks share.
//! - [`Mutex`] — a value protected by any [`Lockable`], with an RAII guard.
//!
//! ## ✨ Features
//!
//! - ⚡ Uncontended acquire/release is two compare-and-swaps and two stores
//! - 💤 Contended waiters block instead of burning CPU
//! - 🔔 At most one wakeup in flight at any time
//! - 🧩 Optional [`lock_api`](https://docs.rs/lock_api) integration (`lock_api` feature)
//! - 🧪 Model-checkable with [`loom`](https://docs.rs/loom) (`loom` feature)
//! - 📊 Contention comparison binary (`cli` feature)
//!
//! ## 🚀 Quick Example
//!
//! ```rust
//! use adaptive_lock::{AdaptiveLock, AdaptiveMutex};
//!
//! // Example 1: the raw lock
//! let lock = AdaptiveLock::new();
//! lock.acquire();
//! // critical section
//! // SAFETY: acquired above on this thread.
//! unsafe { lock.release() };
//!
//! // Example 2: protecting data
//! let counter = AdaptiveMutex::new(0);
//! {
//!     let mut guard = counter.lock();
//!     *guard += 1;
//! } // automatically unlocked when guard is dropped
//! assert_eq!(*counter.lock(), 1);
//! ```
//!
//! ## 🧠 Design
//!
//! ### SpinLock
//!
//! `SpinLock` is one atomic flag taken with compare-and-swap (`Acquire`) and
//! cleared with a store (`Release`). Failed attempts back off through
//! [`BackOff`], yielding once the short spin budget is spent.
//!
//! ### AdaptiveLock
//!
//! `AdaptiveLock` holds two spin locks (the ownership flag and a guard for its
//! bookkeeping), a waiter count, a wakeup-pending flag and a single-slot
//! notification. Every attempt on the ownership flag is made under the
//! guard, so registering as a waiter can never race a successful acquire.
//! A release posts a wakeup only when someone is registered and no wakeup is
//! already in flight, which keeps the slot from ever overflowing. The woken
//! thread is not handed the lock; it retries like any newcomer.
//!
//! ## ⚠️ Safety & Usage Notes
//!
//! - Neither lock is fair, re-entrant or poisoning.
//! - `release` is `unsafe`: only the current owner may call it, once per
//!   acquisition. Prefer [`Mutex`] and its guard.
//! - Never hold a `SpinLock` across blocking calls.
//!
//! ## 📦 Modules
//!
//! - [`adaptive`] — the adaptive lock and its waiter accounting policies.
//! - [`backoff`] — exponential spin-then-yield backoff.
//! - [`spinlock`] — the raw spin lock.
//! - [`mutex`] — the data-owning wrapper.
//! - `lock_api` — `lock_api::RawMutex` impls (feature `lock_api`).

#[macro_use]
mod sync;

pub mod adaptive;
pub mod backoff;
pub mod lockable;
pub mod mutex;
mod signal;
pub mod spinlock;

#[cfg(all(feature = "lock_api", not(feature = "loom")))]
pub mod lock_api;

pub use adaptive::{Accounting, AdaptiveLock, Balanced, Compensated};
pub use backoff::BackOff;
pub use lockable::Lockable;
pub use mutex::{AdaptiveMutex, Mutex, MutexGuard, SpinMutex};
pub use spinlock::SpinLock;
