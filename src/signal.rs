//! Single-slot blocking notification.
//!
//! A binary semaphore: [`Signal::post`] fills the slot without ever blocking,
//! [`Signal::wait`] parks the calling thread until the slot is full and then
//! empties it.

use std::sync::PoisonError;

use crate::sync::{Condvar, Mutex};

#[derive(Debug)]
pub(crate) struct Signal {
    full: Mutex<bool>,
    cond: Condvar,
}

impl Signal {
    loom_const_fn! {
        pub(crate) fn new() -> Self {
            Signal {
                full: Mutex::new(false),
                cond: Condvar::new(),
            }
        }
    }

    /// Fills the slot and wakes one waiter.
    ///
    /// Returns `false` if the slot was already full, in which case the post
    /// is absorbed by the pending one.
    pub(crate) fn post(&self) -> bool {
        let mut full = self.full.lock().unwrap_or_else(PoisonError::into_inner);
        if *full {
            return false;
        }
        *full = true;
        drop(full);

        self.cond.notify_one();
        true
    }

    /// Blocks until the slot is full, then empties it.
    pub(crate) fn wait(&self) {
        let mut full = self.full.lock().unwrap_or_else(PoisonError::into_inner);
        while !*full {
            full = self.cond.wait(full).unwrap_or_else(PoisonError::into_inner);
        }
        *full = false;
    }

    /// Whether a posted signal is still waiting to be consumed.
    pub(crate) fn is_full(&self) -> bool {
        *self.full.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
