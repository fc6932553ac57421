//! Synchronization building blocks with optional loom support.
//!
//! Every atomic, mutex and condition variable the locks touch is imported from
//! here, so building with `--features loom` swaps them for loom's model-checked
//! versions without touching the lock code.

#[cfg(not(feature = "loom"))]
pub(crate) use std::sync::{
    atomic::{AtomicBool, AtomicI32, AtomicU64},
    Condvar, Mutex,
};

#[cfg(feature = "loom")]
pub(crate) use loom::sync::{
    atomic::{AtomicBool, AtomicI32, AtomicU64},
    Condvar, Mutex,
};

/// Gives up the rest of the current time slice.
#[cfg(not(feature = "loom"))]
#[inline]
pub(crate) fn yield_now() {
    std::thread::yield_now();
}

#[cfg(feature = "loom")]
#[inline]
pub(crate) fn yield_now() {
    loom::thread::yield_now();
}

/// Spin loop hint. Loom cannot observe a pause instruction, so the model
/// build yields to its scheduler instead.
#[cfg(not(feature = "loom"))]
#[inline(always)]
pub(crate) fn spin_loop() {
    core::hint::spin_loop();
}

#[cfg(feature = "loom")]
#[inline]
pub(crate) fn spin_loop() {
    loom::thread::yield_now();
}

/// Declares a constructor that is `const` in normal builds and a plain `fn`
/// under loom, whose primitives cannot be built in const context.
macro_rules! loom_const_fn {
    ($(#[$attr:meta])* $vis:vis fn $name:ident() -> $ret:ty $body:block) => {
        $(#[$attr])*
        #[cfg(not(feature = "loom"))]
        $vis const fn $name() -> $ret $body

        $(#[$attr])*
        #[cfg(feature = "loom")]
        $vis fn $name() -> $ret $body
    };
}
