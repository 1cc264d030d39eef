//! The recovery probe consulted while an error state is raised.
//!
//! A [`Retry`] answers one question: has the dependency recovered? It is
//! called from a background thread, repeatedly, until it says yes.
//!
//! Any `Fn() -> bool` closure is a `Retry`:
//!
//! ```rust
//! use breakwater::Retry;
//! use std::sync::atomic::{AtomicU32, Ordering};
//!
//! let attempts = AtomicU32::new(0);
//! let probe = move || attempts.fetch_add(1, Ordering::SeqCst) >= 2;
//!
//! assert!(!probe.retry_successful());
//! assert!(!probe.retry_successful());
//! assert!(probe.retry_successful());
//! ```
//!
//! A probe that panics is treated as "not yet recovered" by
//! [`TokioRetryScheduler`](crate::TokioRetryScheduler); polling continues.

/// A caller-supplied recovery check.
pub trait Retry: Send + Sync {
    /// Returns `true` once the guarded dependency is usable again.
    fn retry_successful(&self) -> bool;
}

impl<F> Retry for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn retry_successful(&self) -> bool {
        self()
    }
}
