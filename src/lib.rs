//! # Breakwater
//!
//! > *"Hold the swell back until the sea calms"*
//!
//! A small resilience primitive for code that calls flaky external services.
//!
//! ## How it works
//!
//! - Callers **signal** that a dependency failed. The matching [`ErrorState`] becomes raised.
//! - While raised, a background task **probes** the dependency through a caller-supplied
//!   [`Retry`] at a fixed delay.
//! - When a probe succeeds the state **clears**: queued resume callbacks run in the order
//!   they were queued and every [`ErrorStateListener`] is told.
//!
//! ## Quick Example
//!
//! ```rust
//! use breakwater::{ErrorState, Watcher};
//! use std::sync::atomic::{AtomicBool, Ordering};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! const DATABASE: u32 = 1;
//!
//! let mut watcher = Watcher::new();
//! watcher
//!     .register(
//!         ErrorState::builder(DATABASE, "database unreachable", || true)
//!             .delay(Duration::from_millis(10))
//!             .build()
//!             .unwrap(),
//!     )
//!     .unwrap();
//!
//! let resumed = Arc::new(AtomicBool::new(false));
//! let flag = resumed.clone();
//! watcher
//!     .signal_with(DATABASE, move || flag.store(true, Ordering::SeqCst))
//!     .unwrap();
//!
//! // The first probe runs immediately in the background.
//! let deadline = std::time::Instant::now() + Duration::from_secs(2);
//! while !resumed.load(Ordering::SeqCst) && std::time::Instant::now() < deadline {
//!     std::thread::sleep(Duration::from_millis(3));
//! }
//! assert!(resumed.load(Ordering::SeqCst));
//! watcher.shutdown();
//! ```
//!
//! ## Cargo features
//!
//! - `tracing` (default): emit transition and failure events through [`tracing`](https://docs.rs/tracing)
//! - `serde`: serialize [`ErrorStateSnapshot`] for diagnostics

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod error;
pub mod error_state;
pub mod listener;
pub mod retry;
pub mod scheduler;
pub mod testing;
pub mod watcher;

// Re-exports
pub use error::{ConfigError, WatcherError};
pub use error_state::{
    ErrorState, ErrorStateBuilder, ErrorStateId, ErrorStateSnapshot, DEFAULT_RETRY_DELAY,
};
#[cfg(feature = "tracing")]
pub use listener::TracingListener;
pub use listener::ErrorStateListener;
pub use retry::Retry;
pub use scheduler::{RetryScheduler, TokioRetryScheduler};
pub use watcher::Watcher;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{ConfigError, WatcherError};
    pub use crate::error_state::{ErrorState, ErrorStateId};
    pub use crate::listener::ErrorStateListener;
    pub use crate::retry::Retry;
    pub use crate::scheduler::RetryScheduler;
    pub use crate::watcher::Watcher;
}
