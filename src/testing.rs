//! Testing utilities for code that uses error states.
//!
//! This module provides test doubles for each seam of an [`ErrorState`]: a
//! probe that counts its calls, a listener that records transitions, and a
//! scheduler that records requests without polling. It also has assertion
//! macros and a helper for waiting on background recovery.
//!
//! # Examples
//!
//! ## Observing transitions without background threads
//!
//! ```rust
//! use breakwater::ErrorState;
//! use breakwater::testing::{CountingRetry, ListenerEvent, RecordingListener, RecordingScheduler};
//! use std::sync::Arc;
//!
//! let listener = RecordingListener::new();
//! let scheduler = Arc::new(RecordingScheduler::new());
//! let state = ErrorState::builder(1, "error", CountingRetry::new(1))
//!     .listener(listener.clone())
//!     .scheduler(scheduler.clone())
//!     .build()
//!     .unwrap();
//!
//! state.raise();
//! state.raise();
//! assert_eq!(listener.events(), vec![ListenerEvent::Raised(1)]);
//! assert_eq!(scheduler.schedule_count(), 1);
//! ```
//!
//! ## Assertion Macros
//!
//! ```rust
//! use breakwater::{assert_cleared, assert_raised, ErrorState};
//! use breakwater::testing::RecordingScheduler;
//! use std::sync::Arc;
//!
//! let state = ErrorState::builder(1, "error", || false)
//!     .scheduler(Arc::new(RecordingScheduler::new()))
//!     .build()
//!     .unwrap();
//! assert_cleared!(state);
//!
//! state.raise();
//! assert_raised!(state, 1);
//! ```

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::error_state::{ErrorState, ErrorStateId};
use crate::listener::ErrorStateListener;
use crate::retry::Retry;
use crate::scheduler::RetryScheduler;

/// Probe that reports recovery on its `succeed_on`-th call and after.
///
/// Clones share the call counter.
#[derive(Debug, Clone)]
pub struct CountingRetry {
    succeed_on: u32,
    calls: Arc<AtomicU32>,
}

impl CountingRetry {
    /// Succeed on call number `succeed_on` (1-based).
    pub fn new(succeed_on: u32) -> Self {
        Self {
            succeed_on,
            calls: Arc::new(AtomicU32::new(0)),
        }
    }

    /// A probe that never reports recovery.
    pub fn never() -> Self {
        Self::new(u32::MAX)
    }

    /// How many times the probe was called.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Retry for CountingRetry {
    fn retry_successful(&self) -> bool {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        call >= self.succeed_on
    }
}

/// A transition seen by a [`RecordingListener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerEvent {
    /// `on_raise` for the error state with this id.
    Raised(ErrorStateId),
    /// `on_clear` for the error state with this id.
    Cleared(ErrorStateId),
}

/// Listener that records every callback in order.
///
/// Clones share the recorded events.
#[derive(Debug, Clone, Default)]
pub struct RecordingListener {
    events: Arc<Mutex<Vec<ListenerEvent>>>,
}

impl RecordingListener {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded events, oldest first.
    pub fn events(&self) -> Vec<ListenerEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of `on_raise` calls.
    pub fn raises(&self) -> usize {
        self.count(|e| matches!(e, ListenerEvent::Raised(_)))
    }

    /// Number of `on_clear` calls.
    pub fn clears(&self) -> usize {
        self.count(|e| matches!(e, ListenerEvent::Cleared(_)))
    }

    fn count(&self, predicate: impl Fn(&ListenerEvent) -> bool) -> usize {
        self.events().iter().filter(|e| predicate(e)).count()
    }

    fn record(&self, event: ListenerEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

impl ErrorStateListener for RecordingListener {
    fn on_raise(&self, error_state: &ErrorState) {
        self.record(ListenerEvent::Raised(error_state.id()));
    }

    fn on_clear(&self, error_state: &ErrorState) {
        self.record(ListenerEvent::Cleared(error_state.id()));
    }
}

/// Scheduler that records requests and never polls.
///
/// Use it to drive an [`ErrorState`] by hand, calling
/// [`ErrorState::retry_successful`] or [`ErrorState::clear`] directly.
#[derive(Debug, Default)]
pub struct RecordingScheduler {
    scheduled: Mutex<Vec<(ErrorStateId, Duration)>>,
    shutdowns: AtomicU32,
}

impl RecordingScheduler {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `schedule` call as `(id, delay)`, oldest first.
    pub fn scheduled(&self) -> Vec<(ErrorStateId, Duration)> {
        self.scheduled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of `schedule` calls.
    pub fn schedule_count(&self) -> usize {
        self.scheduled().len()
    }

    /// Number of `shutdown` calls.
    pub fn shutdown_count(&self) -> u32 {
        self.shutdowns.load(Ordering::SeqCst)
    }
}

impl RetryScheduler for RecordingScheduler {
    fn schedule(&self, error_state: ErrorState, delay: Duration) {
        self.scheduled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((error_state.id(), delay));
    }

    fn shutdown(&self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}

/// Shared flag set by a resume callback.
#[derive(Debug, Clone, Default)]
pub struct ResumeFlag {
    resumed: Arc<AtomicBool>,
}

impl ResumeFlag {
    /// Create an unset flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// A resume callback that sets this flag.
    pub fn resume(&self) -> impl FnOnce() + Send + 'static {
        let resumed = self.resumed.clone();
        move || resumed.store(true, Ordering::SeqCst)
    }

    /// Whether a callback from [`resume`](Self::resume) has run.
    pub fn is_resumed(&self) -> bool {
        self.resumed.load(Ordering::SeqCst)
    }
}

/// Poll `condition` every few milliseconds until it holds or `timeout`
/// passes. Returns whether it held.
///
/// ```rust
/// use breakwater::testing::wait_until;
/// use std::time::Duration;
///
/// assert!(wait_until(Duration::from_millis(10), || true));
/// assert!(!wait_until(Duration::from_millis(10), || false));
/// ```
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(3));
    }
}

/// Assert that an error state is raised, optionally with an exact count.
#[macro_export]
macro_rules! assert_raised {
    ($state:expr) => {
        match &$state {
            state => {
                if !state.is_raised() {
                    panic!("Expected error state `{}` to be raised, but it is cleared", state);
                }
            }
        }
    };
    ($state:expr, $count:expr) => {
        match &$state {
            state => {
                $crate::assert_raised!(state);
                assert_eq!(
                    state.raised_count(),
                    $count,
                    "Unexpected raised count for error state `{}`",
                    state
                );
            }
        }
    };
}

/// Assert that an error state is cleared.
#[macro_export]
macro_rules! assert_cleared {
    ($state:expr) => {
        match &$state {
            state => {
                if state.is_raised() {
                    panic!(
                        "Expected error state `{}` to be cleared, but it was raised {} times",
                        state,
                        state.raised_count()
                    );
                }
            }
        }
    };
}
