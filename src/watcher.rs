//! Registry of error states, addressed by id.
//!
//! A [`Watcher`] is filled at startup with every [`ErrorState`] the
//! application knows about, then shared with the code that calls external
//! dependencies. Those callers only need an id:
//!
//! ```rust
//! use breakwater::{ErrorState, Watcher, WatcherError};
//!
//! const MAIL_RELAY: u32 = 7;
//!
//! #[derive(Debug)]
//! struct SendFailed;
//!
//! fn send(watcher: &Watcher) -> Result<(), SendFailed> {
//!     // ... the relay refused the connection
//!     watcher.signal_and_fail(MAIL_RELAY, SendFailed)
//! }
//!
//! let mut watcher = Watcher::new();
//! watcher
//!     .register(ErrorState::new(MAIL_RELAY, "mail relay refusing connections", || false).unwrap())
//!     .unwrap();
//!
//! assert!(send(&watcher).is_err());
//! assert!(watcher.get(MAIL_RELAY).unwrap().is_raised());
//!
//! assert_eq!(watcher.signal(99), Err(WatcherError::UnknownId(99)));
//! watcher.shutdown();
//! ```
//!
//! Unknown ids are reported as [`WatcherError::UnknownId`] and change nothing.

use std::collections::HashMap;

use crate::error::WatcherError;
use crate::error_state::{ErrorState, ErrorStateId, ErrorStateSnapshot};

/// Routes signals and clears to registered [`ErrorState`]s.
#[derive(Debug, Default)]
pub struct Watcher {
    error_states: HashMap<ErrorStateId, ErrorState>,
}

impl Watcher {
    /// Create an empty watcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an error state.
    ///
    /// Fails with [`WatcherError::DuplicateId`] if its id is taken; the
    /// registered state is left untouched.
    pub fn register(&mut self, error_state: ErrorState) -> Result<(), WatcherError> {
        let id = error_state.id();
        if self.error_states.contains_key(&id) {
            return Err(WatcherError::DuplicateId(id));
        }
        self.error_states.insert(id, error_state);
        Ok(())
    }

    /// Look up an error state.
    pub fn get(&self, id: ErrorStateId) -> Option<&ErrorState> {
        self.error_states.get(&id)
    }

    /// Raise the error state registered under `id`.
    pub fn signal(&self, id: ErrorStateId) -> Result<(), WatcherError> {
        self.lookup(id)?.raise();
        Ok(())
    }

    /// Raise the error state registered under `id` and queue `resume` to run
    /// once it clears.
    pub fn signal_with<F>(&self, id: ErrorStateId, resume: F) -> Result<(), WatcherError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.lookup(id)?.raise_with(resume);
        Ok(())
    }

    /// Raise the error state under `id`, then hand `error` back as `Err`.
    ///
    /// Lets a failing call record the outage and still propagate its own
    /// error with `?`. If `id` is unknown the failure is logged and `error`
    /// is returned all the same.
    pub fn signal_and_fail<T, E>(&self, id: ErrorStateId, error: E) -> Result<T, E> {
        self.report(self.signal(id));
        Err(error)
    }

    /// Like [`signal_and_fail`](Self::signal_and_fail), also queueing
    /// `resume`.
    pub fn signal_with_and_fail<T, E, F>(
        &self,
        id: ErrorStateId,
        resume: F,
        error: E,
    ) -> Result<T, E>
    where
        F: FnOnce() + Send + 'static,
    {
        self.report(self.signal_with(id, resume));
        Err(error)
    }

    /// Clear the error state registered under `id`.
    pub fn clear(&self, id: ErrorStateId) -> Result<(), WatcherError> {
        self.lookup(id)?.clear();
        Ok(())
    }

    /// Error states that are currently raised, in no particular order.
    pub fn raised(&self) -> impl Iterator<Item = &ErrorState> {
        self.error_states.values().filter(|state| state.is_raised())
    }

    /// Snapshots of every registered error state, ordered by id.
    pub fn snapshot(&self) -> Vec<ErrorStateSnapshot> {
        let mut snapshots: Vec<_> = self
            .error_states
            .values()
            .map(ErrorState::snapshot)
            .collect();
        snapshots.sort_by_key(|snapshot| snapshot.id);
        snapshots
    }

    /// Number of registered error states.
    pub fn len(&self) -> usize {
        self.error_states.len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.error_states.is_empty()
    }

    /// Shut down the scheduler of every registered error state.
    ///
    /// Call once at application teardown.
    pub fn shutdown(&self) {
        for error_state in self.error_states.values() {
            error_state.shutdown();
        }
    }

    fn lookup(&self, id: ErrorStateId) -> Result<&ErrorState, WatcherError> {
        self.error_states
            .get(&id)
            .ok_or(WatcherError::UnknownId(id))
    }

    fn report(&self, signalled: Result<(), WatcherError>) {
        if let Err(_err) = signalled {
            #[cfg(feature = "tracing")]
            tracing::error!(error = %_err, "could not record failure");
        }
    }
}
