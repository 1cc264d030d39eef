//! Background retry polling for raised error states.
//!
//! When an [`ErrorState`] becomes raised it hands itself to its
//! [`RetryScheduler`]. The scheduler probes immediately, then again after
//! every `delay`, until [`ErrorState::retry_successful`] returns `true`. The
//! successful tick ends the polling task from inside the task itself, so
//! there is no window in which a next tick is queued after recovery.
//!
//! # Independence
//!
//! [`TokioRetryScheduler`] runs every schedule as its own task on a
//! multi-threaded runtime, and probes on the blocking pool. A slow probe or a
//! long delay on one error state never holds back another's cadence, so a
//! single scheduler may be shared between many error states:
//!
//! ```rust
//! use breakwater::{ErrorState, TokioRetryScheduler};
//! use std::time::Duration;
//!
//! let pool = TokioRetryScheduler::shared().unwrap();
//!
//! let database = ErrorState::builder(1, "database unreachable", || true)
//!     .scheduler(pool.clone())
//!     .build()
//!     .unwrap();
//! let search = ErrorState::builder(2, "search index unreachable", || true)
//!     .delay(Duration::from_secs(30))
//!     .scheduler(pool.clone())
//!     .build()
//!     .unwrap();
//! # drop((database, search));
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::{abortable, AbortHandle};
use tokio::runtime::Runtime;

use crate::error::ConfigError;
use crate::error_state::ErrorState;

/// Polls raised error states until they recover.
///
/// Implementations must not block the caller of [`schedule`](Self::schedule):
/// it is invoked on the thread that raised the error state.
pub trait RetryScheduler: Send + Sync + fmt::Debug {
    /// Start polling `error_state` every `delay`, beginning immediately.
    ///
    /// Polling stops on the first tick where
    /// [`ErrorState::retry_successful`] returns `true`.
    fn schedule(&self, error_state: ErrorState, delay: Duration);

    /// Stop all polling and release the worker threads.
    ///
    /// Best effort and immediate: ticks that are mid-probe may complete, no
    /// new ticks start. Calling it more than once is harmless.
    fn shutdown(&self);
}

/// Default [`RetryScheduler`] backed by a dedicated tokio runtime.
#[derive(Debug)]
pub struct TokioRetryScheduler {
    runtime: Mutex<Option<Runtime>>,
    // Keyed by error-state instance; ids are only unique within one watcher.
    tasks: Mutex<HashMap<usize, AbortHandle>>,
}

impl TokioRetryScheduler {
    /// Start a scheduler with its own single worker thread.
    ///
    /// Probes run on the runtime's blocking pool, so one worker is enough to
    /// drive any number of independent polling loops.
    pub fn new() -> Result<Self, ConfigError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("breakwater-retry")
            .enable_time()
            .build()
            .map_err(ConfigError::Runtime)?;

        Ok(Self {
            runtime: Mutex::new(Some(runtime)),
            tasks: Mutex::new(HashMap::new()),
        })
    }

    /// Start a scheduler meant to be shared by several error states.
    pub fn shared() -> Result<std::sync::Arc<Self>, ConfigError> {
        Self::new().map(std::sync::Arc::new)
    }

    /// Returns true once [`shutdown`](RetryScheduler::shutdown) has run.
    pub fn is_shutdown(&self) -> bool {
        lock(&self.runtime).is_none()
    }
}

impl RetryScheduler for TokioRetryScheduler {
    fn schedule(&self, error_state: ErrorState, delay: Duration) {
        let runtime = lock(&self.runtime);
        let Some(runtime) = runtime.as_ref() else {
            #[cfg(feature = "tracing")]
            tracing::warn!(
                id = error_state.id(),
                description = error_state.description(),
                "retry scheduler is shut down; not polling"
            );
            return;
        };

        let key = error_state.instance_key();
        let episode = error_state.episode();
        let (task, handle) = abortable(poll_until_recovered(error_state, delay, episode));
        runtime.spawn(task);

        // One live polling task per error state: a newer episode replaces the old one.
        if let Some(previous) = lock(&self.tasks).insert(key, handle) {
            previous.abort();
        }
    }

    fn shutdown(&self) {
        for (_, handle) in lock(&self.tasks).drain() {
            handle.abort();
        }
        if let Some(runtime) = lock(&self.runtime).take() {
            runtime.shutdown_background();
            #[cfg(feature = "tracing")]
            tracing::debug!("retry scheduler shut down");
        }
    }
}

impl Drop for TokioRetryScheduler {
    fn drop(&mut self) {
        // Dropping a Runtime inside another runtime panics; shutdown_background does not.
        self.shutdown();
    }
}

async fn poll_until_recovered(error_state: ErrorState, delay: Duration, episode: u64) {
    loop {
        if error_state.episode() != episode || !error_state.is_raised() {
            #[cfg(feature = "tracing")]
            tracing::debug!(
                id = error_state.id(),
                episode,
                "episode ended elsewhere; stopping retry polling"
            );
            return;
        }

        let probe = error_state.clone();
        match tokio::task::spawn_blocking(move || probe.retry_successful()).await {
            Ok(true) => return,
            Ok(false) => {}
            Err(_err) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    id = error_state.id(),
                    description = error_state.description(),
                    error = %_err,
                    "retry probe failed; treating as not recovered"
                );
            }
        }

        tokio::time::sleep(delay).await;
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
