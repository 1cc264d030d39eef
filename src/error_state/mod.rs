//! The raised/cleared state machine for one failure mode.
//!
//! An [`ErrorState`] is either **cleared** (`raised_count == 0`) or **raised**.
//! Only two transitions have side effects:
//!
//! - **0 → 1** ([`raise`](ErrorState::raise)): listeners get `on_raise`, then
//!   retry polling is scheduled.
//! - **N → 0** ([`clear`](ErrorState::clear)): queued resumes run in FIFO
//!   order, then listeners get `on_clear`.
//!
//! Everything else only moves the counter. The counter is atomic and clear
//! swaps it to zero, so among concurrent callers exactly one performs each
//! transition.
//!
//! # Example
//!
//! ```rust
//! use breakwater::ErrorState;
//! use breakwater::testing::RecordingScheduler;
//! use std::sync::{Arc, Mutex};
//!
//! let state = ErrorState::builder(4, "inventory service down", || false)
//!     .scheduler(Arc::new(RecordingScheduler::new()))
//!     .build()
//!     .unwrap();
//!
//! let order = Arc::new(Mutex::new(Vec::new()));
//! let (first, second) = (order.clone(), order.clone());
//! state.raise_with(move || first.lock().unwrap().push("first"));
//! state.raise_with(move || second.lock().unwrap().push("second"));
//! assert_eq!(state.raised_count(), 2);
//!
//! state.clear();
//! assert!(!state.is_raised());
//! assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);
//! ```

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use crate::error::ConfigError;
use crate::listener::ErrorStateListener;
use crate::retry::Retry;
use crate::scheduler::{RetryScheduler, TokioRetryScheduler};

/// Identifier of an error state, unique within a [`Watcher`](crate::Watcher).
pub type ErrorStateId = u32;

/// Delay between retry probes when none is configured.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

type Resume = Box<dyn FnOnce() + Send + 'static>;

/// Tracks whether one external dependency is currently failing.
///
/// Cloning is cheap and every clone refers to the same state.
#[derive(Clone)]
pub struct ErrorState {
    inner: Arc<Inner>,
}

struct Inner {
    id: ErrorStateId,
    description: String,
    retry: Arc<dyn Retry>,
    delay: Duration,
    listeners: Vec<Arc<dyn ErrorStateListener>>,
    raised: AtomicU64,
    episode: AtomicU64,
    resumes: Mutex<Vec<Resume>>,
    scheduler: RwLock<Arc<dyn RetryScheduler>>,
}

impl ErrorState {
    /// Start building an error state.
    ///
    /// `retry` is the recovery probe polled while the state is raised.
    pub fn builder<R>(
        id: ErrorStateId,
        description: impl Into<String>,
        retry: R,
    ) -> ErrorStateBuilder
    where
        R: Retry + 'static,
    {
        ErrorStateBuilder {
            id,
            description: description.into(),
            retry: Arc::new(retry),
            delay: DEFAULT_RETRY_DELAY,
            listeners: Vec::new(),
            scheduler: None,
        }
    }

    /// Build an error state with the default delay, no listeners and its own
    /// [`TokioRetryScheduler`].
    pub fn new<R>(
        id: ErrorStateId,
        description: impl Into<String>,
        retry: R,
    ) -> Result<Self, ConfigError>
    where
        R: Retry + 'static,
    {
        Self::builder(id, description, retry).build()
    }

    /// The identifier this state is registered under.
    pub fn id(&self) -> ErrorStateId {
        self.inner.id
    }

    /// Human-readable description of the failure mode.
    pub fn description(&self) -> &str {
        &self.inner.description
    }

    /// Delay between retry probes.
    pub fn delay(&self) -> Duration {
        self.inner.delay
    }

    /// Returns true while at least one raise has not been cleared.
    pub fn is_raised(&self) -> bool {
        self.raised_count() > 0
    }

    /// Number of raises since the last clear.
    pub fn raised_count(&self) -> u64 {
        self.inner.raised.load(Ordering::SeqCst)
    }

    /// Number of cleared-to-raised transitions so far.
    ///
    /// A polling task compares this with the value it was scheduled for to
    /// notice that its episode is over.
    pub fn episode(&self) -> u64 {
        self.inner.episode.load(Ordering::SeqCst)
    }

    /// Record a failure.
    ///
    /// The call that moves the counter from 0 to 1 notifies listeners and
    /// schedules retry polling. Later calls only increment the counter.
    ///
    /// Every listener's `on_raise` returns before polling is scheduled, so
    /// `on_raise` always precedes the first probe and the `on_clear` that a
    /// successful probe triggers.
    pub fn raise(&self) {
        let count = self.inner.raised.fetch_add(1, Ordering::SeqCst) + 1;
        if count == 1 {
            self.activate();
        }
    }

    /// Record a failure and queue `resume` to run when the state clears.
    ///
    /// Each queued resume runs exactly once, on the thread performing the
    /// clear, after every resume queued before it.
    pub fn raise_with<F>(&self, resume: F)
    where
        F: FnOnce() + Send + 'static,
    {
        // Queue and count under one lock so a concurrent clear sees both or neither.
        let count = {
            let mut resumes = lock(&self.inner.resumes);
            resumes.push(Box::new(resume));
            self.inner.raised.fetch_add(1, Ordering::SeqCst) + 1
        };
        if count == 1 {
            self.activate();
        }
    }

    /// Mark the dependency as recovered.
    ///
    /// Runs queued resumes, then notifies listeners. A no-op when the state
    /// is already cleared.
    pub fn clear(&self) {
        let (previous, resumes) = {
            let mut pending = lock(&self.inner.resumes);
            let previous = self.inner.raised.swap(0, Ordering::SeqCst);
            if previous == 0 {
                return;
            }
            (previous, std::mem::take(&mut *pending))
        };

        #[cfg(feature = "tracing")]
        tracing::debug!(
            id = self.id(),
            description = self.description(),
            raised_count = previous,
            resumes = resumes.len(),
            "error state cleared"
        );
        #[cfg(not(feature = "tracing"))]
        let _ = previous;

        for resume in resumes {
            self.isolated("resume", resume);
        }
        for listener in &self.inner.listeners {
            self.isolated("on_clear", || listener.on_clear(self));
        }
    }

    /// Ask the retry probe whether the dependency recovered, clearing the
    /// state if it did.
    ///
    /// This is the hook a [`RetryScheduler`] polls.
    pub fn retry_successful(&self) -> bool {
        let successful = self.inner.retry.retry_successful();
        if successful {
            self.clear();
        }
        successful
    }

    /// Replace the scheduler used for future raises.
    pub fn set_retry_scheduler(&self, scheduler: Arc<dyn RetryScheduler>) {
        *self
            .inner
            .scheduler
            .write()
            .unwrap_or_else(PoisonError::into_inner) = scheduler;
    }

    /// Shut down this state's scheduler. No further probes run.
    pub fn shutdown(&self) {
        self.scheduler().shutdown();
    }

    /// Point-in-time view of this state for diagnostics.
    pub fn snapshot(&self) -> ErrorStateSnapshot {
        let raised_count = self.raised_count();
        ErrorStateSnapshot {
            id: self.id(),
            description: self.inner.description.clone(),
            raised: raised_count > 0,
            raised_count,
            episode: self.episode(),
            delay: self.delay(),
        }
    }

    /// Identity of the shared state behind this handle, equal for all clones.
    pub(crate) fn instance_key(&self) -> usize {
        Arc::as_ptr(&self.inner) as usize
    }

    fn activate(&self) {
        let _episode = self.inner.episode.fetch_add(1, Ordering::SeqCst) + 1;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            id = self.id(),
            description = self.description(),
            episode = _episode,
            "error state raised"
        );

        // Listeners hear about the raise before the first probe can clear it.
        for listener in &self.inner.listeners {
            self.isolated("on_raise", || listener.on_raise(self));
        }
        self.scheduler().schedule(self.clone(), self.inner.delay);
    }

    fn scheduler(&self) -> Arc<dyn RetryScheduler> {
        self.inner
            .scheduler
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn isolated(&self, _callback: &'static str, f: impl FnOnce()) {
        if panic::catch_unwind(AssertUnwindSafe(f)).is_err() {
            #[cfg(feature = "tracing")]
            tracing::error!(
                id = self.id(),
                description = self.description(),
                callback = _callback,
                "callback panicked; continuing with the remaining callbacks"
            );
        }
    }
}

impl fmt::Display for ErrorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inner.description)
    }
}

impl fmt::Debug for ErrorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorState")
            .field("id", &self.inner.id)
            .field("description", &self.inner.description)
            .field("raised_count", &self.raised_count())
            .field("episode", &self.episode())
            .field("delay", &self.inner.delay)
            .field("listeners", &self.inner.listeners.len())
            .field("retry", &"<retry>")
            .finish()
    }
}

/// Builder for [`ErrorState`].
///
/// # Examples
///
/// ```rust
/// use breakwater::ErrorState;
/// use std::time::Duration;
///
/// let state = ErrorState::builder(3, "billing gateway timeout", || true)
///     .delay(Duration::from_millis(500))
///     .build()
///     .unwrap();
///
/// assert_eq!(state.delay(), Duration::from_millis(500));
/// assert_eq!(state.to_string(), "billing gateway timeout");
/// # state.shutdown();
/// ```
pub struct ErrorStateBuilder {
    id: ErrorStateId,
    description: String,
    retry: Arc<dyn Retry>,
    delay: Duration,
    listeners: Vec<Arc<dyn ErrorStateListener>>,
    scheduler: Option<Arc<dyn RetryScheduler>>,
}

impl ErrorStateBuilder {
    /// Delay between retry probes. Defaults to [`DEFAULT_RETRY_DELAY`].
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Add a listener. Listeners are notified in the order they were added.
    pub fn listener<L>(mut self, listener: L) -> Self
    where
        L: ErrorStateListener + 'static,
    {
        self.listeners.push(Arc::new(listener));
        self
    }

    /// Add a listener that is shared with other error states.
    pub fn shared_listener(mut self, listener: Arc<dyn ErrorStateListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Use `scheduler` instead of starting a dedicated [`TokioRetryScheduler`].
    pub fn scheduler(mut self, scheduler: Arc<dyn RetryScheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Validate the configuration and build the error state.
    pub fn build(self) -> Result<ErrorState, ConfigError> {
        if self.description.trim().is_empty() {
            return Err(ConfigError::EmptyDescription);
        }
        if self.delay.is_zero() {
            return Err(ConfigError::ZeroDelay);
        }
        let scheduler: Arc<dyn RetryScheduler> = match self.scheduler {
            Some(scheduler) => scheduler,
            None => Arc::new(TokioRetryScheduler::new()?),
        };

        Ok(ErrorState {
            inner: Arc::new(Inner {
                id: self.id,
                description: self.description,
                retry: self.retry,
                delay: self.delay,
                listeners: self.listeners,
                raised: AtomicU64::new(0),
                episode: AtomicU64::new(0),
                resumes: Mutex::new(Vec::new()),
                scheduler: RwLock::new(scheduler),
            }),
        })
    }
}

impl fmt::Debug for ErrorStateBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorStateBuilder")
            .field("id", &self.id)
            .field("description", &self.description)
            .field("delay", &self.delay)
            .field("listeners", &self.listeners.len())
            .field("scheduler", &self.scheduler)
            .finish()
    }
}

/// Point-in-time view of an [`ErrorState`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ErrorStateSnapshot {
    /// Identifier of the error state.
    pub id: ErrorStateId,
    /// Description of the failure mode.
    pub description: String,
    /// Whether the state was raised.
    pub raised: bool,
    /// Raises since the last clear.
    pub raised_count: u64,
    /// Cleared-to-raised transitions so far.
    pub episode: u64,
    /// Delay between retry probes.
    pub delay: Duration,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
