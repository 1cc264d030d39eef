//! Observers of error-state transitions.

use crate::error_state::ErrorState;

/// Observes raise and clear transitions of an [`ErrorState`].
///
/// Listeners are fixed when the error state is built and are called
/// synchronously, in registration order, on the thread performing the
/// transition. `on_raise` fires once per episode (the Cleared to Raised
/// transition), `on_clear` once when that episode ends. `on_raise` runs
/// before retry polling starts, so a probe never clears an episode whose
/// raise has not been delivered yet.
///
/// A panicking listener is logged and skipped; the remaining listeners still
/// run.
pub trait ErrorStateListener: Send + Sync {
    /// The error state went from cleared to raised.
    fn on_raise(&self, error_state: &ErrorState);

    /// The error state went from raised to cleared.
    fn on_clear(&self, error_state: &ErrorState);
}

/// Listener that reports transitions as `tracing` events.
///
/// Raises are logged at `WARN`, clears at `INFO`.
#[cfg(feature = "tracing")]
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingListener;

#[cfg(feature = "tracing")]
impl ErrorStateListener for TracingListener {
    fn on_raise(&self, error_state: &ErrorState) {
        tracing::warn!(
            id = error_state.id(),
            description = error_state.description(),
            "error state raised"
        );
    }

    fn on_clear(&self, error_state: &ErrorState) {
        tracing::info!(
            id = error_state.id(),
            description = error_state.description(),
            "error state cleared"
        );
    }
}
