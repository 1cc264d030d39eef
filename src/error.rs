//! Error types for error-state construction and watcher lookups.
//!
//! Both kinds are programming errors: they surface while wiring error states
//! at startup, never while raising or clearing under load.

use std::fmt;
use std::io;

use crate::error_state::ErrorStateId;

/// Error returned when an [`ErrorState`](crate::ErrorState) cannot be built.
///
/// # Examples
///
/// ```rust
/// use breakwater::{ConfigError, ErrorState};
///
/// let err = ErrorState::builder(1, "   ", || true).build().unwrap_err();
/// assert!(matches!(err, ConfigError::EmptyDescription));
/// ```
#[derive(Debug)]
pub enum ConfigError {
    /// The description was empty or only whitespace.
    EmptyDescription,
    /// The retry delay was zero, which would spin the probe.
    ZeroDelay,
    /// The background runtime for retry polling could not be started.
    Runtime(io::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyDescription => write!(f, "error state description must not be empty"),
            Self::ZeroDelay => write!(f, "retry delay must be greater than zero"),
            Self::Runtime(e) => write!(f, "failed to start retry runtime: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Runtime(e) => Some(e),
            Self::EmptyDescription | Self::ZeroDelay => None,
        }
    }
}

/// Error returned by [`Watcher`](crate::Watcher) registration and lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatcherError {
    /// An error state with this id is already registered.
    DuplicateId(ErrorStateId),
    /// No error state with this id is registered.
    UnknownId(ErrorStateId),
}

impl WatcherError {
    /// The id the failed operation referred to.
    pub fn id(&self) -> ErrorStateId {
        match self {
            Self::DuplicateId(id) | Self::UnknownId(id) => *id,
        }
    }
}

impl fmt::Display for WatcherError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateId(id) => write!(f, "error state with id {} is already registered", id),
            Self::UnknownId(id) => write!(f, "no error state registered with id {}", id),
        }
    }
}

impl std::error::Error for WatcherError {}

#[cfg(test)]
mod error_tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_config_error_display() {
        assert!(ConfigError::EmptyDescription
            .to_string()
            .contains("must not be empty"));
        assert!(ConfigError::ZeroDelay.to_string().contains("greater than zero"));
    }

    #[test]
    fn test_config_error_runtime_has_source() {
        let err = ConfigError::Runtime(io::Error::other("no threads"));
        assert!(err.to_string().contains("no threads"));
        assert!(err.source().is_some());
        assert!(ConfigError::ZeroDelay.source().is_none());
    }

    #[test]
    fn test_watcher_error_display() {
        let duplicate = WatcherError::DuplicateId(7);
        assert_eq!(
            duplicate.to_string(),
            "error state with id 7 is already registered"
        );

        let unknown = WatcherError::UnknownId(9);
        assert_eq!(unknown.to_string(), "no error state registered with id 9");
    }

    #[test]
    fn test_watcher_error_id() {
        assert_eq!(WatcherError::DuplicateId(3).id(), 3);
        assert_eq!(WatcherError::UnknownId(4).id(), 4);
    }
}
