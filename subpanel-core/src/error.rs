//! Error types for subpanel store operations

use thiserror::Error;

/// Errors raised by the transport collaborators that perform fetches.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("Request for module {module} failed: {reason}")]
    RequestFailed { module: String, reason: String },

    #[error("Invalid response for module {module}: {reason}")]
    InvalidResponse { module: String, reason: String },

    #[error("Request for module {module} timed out")]
    Timeout { module: String },
}

/// Errors raised by the stores themselves.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Store has been cleared: {store}")]
    Closed { store: &'static str },

    #[error("Statistic not registered: {key}")]
    UnknownStatistic { key: String },

    #[error("Fetch task failed: {reason}")]
    TaskFailed { reason: String },

    #[error("No async runtime available to run the fetch")]
    NoRuntime,

    #[error("Store lock poisoned")]
    LockPoisoned,
}

/// Master error type for subpanel operations.
///
/// Cloneable so one failed fetch can be replayed to every subscriber
/// sharing it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SubpanelError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Result type alias for subpanel operations.
pub type SubpanelResult<T> = Result<T, SubpanelError>;

// =============================================================================
// TESTS
// =============================================================================
