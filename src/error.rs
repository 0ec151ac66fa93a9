//! Error types for batcher configuration.
//!
//! Handler failures are not represented here: a flush returns the
//! handler's own error value untouched.

use thiserror::Error;

/// Invalid construction or invocation arguments.
///
/// Raised before any item is queued. Never retried; the caller must fix
/// the call.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigurationError {
    /// The builder was finished without a flush handler.
    #[error("handler is required")]
    MissingHandler,

    /// No batch or chunk size was given.
    #[error("size is required")]
    SizeRequired,

    /// A batch or chunk size of zero was given.
    #[error("size must be positive")]
    SizeNotPositive,

    /// A zero flush interval was given.
    #[error("interval must be greater than 0")]
    IntervalNotPositive,

    /// Interval flushing was requested outside a tokio runtime.
    #[error("no tokio runtime available to drive interval flushes")]
    NoRuntime,
}

/// Validate an optional size argument.
pub(crate) fn require_positive(size: Option<usize>) -> Result<usize, ConfigurationError> {
    match size {
        None => Err(ConfigurationError::SizeRequired),
        Some(0) => Err(ConfigurationError::SizeNotPositive),
        Some(size) => Ok(size),
    }
}
