use std::sync::Arc;

use thiserror::Error;

pub use color_eyre::eyre::eyre;

use crate::command::Operation;
use crate::diagnostics::CorrelationId;
use crate::native::NativeError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Bad config error: {0}")]
    BadConfigError(String),

    #[error("Bad usage error: {0}")]
    BadUsageError(String),

    #[error("No value supplied for parameter '{0}'")]
    MissingParameter(String),

    #[error("Duplicate parameter name '{0}'")]
    DuplicateParameter(String),

    #[error("Failed to bind parameter '{name}': {source}")]
    BindError { name: String, source: NativeError },

    #[error("Connection is not open")]
    ConnectionClosed,

    #[error("Connection is busy with another command or an open reader")]
    ConnectionBusy,

    #[error("Command {correlation_id} was cancelled")]
    Cancelled { correlation_id: CorrelationId },

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error("Library bug: {0}")]
    LibraryBug(color_eyre::Report),
}

/// The engine rejected or failed a statement
///
/// Carries the command text and correlation id so the failure can be matched
/// against the diagnostic events emitted for the same call.
#[derive(Debug, Error)]
#[error("{operation} command {correlation_id} failed: {source}")]
pub struct ExecutionError {
    pub correlation_id: CorrelationId,
    pub operation: Operation,
    pub command_text: Arc<str>,
    pub source: NativeError,
}

/// Coarse classification of [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Detected before any native I/O; retrying without a change will fail again
    Configuration,
    /// The caller's cancellation signal stopped the call
    Cancellation,
    /// The native engine reported a failure
    Execution,
    /// An internal invariant was violated
    Internal,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::BadConfigError(_)
            | Error::BadUsageError(_)
            | Error::MissingParameter(_)
            | Error::DuplicateParameter(_)
            | Error::BindError { .. }
            | Error::ConnectionClosed
            | Error::ConnectionBusy => ErrorKind::Configuration,
            Error::Cancelled { .. } => ErrorKind::Cancellation,
            Error::Execution(_) => ErrorKind::Execution,
            Error::LibraryBug(_) => ErrorKind::Internal,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled { .. })
    }

    /// Correlation id of the call that produced this error, if it got far enough to have one
    pub fn correlation_id(&self) -> Option<CorrelationId> {
        match self {
            Error::Cancelled { correlation_id } => Some(*correlation_id),
            Error::Execution(err) => Some(err.correlation_id),
            _ => None,
        }
    }
}

impl From<std::convert::Infallible> for Error {
    fn from(err: std::convert::Infallible) -> Self {
        match err {}
    }
}

pub type Result<T> = std::result::Result<T, Error>;
