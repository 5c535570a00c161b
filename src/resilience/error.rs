//! Failure taxonomy shared by every external call.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// What is being attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    TextGeneration,
    ImageGeneration,
    DocumentConversion,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::TextGeneration => "text-gen",
            OperationKind::ImageGeneration => "image-gen",
            OperationKind::DocumentConversion => "pdf-convert",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure reported by a single backend call.
#[derive(Debug, Clone, Error)]
pub enum CallError {
    /// The external quota was exceeded; the same backend may be retried.
    #[error("throttled: {message}")]
    Throttled {
        message: String,
        /// Delay suggested by the remote side, if any.
        retry_after: Option<Duration>,
    },

    /// A dependency of the backend is missing.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// The backend failed in a way retrying will not fix.
    #[error("backend error: {0}")]
    Backend(String),
}

impl CallError {
    pub fn throttled(message: impl Into<String>) -> Self {
        CallError::Throttled {
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        CallError::Unavailable(message.into())
    }

    pub fn backend(message: impl Into<String>) -> Self {
        CallError::Backend(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CallError::Throttled { .. } => ErrorKind::Throttled,
            CallError::Unavailable(_) => ErrorKind::BackendUnavailable,
            CallError::Backend(_) => ErrorKind::BackendError,
        }
    }
}

/// The four-way classification of failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Throttled,
    BackendUnavailable,
    BackendError,
    AllBackendsExhausted,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Throttled => "throttled",
            ErrorKind::BackendUnavailable => "backend-unavailable",
            ErrorKind::BackendError => "backend-error",
            ErrorKind::AllBackendsExhausted => "all-backends-exhausted",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How one attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Succeeded,
    Failed(ErrorKind),
}

impl AttemptOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptOutcome::Succeeded => "success",
            AttemptOutcome::Failed(kind) => kind.as_str(),
        }
    }
}

/// One call made by the executor.
#[derive(Debug, Clone)]
pub struct AttemptRecord {
    pub backend: String,
    /// 1-based attempt number on this backend.
    pub attempt: u32,
    pub outcome: AttemptOutcome,
    /// Time spent blocked on the rate budget before the call.
    pub rate_wait: Duration,
    /// Backoff slept after this attempt, if it was retried.
    pub backoff: Option<Duration>,
    pub message: Option<String>,
}

/// Terminal failure of an operation.
#[derive(Debug, Clone, Error)]
pub enum ExecuteError {
    #[error("all backends exhausted for {kind} after {} attempt(s)", .attempts.len())]
    AllBackendsExhausted {
        kind: OperationKind,
        attempts: Vec<AttemptRecord>,
    },
}

impl ExecuteError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::AllBackendsExhausted
    }

    pub fn attempts(&self) -> &[AttemptRecord] {
        match self {
            ExecuteError::AllBackendsExhausted { attempts, .. } => attempts,
        }
    }

    /// Message of the last failed attempt, for user-facing summaries.
    pub fn last_message(&self) -> Option<&str> {
        self.attempts().iter().rev().find_map(|a| a.message.as_deref())
    }
}

/// A successful operation.
#[derive(Debug, Clone)]
pub struct Success<T> {
    pub value: T,
    /// Backend that produced the value.
    pub backend: String,
    pub attempts: Vec<AttemptRecord>,
}

impl<T> Success<T> {
    pub fn into_value(self) -> T {
        self.value
    }
}

/// Result of [`Executor::execute`](crate::resilience::Executor::execute).
pub type OperationResult<T> = Result<Success<T>, ExecuteError>;
