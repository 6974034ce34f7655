//! Error types for remote API operations

use std::fmt;

/// How a failed remote call should be handled by the credential pool.
///
/// - RateLimited: quota exhausted on this credential, rotate to the next
/// - Transient: outage or timeout, rotate to the next
/// - Unauthorized: credential rejected (401), stop using it
/// - Fatal: the request itself is wrong, retrying cannot help
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    RateLimited,
    Transient,
    Unauthorized,
    Fatal,
}

impl ErrorKind {
    /// Label for logging and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::Transient => "transient",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Fatal => "fatal",
        }
    }

    /// Whether another credential (or a later attempt) may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::RateLimited | ErrorKind::Transient)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A failed remote call.
///
/// `status` is the HTTP status when the server answered; `code` is the
/// Twitter error code from the response body when one was present.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} remote error: {message}")]
pub struct ApiError {
    pub kind: ErrorKind,
    pub status: Option<u16>,
    pub code: Option<u32>,
    pub message: String,
}

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            code: None,
            message: message.into(),
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RateLimited, message)
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transient, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthorized, message)
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Fatal, message)
    }

    /// Attach the HTTP status the error came from.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Whether the server reported the requested entity does not exist.
    pub fn is_not_found(&self) -> bool {
        self.status == Some(404)
    }
}

/// Result alias for remote calls.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Errors reading or validating credential records.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("credential parse error on line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("invalid credential {label}: {reason}")]
    Invalid { label: String, reason: String },
}
