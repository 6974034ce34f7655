//! Error types for pool operations

use twitter_api::ApiError;

/// Errors from pool operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Nothing to run the operation with. A configuration problem, never
    /// retried.
    #[error("no credentials available: {0}")]
    NoCredentials(String),

    /// The remote API rejected the request in a way no other credential can
    /// fix.
    #[error("remote call failed: {0}")]
    Api(#[from] ApiError),

    #[error("operation cancelled")]
    Cancelled,
}

/// Result alias for pool operations.
pub type Result<T> = std::result::Result<T, Error>;
