//! Error types for post collection

/// Errors from the collectors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Pool(#[from] credential_pool::Error),

    /// The search index answered with an error or an unreadable body.
    #[error("search index error: {0}")]
    Index(String),

    /// Transport failure talking to the index or following a link.
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("unexpected {got} response to {call}")]
    UnexpectedResponse { call: &'static str, got: &'static str },
}

/// Result alias for collector operations.
pub type Result<T> = std::result::Result<T, Error>;
