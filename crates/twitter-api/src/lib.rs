//! Twitter REST API access for the post collector
//!
//! Defines the `TwitterApi` trait that decouples pagination and credential
//! rotation from the transport. `HttpClient` is the production implementation:
//! one client per credential, every request signed with OAuth 1.0a.
//!
//! Failures carry an `ErrorKind` so callers can tell quota exhaustion and
//! transient outages (rotate to another credential, back off) apart from
//! revoked credentials (stop using this one) and fatal request errors
//! (surface to the caller).

pub mod classify;
pub mod client;
pub mod constants;
pub mod credentials;
pub mod error;
pub mod oauth;
pub mod types;

pub use classify::classify_status;
pub use client::{ClientSettings, HttpClient};
pub use credentials::{CredentialRecord, load_records, parse_records};
pub use error::{ApiError, ApiResult, CredentialError, ErrorKind};
pub use types::{RawStatus, RawUser, SearchRequest, UserLookup};

use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by `TwitterApi` methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Remote operations the collector issues against the Twitter API.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility, so pools
/// and tests can hold fakes behind the same interface as `HttpClient`.
pub trait TwitterApi: Send + Sync {
    /// Search recent statuses, most recent first.
    ///
    /// `request.max_id` is an inclusive upper bound on status ids; the
    /// response holds at most `request.count` statuses.
    fn search<'a>(&'a self, request: &'a SearchRequest) -> BoxFuture<'a, ApiResult<Vec<RawStatus>>>;

    /// Fetch a single status by id.
    fn get_status(&self, id: u64) -> BoxFuture<'_, ApiResult<RawStatus>>;

    /// Fetch a user profile by id or screen name.
    fn get_user<'a>(&'a self, lookup: &'a UserLookup) -> BoxFuture<'a, ApiResult<RawUser>>;
}
