//! Typed operations the pool can run
//!
//! An operation is either a named API call, dispatched to the matching
//! `TwitterApi` method of whichever credential the pool selects, or a
//! callback that receives the selected client handle directly.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use twitter_api::{ApiResult, BoxFuture, RawStatus, RawUser, SearchRequest, TwitterApi, UserLookup};

/// A named API call with its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    GetStatus { id: u64 },
    GetUser(UserLookup),
    Search(SearchRequest),
}

impl ApiCall {
    /// Label for logging and metrics.
    pub fn name(&self) -> &'static str {
        match self {
            ApiCall::GetStatus { .. } => "get_status",
            ApiCall::GetUser(_) => "get_user",
            ApiCall::Search(_) => "search",
        }
    }

    /// Run this call against one client.
    pub async fn dispatch<A: TwitterApi + ?Sized>(&self, api: &A) -> ApiResult<ApiResponse> {
        match self {
            ApiCall::GetStatus { id } => api.get_status(*id).await.map(ApiResponse::Status),
            ApiCall::GetUser(lookup) => api.get_user(lookup).await.map(ApiResponse::User),
            ApiCall::Search(request) => api.search(request).await.map(ApiResponse::Statuses),
        }
    }
}

/// Result of an `ApiCall`, one variant per call.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiResponse {
    Status(RawStatus),
    User(RawUser),
    Statuses(Vec<RawStatus>),
}

impl ApiResponse {
    pub fn kind(&self) -> &'static str {
        match self {
            ApiResponse::Status(_) => "status",
            ApiResponse::User(_) => "user",
            ApiResponse::Statuses(_) => "statuses",
        }
    }
}

/// Callback form: receives the selected client, returns the response.
pub type Callback<C> = Arc<dyn Fn(Arc<C>) -> BoxFuture<'static, ApiResult<ApiResponse>> + Send + Sync>;

/// Work submitted to `CredentialPool::execute`.
pub enum Operation<C> {
    Call(ApiCall),
    Callback(Callback<C>),
}

impl<C: Send + Sync + 'static> Operation<C> {
    /// Wrap an async closure as a callback operation.
    pub fn callback<F, Fut>(f: F) -> Self
    where
        F: Fn(Arc<C>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ApiResult<ApiResponse>> + Send + 'static,
    {
        Operation::Callback(Arc::new(move |client| Box::pin(f(client))))
    }
}

impl<C> Operation<C> {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Call(call) => call.name(),
            Operation::Callback(_) => "callback",
        }
    }
}

impl<C> From<ApiCall> for Operation<C> {
    fn from(call: ApiCall) -> Self {
        Operation::Call(call)
    }
}

impl<C> fmt::Debug for Operation<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Call(call) => f.debug_tuple("Call").field(call).finish(),
            Operation::Callback(_) => f.write_str("Callback(..)"),
        }
    }
}
