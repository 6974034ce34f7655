//! Live API collector
//!
//! Thin facade over a shared `CredentialPool`: searches go through the
//! windowed fetcher, single lookups run as typed pool operations. A status
//! or user that does not exist comes back as `None`, not as an error.

use std::sync::Arc;

use credential_pool::{ApiCall, ApiResponse, Cancellation, CredentialPool, Operation};
use tracing::debug;
use twitter_api::{TwitterApi, UserLookup};

use crate::error::{Error, Result};
use crate::fetcher::{CursorPaginatedFetcher, WatermarkMode};
use crate::normalize::{normalize_status, normalize_user};
use crate::post::{Author, Post};

pub struct TwitterCollector<C> {
    pool: Arc<CredentialPool<C>>,
    fetcher: CursorPaginatedFetcher<C>,
}

impl<C: TwitterApi + 'static> TwitterCollector<C> {
    pub fn new(pool: Arc<CredentialPool<C>>) -> Self {
        let fetcher = CursorPaginatedFetcher::new(Arc::clone(&pool));
        Self { pool, fetcher }
    }

    /// Override search window size and watermark stepping.
    pub fn with_search(mut self, page_size: u32, mode: WatermarkMode) -> Self {
        self.fetcher = self.fetcher.page_size(page_size).watermark_mode(mode);
        self
    }

    pub fn pool(&self) -> &Arc<CredentialPool<C>> {
        &self.pool
    }

    /// Up to `count` recent posts matching `terms`, newest first.
    pub async fn search_by_terms(&self, terms: &str, count: usize, cancel: &Cancellation) -> Result<Vec<Post>> {
        self.fetcher.search(terms, count, cancel).await
    }

    /// One post by id. `None` if it does not exist or cannot be normalized.
    pub async fn status_by_id(&self, id: u64, cancel: &Cancellation) -> Result<Option<Post>> {
        let call = ApiCall::GetStatus { id };
        let Some(response) = self.run(call, cancel).await? else {
            return Ok(None);
        };
        match response {
            ApiResponse::Status(raw) => match normalize_status(&raw) {
                Ok(post) => Ok(Some(post)),
                Err(rejection) => {
                    debug!(id, reason = %rejection, "status could not be normalized");
                    Ok(None)
                }
            },
            other => Err(Error::UnexpectedResponse {
                call: "get_status",
                got: other.kind(),
            }),
        }
    }

    pub async fn user_by_id(&self, id: u64, cancel: &Cancellation) -> Result<Option<Author>> {
        self.user(UserLookup::Id(id), cancel).await
    }

    pub async fn user_by_name(&self, name: &str, cancel: &Cancellation) -> Result<Option<Author>> {
        self.user(UserLookup::ScreenName(name.to_string()), cancel).await
    }

    /// User by id or screen name. `None` if the user does not exist.
    pub async fn user(&self, lookup: UserLookup, cancel: &Cancellation) -> Result<Option<Author>> {
        let Some(response) = self.run(ApiCall::GetUser(lookup), cancel).await? else {
            return Ok(None);
        };
        match response {
            ApiResponse::User(raw) => match normalize_user(&raw) {
                Ok(author) => Ok(Some(author)),
                Err(rejection) => {
                    debug!(reason = %rejection, "user could not be normalized");
                    Ok(None)
                }
            },
            other => Err(Error::UnexpectedResponse {
                call: "get_user",
                got: other.kind(),
            }),
        }
    }

    /// Run a call through the pool; not-found maps to `None`.
    async fn run(&self, call: ApiCall, cancel: &Cancellation) -> Result<Option<ApiResponse>> {
        match self.pool.execute(cancel, &Operation::Call(call)).await {
            Ok(response) => Ok(Some(response)),
            Err(credential_pool::Error::Api(e)) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
