//! Windowed, cursor-paginated search
//!
//! A single search request returns at most `page_size` statuses, most recent
//! first. To collect more, searches are chained: every window after the first
//! carries a watermark (the API's inclusive `max_id`) set below the smallest
//! id already seen, so each window only returns strictly older statuses.
//!
//! Each window runs through the credential pool, so a window that hits a
//! quota waits for a credential instead of failing the search.

use std::sync::Arc;

use credential_pool::{ApiCall, ApiResponse, Cancellation, CredentialPool, Operation};
use serde::Deserialize;
use tracing::debug;
use twitter_api::constants::MAX_SEARCH_COUNT;
use twitter_api::{RawStatus, SearchRequest, TwitterApi};

use crate::error::{Error, Result};
use crate::normalize::normalize_status;
use crate::post::Post;

pub const DEFAULT_PAGE_SIZE: u32 = MAX_SEARCH_COUNT;

/// How the watermark for the next window is derived.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatermarkMode {
    /// `min(ids in the window) - 1` after every window. Outstanding count
    /// drops by the number of posts accepted.
    #[default]
    Recompute,
    /// Legacy stepping: `min(first window) - 1 - page_size`, then
    /// `page_size` less per window. Outstanding count drops by `page_size`
    /// per window regardless of what was accepted. Statuses that fall
    /// between steps are skipped.
    FixedStep,
}

/// Parameters of one bounded request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchWindow {
    pub terms: String,
    pub limit: u32,
    /// `None` for the first window
    pub watermark: Option<u64>,
}

impl SearchWindow {
    pub fn request(&self) -> SearchRequest {
        SearchRequest::new(self.terms.clone(), self.limit).with_max_id(self.watermark)
    }
}

/// Collects up to `count` posts for a query by chaining search windows.
pub struct CursorPaginatedFetcher<C> {
    pool: Arc<CredentialPool<C>>,
    page_size: u32,
    mode: WatermarkMode,
}

impl<C> Clone for CursorPaginatedFetcher<C> {
    fn clone(&self) -> Self {
        Self {
            pool: Arc::clone(&self.pool),
            page_size: self.page_size,
            mode: self.mode,
        }
    }
}

impl<C: TwitterApi + 'static> CursorPaginatedFetcher<C> {
    pub fn new(pool: Arc<CredentialPool<C>>) -> Self {
        Self {
            pool,
            page_size: DEFAULT_PAGE_SIZE,
            mode: WatermarkMode::default(),
        }
    }

    /// Results per window, clamped to `1..=100`.
    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.clamp(1, MAX_SEARCH_COUNT);
        self
    }

    pub fn watermark_mode(mut self, mode: WatermarkMode) -> Self {
        self.mode = mode;
        self
    }

    /// Collect up to `count` posts matching `terms`, most recent first.
    ///
    /// Stops early when the source runs dry. Records that cannot be
    /// normalized are dropped. Pool errors (fatal remote failure, no
    /// credentials, cancellation) abort the search.
    pub async fn search(&self, terms: &str, count: usize, cancel: &Cancellation) -> Result<Vec<Post>> {
        let mut posts = Vec::new();
        if count == 0 {
            return Ok(posts);
        }

        let page = self.page_size as usize;
        let mut outstanding = count;
        let mut window = SearchWindow {
            terms: terms.to_string(),
            limit: outstanding.min(page) as u32,
            watermark: None,
        };
        let mut index: u32 = 0;

        loop {
            index += 1;
            let mut raw = self.fetch_window(&window, cancel).await?;
            metrics::counter!("fetcher_windows_total").increment(1);

            if let Some(watermark) = window.watermark {
                let received = raw.len();
                raw.retain(|status| status.status_id().is_none_or(|id| id <= watermark));
                if raw.len() < received {
                    debug!(
                        window = index,
                        watermark,
                        dropped = received - raw.len(),
                        "dropping records above the watermark"
                    );
                }
            }

            if raw.is_empty() {
                debug!(window = index, watermark = ?window.watermark, "source exhausted");
                break;
            }

            let mut accepted = 0usize;
            for status in &raw {
                if posts.len() >= count {
                    break;
                }
                match normalize_status(status) {
                    Ok(post) => {
                        posts.push(post);
                        accepted += 1;
                    }
                    Err(rejection) => {
                        metrics::counter!("normalizer_rejections_total", "reason" => rejection.reason())
                            .increment(1);
                        debug!(window = index, reason = %rejection, "dropping record");
                    }
                }
            }
            debug!(
                window = index,
                watermark = ?window.watermark,
                received = raw.len(),
                accepted,
                "window fetched"
            );

            let Some(min_id) = raw.iter().filter_map(RawStatus::status_id).min() else {
                debug!(window = index, "window carried no usable ids, stopping");
                break;
            };

            outstanding = match self.mode {
                WatermarkMode::Recompute => outstanding.saturating_sub(accepted),
                WatermarkMode::FixedStep => outstanding.saturating_sub(page),
            };
            if outstanding == 0 || posts.len() >= count {
                break;
            }

            let next = match (self.mode, window.watermark) {
                (WatermarkMode::Recompute, _) => min_id.checked_sub(1),
                (WatermarkMode::FixedStep, None) => min_id.checked_sub(1 + self.page_size as u64),
                (WatermarkMode::FixedStep, Some(previous)) => previous.checked_sub(self.page_size as u64),
            };
            let Some(next) = next else {
                debug!(window = index, "watermark reached zero, stopping");
                break;
            };
            if window.watermark.is_some_and(|previous| next >= previous) {
                debug!(window = index, watermark = next, "watermark did not advance, stopping");
                break;
            }

            window = SearchWindow {
                terms: window.terms,
                limit: outstanding.min(page) as u32,
                watermark: Some(next),
            };
        }

        Ok(posts)
    }

    async fn fetch_window(&self, window: &SearchWindow, cancel: &Cancellation) -> Result<Vec<RawStatus>> {
        let operation = Operation::Call(ApiCall::Search(window.request()));
        match self.pool.execute(cancel, &operation).await? {
            ApiResponse::Statuses(statuses) => Ok(statuses),
            other => Err(Error::UnexpectedResponse {
                call: "search",
                got: other.kind(),
            }),
        }
    }
}
