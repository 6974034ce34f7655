//! Raw API payloads and request parameters
//!
//! Every field of the raw payloads is optional: the API omits fields freely
//! and a missing field must reject one status during normalization, not fail
//! the whole response.

use serde::{Deserialize, Serialize};

use crate::constants::MAX_SEARCH_COUNT;

/// A status as returned by the API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawStatus {
    pub id: Option<u64>,
    pub id_str: Option<String>,
    pub text: Option<String>,
    /// Untruncated text, present with `tweet_mode=extended`
    pub full_text: Option<String>,
    /// e.g. `Wed Oct 10 20:19:24 +0000 2018`
    pub created_at: Option<String>,
    pub retweet_count: Option<u64>,
    pub in_reply_to_status_id: Option<u64>,
    pub retweeted_status: Option<Box<RawStatus>>,
    pub user: Option<RawUser>,
}

impl RawStatus {
    /// Status id, preferring the string form (exact beyond 2^53).
    pub fn status_id(&self) -> Option<u64> {
        self.id_str
            .as_deref()
            .and_then(|s| s.parse().ok())
            .or(self.id)
    }
}

/// A user profile as returned by the API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawUser {
    pub id: Option<u64>,
    pub screen_name: Option<String>,
    pub followers_count: Option<u64>,
    pub friends_count: Option<u64>,
}

/// Envelope of the search endpoint response.
#[derive(Debug, Deserialize)]
pub(crate) struct SearchResponse {
    #[serde(default)]
    pub statuses: Vec<RawStatus>,
}

/// Parameters for one search request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub query: String,
    /// Number of statuses to return, clamped to `1..=MAX_SEARCH_COUNT`
    pub count: u32,
    /// Inclusive upper bound on status ids; `None` fetches the most recent
    pub max_id: Option<u64>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>, count: u32) -> Self {
        Self {
            query: query.into(),
            count: count.clamp(1, MAX_SEARCH_COUNT),
            max_id: None,
        }
    }

    pub fn with_max_id(mut self, max_id: Option<u64>) -> Self {
        self.max_id = max_id;
        self
    }
}

/// How to identify a user in a lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserLookup {
    Id(u64),
    ScreenName(String),
}

impl UserLookup {
    /// Parse `@name`, a numeric id, or a bare screen name.
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        if let Some(name) = input.strip_prefix('@') {
            return UserLookup::ScreenName(name.to_string());
        }
        match input.parse() {
            Ok(id) => UserLookup::Id(id),
            Err(_) => UserLookup::ScreenName(input.to_string()),
        }
    }

    /// Query parameter for the user lookup endpoint.
    pub(crate) fn query_param(&self) -> (&'static str, String) {
        match self {
            UserLookup::Id(id) => ("user_id", id.to_string()),
            UserLookup::ScreenName(name) => ("screen_name", name.clone()),
        }
    }
}
