//! Search-index collector
//!
//! Reads posts stored earlier in an Elasticsearch-compatible index. Queries
//! are built from `IndexQuery` values and always narrowed to documents from
//! the `twitter` provider. Paging is `from`/`size` based.
//!
//! Stored document shape (fields other than these are ignored):
//!
//! ```text
//! {
//!   "provider": "twitter",
//!   "post_id": 1050118621198921728,
//!   "body": {"en": "text"},              // first entry is used
//!   "is_retweet": false,
//!   "is_reply": true,
//!   "retweet_id": 1050118621198921700,   // parent of retweets and replies
//!   "retweet_count": 3,
//!   "published_at": "2018-10-10T20:19+00:00",
//!   "user": {"screenname": "..", "followers_count": 1, "friends_count": 2}
//! }
//! ```

use std::fmt;
use std::ops::{BitAnd, BitOr, Not};
use std::sync::LazyLock;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use regex::Regex;
use serde::de::{Deserializer, IgnoredAny, MapAccess, Visitor};
use serde::Deserialize;
use serde_json::value::RawValue;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::normalize::Rejection;
use crate::post::{Author, Post, PostKind};

pub const DEFAULT_INDEX_URL: &str = "http://localhost:9220";
pub const DEFAULT_INDEX_NAME: &str = "shokesu";
/// Only documents from this provider are returned.
pub const PROVIDER: &str = "twitter";

const MAX_ATTEMPTS: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_millis(100);

static PUBLISHED_AT: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^(\d{4})-(\d{1,2})-(\d{1,2})T(\d{1,2}):(\d{1,2})\+.*$").ok()
});

/// Query tree, rendered to the index's query DSL by `to_json`.
///
/// Combine with `&`, `|` and `!`.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexQuery {
    /// Full-text match on one field
    Match { field: String, text: String },
    /// Exact value on one field
    Term { field: String, value: Value },
    And(Vec<IndexQuery>),
    Or(Vec<IndexQuery>),
    Not(Box<IndexQuery>),
}

impl IndexQuery {
    pub fn matching(field: impl Into<String>, text: impl Into<String>) -> Self {
        IndexQuery::Match {
            field: field.into(),
            text: text.into(),
        }
    }

    pub fn term(field: impl Into<String>, value: impl Into<Value>) -> Self {
        IndexQuery::Term {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            IndexQuery::Match { field, text } => json!({ "match": { field.as_str(): text } }),
            IndexQuery::Term { field, value } => json!({ "term": { field.as_str(): value } }),
            IndexQuery::And(parts) => {
                let must: Vec<Value> = parts.iter().map(IndexQuery::to_json).collect();
                json!({ "bool": { "must": must } })
            }
            IndexQuery::Or(parts) => {
                let should: Vec<Value> = parts.iter().map(IndexQuery::to_json).collect();
                json!({ "bool": { "should": should, "minimum_should_match": 1 } })
            }
            IndexQuery::Not(inner) => json!({ "bool": { "must_not": [inner.to_json()] } }),
        }
    }
}

impl BitAnd for IndexQuery {
    type Output = IndexQuery;

    fn bitand(self, rhs: IndexQuery) -> IndexQuery {
        match (self, rhs) {
            (IndexQuery::And(mut left), IndexQuery::And(right)) => {
                left.extend(right);
                IndexQuery::And(left)
            }
            (IndexQuery::And(mut left), right) => {
                left.push(right);
                IndexQuery::And(left)
            }
            (left, IndexQuery::And(mut right)) => {
                right.insert(0, left);
                IndexQuery::And(right)
            }
            (left, right) => IndexQuery::And(vec![left, right]),
        }
    }
}

impl BitOr for IndexQuery {
    type Output = IndexQuery;

    fn bitor(self, rhs: IndexQuery) -> IndexQuery {
        match (self, rhs) {
            (IndexQuery::Or(mut left), IndexQuery::Or(right)) => {
                left.extend(right);
                IndexQuery::Or(left)
            }
            (IndexQuery::Or(mut left), right) => {
                left.push(right);
                IndexQuery::Or(left)
            }
            (left, IndexQuery::Or(mut right)) => {
                right.insert(0, left);
                IndexQuery::Or(right)
            }
            (left, right) => IndexQuery::Or(vec![left, right]),
        }
    }
}

impl Not for IndexQuery {
    type Output = IndexQuery;

    fn not(self) -> IndexQuery {
        match self {
            IndexQuery::Not(inner) => *inner,
            other => IndexQuery::Not(Box::new(other)),
        }
    }
}

/// Numeric id stored either as a JSON number or a string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum StoredId {
    Number(u64),
    Text(String),
}

impl StoredId {
    fn as_u64(&self) -> Option<u64> {
        match self {
            StoredId::Number(n) => Some(*n),
            StoredId::Text(s) => s.trim().parse().ok(),
        }
    }
}

/// First value of a language-keyed text map, in document order.
#[derive(Debug, Clone, Default)]
struct FirstText(Option<String>);

impl<'de> Deserialize<'de> for FirstText {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct FirstTextVisitor;

        impl<'de> Visitor<'de> for FirstTextVisitor {
            type Value = FirstText;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of language code to text")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<FirstText, A::Error> {
                let first = map.next_entry::<IgnoredAny, String>()?.map(|(_, text)| text);
                while map.next_entry::<IgnoredAny, IgnoredAny>()?.is_some() {}
                Ok(FirstText(first))
            }
        }

        deserializer.deserialize_map(FirstTextVisitor)
    }
}

#[derive(Debug, Clone, Deserialize)]
struct StoredUser {
    screenname: Option<String>,
    followers_count: Option<u64>,
    friends_count: Option<u64>,
}

/// One stored post, every field optional until `parse_document` checks it.
#[derive(Debug, Clone, Deserialize)]
pub struct IndexDocument {
    provider: Option<String>,
    post_id: Option<StoredId>,
    body: Option<FirstText>,
    is_retweet: Option<bool>,
    is_reply: Option<bool>,
    retweet_id: Option<StoredId>,
    retweet_count: Option<u64>,
    published_at: Option<String>,
    user: Option<StoredUser>,
}

impl IndexDocument {
    /// Decode a `_source` object. Type mismatches reject the document.
    pub fn from_json(source: &str) -> std::result::Result<Self, Rejection> {
        serde_json::from_str(source).map_err(|e| Rejection::Malformed(e.to_string()))
    }
}

/// `published_at` is read as UTC to the minute; anything after `+` is ignored.
pub fn parse_published_at(value: &str) -> Option<DateTime<Utc>> {
    let captures = PUBLISHED_AT.as_ref()?.captures(value)?;
    let field = |i: usize| -> Option<u32> { captures.get(i)?.as_str().parse().ok() };
    let year: i32 = captures.get(1)?.as_str().parse().ok()?;
    Utc.with_ymd_and_hms(year, field(2)?, field(3)?, field(4)?, field(5)?, 0)
        .single()
}

/// Convert a stored document to a `Post`.
pub fn parse_document(doc: &IndexDocument) -> std::result::Result<Post, Rejection> {
    match doc.provider.as_deref() {
        Some(PROVIDER) => {}
        Some(other) => return Err(Rejection::WrongProvider(other.to_string())),
        None => return Err(Rejection::MissingField("provider")),
    }

    let id = doc
        .post_id
        .as_ref()
        .and_then(StoredId::as_u64)
        .ok_or(Rejection::MissingId)?;
    let text = doc
        .body
        .as_ref()
        .and_then(|body| body.0.clone())
        .ok_or(Rejection::MissingText)?;

    let is_retweet = doc.is_retweet.ok_or(Rejection::MissingField("is_retweet"))?;
    let is_reply = doc.is_reply.ok_or(Rejection::MissingField("is_reply"))?;
    let parent_id = || {
        doc.retweet_id
            .as_ref()
            .and_then(StoredId::as_u64)
            .ok_or(Rejection::MissingParentId)
    };
    let kind = if is_retweet {
        PostKind::Retweet {
            parent_id: parent_id()?,
        }
    } else if is_reply {
        PostKind::Reply {
            parent_id: parent_id()?,
        }
    } else {
        PostKind::Original
    };

    let share_count = doc
        .retweet_count
        .ok_or(Rejection::MissingField("retweet_count"))?;

    let published_at = doc
        .published_at
        .as_deref()
        .ok_or(Rejection::MissingTimestamp)?;
    let timestamp = parse_published_at(published_at)
        .ok_or_else(|| Rejection::InvalidTimestamp(published_at.to_string()))?;

    let user = doc.user.as_ref().ok_or(Rejection::MissingAuthor)?;
    let author = Author {
        handle: user
            .screenname
            .clone()
            .ok_or(Rejection::IncompleteAuthor("screenname"))?,
        follower_count: user
            .followers_count
            .ok_or(Rejection::IncompleteAuthor("followers_count"))?,
        friend_count: user
            .friends_count
            .ok_or(Rejection::IncompleteAuthor("friends_count"))?,
    };

    Ok(Post {
        id,
        author,
        text,
        kind,
        share_count,
        timestamp,
    })
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    hits: Hits,
}

#[derive(Debug, Deserialize)]
struct Hits {
    #[serde(default)]
    hits: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
struct Hit {
    #[serde(rename = "_source")]
    source: Option<Box<RawValue>>,
}

/// Client for one index.
pub struct IndexCollector {
    http: reqwest::Client,
    base_url: String,
    index: String,
}

impl IndexCollector {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, index: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            index: index.into(),
        }
    }

    fn search_url(&self) -> String {
        format!("{}/{}/_search", self.base_url, self.index)
    }

    /// Posts matching `query`, skipping `from` hits and returning at most
    /// `size`. Documents that do not parse are dropped.
    pub async fn search_posts(&self, query: &IndexQuery, from: usize, size: usize) -> Result<Vec<Post>> {
        let query = query.clone() & IndexQuery::term("provider", PROVIDER);
        let body = json!({
            "from": from,
            "size": size,
            "query": query.to_json(),
        });

        let response = self.send(&body).await?;
        let hits = response.hits.hits;
        let total = hits.len();
        let posts: Vec<Post> = hits
            .into_iter()
            .filter_map(|hit| {
                let source = hit.source?;
                match IndexDocument::from_json(source.get()).and_then(|doc| parse_document(&doc)) {
                    Ok(post) => Some(post),
                    Err(rejection) => {
                        metrics::counter!("normalizer_rejections_total", "reason" => rejection.reason())
                            .increment(1);
                        debug!(reason = %rejection, "dropping index document");
                        None
                    }
                }
            })
            .collect();
        debug!(hits = total, posts = posts.len(), from, size, "index search complete");
        Ok(posts)
    }

    /// POST the search body, retrying request timeouts.
    async fn send(&self, body: &Value) -> Result<SearchResponse> {
        let url = self.search_url();
        let mut attempt = 0;
        let response = loop {
            attempt += 1;
            match self.http.post(&url).json(body).send().await {
                Ok(response) => break response,
                Err(e) if e.is_timeout() && attempt < MAX_ATTEMPTS => {
                    metrics::counter!("index_requests_total", "outcome" => "timeout").increment(1);
                    warn!(attempt, error = %e, "index request timed out, retrying");
                    tokio::time::sleep(RETRY_DELAY).await;
                }
                Err(e) => {
                    metrics::counter!("index_requests_total", "outcome" => "error").increment(1);
                    return Err(Error::Http(format!("index request to {url} failed: {e}")));
                }
            }
        };

        let status = response.status();
        if !status.is_success() {
            metrics::counter!("index_requests_total", "outcome" => "error").increment(1);
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<no body>"));
            return Err(Error::Index(format!("{status}: {text}")));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Http(format!("reading index response: {e}")))?;
        let parsed = serde_json::from_slice::<SearchResponse>(&bytes)
            .map_err(|e| Error::Index(format!("invalid search response: {e}")))?;
        metrics::counter!("index_requests_total", "outcome" => "success").increment(1);
        Ok(parsed)
    }
}
