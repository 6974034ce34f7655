//! Raw API status → `Post`
//!
//! A status missing anything a `Post` requires is rejected, not patched up.
//! Callers drop rejected records; one bad record never fails a search.

use chrono::{DateTime, Utc};
use twitter_api::{RawStatus, RawUser};

use crate::post::{Author, Post, PostKind};

/// `created_at` format used by the v1.1 API, e.g. `Wed Oct 10 20:19:24 +0000 2018`.
pub const CREATED_AT_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

/// Why a raw record could not be normalized.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("record has no id")]
    MissingId,
    #[error("record has no text")]
    MissingText,
    #[error("record has no timestamp")]
    MissingTimestamp,
    #[error("unparseable timestamp {0:?}")]
    InvalidTimestamp(String),
    #[error("record has no author")]
    MissingAuthor,
    #[error("author is missing {0}")]
    IncompleteAuthor(&'static str),
    #[error("shared post has no id")]
    MissingParentId,
    #[error("record is from provider {0:?}")]
    WrongProvider(String),
    #[error("record is missing {0}")]
    MissingField(&'static str),
    #[error("malformed record: {0}")]
    Malformed(String),
}

impl Rejection {
    /// Label for the `normalizer_rejections_total` metric.
    pub fn reason(&self) -> &'static str {
        match self {
            Rejection::MissingId => "missing_id",
            Rejection::MissingText => "missing_text",
            Rejection::MissingTimestamp => "missing_timestamp",
            Rejection::InvalidTimestamp(_) => "invalid_timestamp",
            Rejection::MissingAuthor | Rejection::IncompleteAuthor(_) => "missing_author",
            Rejection::MissingParentId => "missing_parent_id",
            Rejection::WrongProvider(_) => "wrong_provider",
            Rejection::MissingField(_) => "missing_field",
            Rejection::Malformed(_) => "malformed",
        }
    }
}

/// Parse an API `created_at` value to UTC.
pub fn parse_created_at(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(value, CREATED_AT_FORMAT)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

/// Convert one raw status.
///
/// Kind: retweet if it embeds the shared status, otherwise reply if it
/// answers another status, otherwise original.
pub fn normalize_status(raw: &RawStatus) -> Result<Post, Rejection> {
    let id = raw.status_id().ok_or(Rejection::MissingId)?;
    let text = raw
        .full_text
        .as_ref()
        .or(raw.text.as_ref())
        .ok_or(Rejection::MissingText)?
        .clone();

    let kind = if let Some(shared) = &raw.retweeted_status {
        PostKind::Retweet {
            parent_id: shared.status_id().ok_or(Rejection::MissingParentId)?,
        }
    } else if let Some(parent_id) = raw.in_reply_to_status_id {
        PostKind::Reply { parent_id }
    } else {
        PostKind::Original
    };

    let created_at = raw
        .created_at
        .as_deref()
        .ok_or(Rejection::MissingTimestamp)?;
    let timestamp = parse_created_at(created_at)
        .ok_or_else(|| Rejection::InvalidTimestamp(created_at.to_string()))?;

    let author = normalize_user(raw.user.as_ref().ok_or(Rejection::MissingAuthor)?)?;

    Ok(Post {
        id,
        author,
        text,
        kind,
        share_count: raw.retweet_count.unwrap_or(0),
        timestamp,
    })
}

/// Convert a raw user profile. Handle and both counts are required.
pub fn normalize_user(raw: &RawUser) -> Result<Author, Rejection> {
    Ok(Author {
        handle: raw
            .screen_name
            .clone()
            .ok_or(Rejection::IncompleteAuthor("screen_name"))?,
        follower_count: raw
            .followers_count
            .ok_or(Rejection::IncompleteAuthor("followers_count"))?,
        friend_count: raw
            .friends_count
            .ok_or(Rejection::IncompleteAuthor("friends_count"))?,
    })
}
