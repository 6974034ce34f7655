//! Normalized post and author values

use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Author of a post. Two authors are the same author if their handles match,
/// whatever counts each snapshot carries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Author {
    pub handle: String,
    pub follower_count: u64,
    pub friend_count: u64,
}

impl PartialEq for Author {
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle
    }
}

impl Eq for Author {}

impl Hash for Author {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.handle.hash(state);
    }
}

/// What kind of post this is. Shares and replies always carry the id of the
/// post they point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PostKind {
    Original,
    Retweet { parent_id: u64 },
    Reply { parent_id: u64 },
}

impl PostKind {
    pub fn label(&self) -> &'static str {
        match self {
            PostKind::Original => "original",
            PostKind::Retweet { .. } => "retweet",
            PostKind::Reply { .. } => "reply",
        }
    }

    pub fn parent_id(&self) -> Option<u64> {
        match self {
            PostKind::Original => None,
            PostKind::Retweet { parent_id } | PostKind::Reply { parent_id } => Some(*parent_id),
        }
    }
}

/// A post from either source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: u64,
    pub author: Author,
    pub text: String,
    #[serde(flatten)]
    pub kind: PostKind,
    pub share_count: u64,
    pub timestamp: DateTime<Utc>,
}

impl Post {
    pub fn parent_id(&self) -> Option<u64> {
        self.kind.parent_id()
    }

    pub fn is_retweet(&self) -> bool {
        matches!(self.kind, PostKind::Retweet { .. })
    }

    pub fn is_reply(&self) -> bool {
        matches!(self.kind, PostKind::Reply { .. })
    }
}
