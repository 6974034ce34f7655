//! Post collection from a rate-limited API and a search index
//!
//! Both sources produce the same `Post`/`Author` values:
//! - `TwitterCollector` reads the live API through a `CredentialPool`, and
//!   `CursorPaginatedFetcher` chains bounded search windows to collect more
//!   results than one request returns
//! - `IndexCollector` queries an Elasticsearch-compatible index of posts
//!   that were stored earlier
//!
//! `links` extracts the external hosts a post cites.

pub mod error;
pub mod fetcher;
pub mod index;
pub mod links;
pub mod normalize;
pub mod post;
pub mod twitter;

pub use error::{Error, Result};
pub use fetcher::{CursorPaginatedFetcher, DEFAULT_PAGE_SIZE, SearchWindow, WatermarkMode};
pub use index::{IndexCollector, IndexDocument, IndexQuery, parse_document};
pub use links::{LinkResolver, extract_links, host_of};
pub use normalize::{Rejection, normalize_status, normalize_user};
pub use post::{Author, Post, PostKind};
pub use twitter::TwitterCollector;
