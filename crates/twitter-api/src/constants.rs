//! Twitter REST API v1.1 endpoints and limits

/// Base URL of the v1.1 REST API.
pub const DEFAULT_BASE_URL: &str = "https://api.twitter.com/1.1";

/// Standard search endpoint (recent statuses, most recent first).
pub const SEARCH_PATH: &str = "search/tweets.json";

/// Single status lookup.
pub const STATUS_PATH: &str = "statuses/show.json";

/// Single user lookup.
pub const USER_PATH: &str = "users/show.json";

/// Largest `count` the search endpoint honours per request.
pub const MAX_SEARCH_COUNT: u32 = 100;

/// Default per-request timeout for API calls.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// User-Agent sent with every API request.
pub const USER_AGENT: &str = concat!("post-collector/", env!("CARGO_PKG_VERSION"));
