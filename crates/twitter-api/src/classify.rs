//! Failure classification for Twitter API responses
//!
//! Twitter signals quota exhaustion with 429 (and the legacy 420), but a few
//! per-account limits arrive as 403 with a limit error code. Those must rotate
//! like a 429, while every other 403 is a request the server will never
//! accept.

use serde::Deserialize;

use crate::error::{ApiError, ErrorKind};

/// Twitter error codes that mean "this credential is out of quota".
const RATE_LIMIT_CODES: &[u32] = &[
    88,  // Rate limit exceeded
    185, // User is over daily status update limit
];

/// Limit wording seen in 403 bodies that carry no error code.
const RATE_LIMIT_PATTERNS: &[&str] = &[
    "rate limit exceeded",
    "over daily status update limit",
    "too many requests",
];

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<ErrorEntry>,
}

#[derive(Deserialize)]
struct ErrorEntry {
    code: Option<u32>,
    message: Option<String>,
}

/// First `{"errors":[{"code":..,"message":..}]}` entry of a response body.
fn first_error(body: &str) -> Option<(Option<u32>, Option<String>)> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    parsed
        .errors
        .into_iter()
        .next()
        .map(|entry| (entry.code, entry.message))
}

fn mentions_rate_limit(body: &str) -> bool {
    let lower = body.to_lowercase();
    RATE_LIMIT_PATTERNS.iter().any(|p| lower.contains(p))
}

/// Classify a non-success response by HTTP status and response body.
///
/// 429/420 are RateLimited. 401 is Unauthorized (revoked or wrong keys).
/// 403 is RateLimited when the body carries a limit code or limit wording,
/// Fatal otherwise. 408 and 5xx are Transient. Every other status is Fatal.
pub fn classify_status(status: u16, body: &str) -> ErrorKind {
    match status {
        429 | 420 => ErrorKind::RateLimited,
        401 => ErrorKind::Unauthorized,
        403 => {
            let code = first_error(body).and_then(|(code, _)| code);
            if code.is_some_and(|c| RATE_LIMIT_CODES.contains(&c)) || mentions_rate_limit(body) {
                ErrorKind::RateLimited
            } else {
                ErrorKind::Fatal
            }
        }
        408 => ErrorKind::Transient,
        s if s >= 500 => ErrorKind::Transient,
        _ => ErrorKind::Fatal,
    }
}

/// Build an `ApiError` from a non-success response.
///
/// Uses the Twitter error message when the body has one, the raw body
/// otherwise.
pub fn error_from_response(status: u16, body: &str) -> ApiError {
    let kind = classify_status(status, body);
    let (code, message) = match first_error(body) {
        Some((code, Some(message))) => (code, message),
        Some((code, None)) => (code, body.to_string()),
        None => (None, body.to_string()),
    };
    ApiError {
        kind,
        status: Some(status),
        code,
        message: format!("{status}: {message}"),
    }
}

/// Build an `ApiError` from a transport failure (no response received).
///
/// Connection failures and timeouts are Transient: a different credential, or
/// the same one after the backoff, may well succeed.
pub fn error_from_transport(err: &reqwest::Error) -> ApiError {
    if err.is_builder() {
        return ApiError::fatal(format!("invalid request: {err}"));
    }
    ApiError::transient(format!("request failed: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_429_rate_limited() {
        let body = r#"{"errors":[{"code":88,"message":"Rate limit exceeded"}]}"#;
        assert_eq!(classify_status(429, body), ErrorKind::RateLimited);
    }

    #[test]
    fn classify_420_enhance_your_calm() {
        assert_eq!(classify_status(420, "Enhance Your Calm"), ErrorKind::RateLimited);
    }

    #[test]
    fn classify_401_unauthorized() {
        let body = r#"{"errors":[{"code":32,"message":"Could not authenticate you."}]}"#;
        assert_eq!(classify_status(401, body), ErrorKind::Unauthorized);
    }

    #[test]
    fn classify_403_with_limit_code() {
        let body = r#"{"errors":[{"code":185,"message":"User is over daily status update limit."}]}"#;
        assert_eq!(classify_status(403, body), ErrorKind::RateLimited);
    }

    #[test]
    fn classify_403_with_limit_wording_no_code() {
        assert_eq!(
            classify_status(403, "Too Many Requests"),
            ErrorKind::RateLimited
        );
    }

    #[test]
    fn classify_403_other_is_fatal() {
        let body = r#"{"errors":[{"code":179,"message":"Sorry, you are not authorized to see this status."}]}"#;
        assert_eq!(classify_status(403, body), ErrorKind::Fatal);
    }

    #[test]
    fn classify_5xx_transient() {
        for status in [500, 502, 503, 504] {
            assert_eq!(
                classify_status(status, "over capacity"),
                ErrorKind::Transient,
                "status {status}"
            );
        }
    }

    #[test]
    fn classify_408_transient() {
        assert_eq!(classify_status(408, "request timeout"), ErrorKind::Transient);
    }

    #[test]
    fn classify_400_and_404_fatal() {
        assert_eq!(classify_status(400, "bad request"), ErrorKind::Fatal);
        assert_eq!(classify_status(404, "not found"), ErrorKind::Fatal);
    }

    #[test]
    fn error_from_response_extracts_code_and_message() {
        let body = r#"{"errors":[{"code":144,"message":"No status found with that ID."}]}"#;
        let err = error_from_response(404, body);
        assert_eq!(err.kind, ErrorKind::Fatal);
        assert_eq!(err.status, Some(404));
        assert_eq!(err.code, Some(144));
        assert_eq!(err.message, "404: No status found with that ID.");
        assert!(err.is_not_found());
    }

    #[test]
    fn error_from_response_falls_back_to_raw_body() {
        let err = error_from_response(503, "<html>over capacity</html>");
        assert_eq!(err.kind, ErrorKind::Transient);
        assert_eq!(err.code, None);
        assert_eq!(err.message, "503: <html>over capacity</html>");
    }
}
