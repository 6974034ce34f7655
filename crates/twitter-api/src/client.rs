//! reqwest-backed `TwitterApi` implementation
//!
//! One `HttpClient` per credential. Construction validates the credential,
//! so a pool built from `HttpClient::new` never holds a handle that is known
//! to be unusable. Each request is signed with a fresh nonce and timestamp.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::classify::{error_from_response, error_from_transport};
use crate::constants::{
    DEFAULT_BASE_URL, DEFAULT_TIMEOUT_SECS, SEARCH_PATH, STATUS_PATH, USER_AGENT, USER_PATH,
};
use crate::credentials::CredentialRecord;
use crate::error::{ApiError, ApiResult, CredentialError};
use crate::oauth::{self, percent_encode};
use crate::types::{RawStatus, RawUser, SearchRequest, SearchResponse, UserLookup};
use crate::{BoxFuture, TwitterApi};

/// Transport settings shared by every client in a pool.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

/// Authenticated client bound to one credential.
pub struct HttpClient {
    keys: CredentialRecord,
    base_url: String,
    http: reqwest::Client,
}

impl HttpClient {
    /// Build a client for one credential record.
    ///
    /// Fails if the record does not validate or the HTTP client cannot be
    /// constructed.
    pub fn new(keys: CredentialRecord, settings: &ClientSettings) -> Result<Self, CredentialError> {
        keys.validate()?;
        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| CredentialError::Invalid {
                label: keys.label().to_string(),
                reason: format!("building HTTP client: {e}"),
            })?;
        Ok(Self {
            keys,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn label(&self) -> &str {
        self.keys.label()
    }

    /// Signed GET returning a decoded JSON body.
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: Vec<(&str, String)>,
    ) -> ApiResult<T> {
        let url = format!("{}/{}", self.base_url, path);
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let header = oauth::authorization_header(
            "GET",
            &url,
            &query,
            &self.keys,
            &oauth::generate_nonce(),
            timestamp,
        )?;

        let query_string = query
            .iter()
            .map(|(k, v)| format!("{}={}", percent_encode(k), percent_encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        let full_url = if query_string.is_empty() {
            url
        } else {
            format!("{url}?{query_string}")
        };

        debug!(credential = self.label(), path, "issuing API request");
        let response = self
            .http
            .get(&full_url)
            .header(reqwest::header::AUTHORIZATION, header)
            .send()
            .await
            .map_err(|e| error_from_transport(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<no body>"));
            return Err(error_from_response(status.as_u16(), &body));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::fatal(format!("invalid response body: {e}")).with_status(status.as_u16()))
    }
}

impl TwitterApi for HttpClient {
    fn search<'a>(&'a self, request: &'a SearchRequest) -> BoxFuture<'a, ApiResult<Vec<RawStatus>>> {
        Box::pin(async move {
            let mut query = vec![
                ("q", request.query.clone()),
                ("count", request.count.to_string()),
                ("result_type", "recent".to_string()),
                ("tweet_mode", "extended".to_string()),
            ];
            if let Some(max_id) = request.max_id {
                query.push(("max_id", max_id.to_string()));
            }
            let response: SearchResponse = self.get_json(SEARCH_PATH, query).await?;
            Ok(response.statuses)
        })
    }

    fn get_status(&self, id: u64) -> BoxFuture<'_, ApiResult<RawStatus>> {
        Box::pin(async move {
            let query = vec![("id", id.to_string()), ("tweet_mode", "extended".to_string())];
            self.get_json(STATUS_PATH, query).await
        })
    }

    fn get_user<'a>(&'a self, lookup: &'a UserLookup) -> BoxFuture<'a, ApiResult<RawUser>> {
        Box::pin(async move { self.get_json(USER_PATH, vec![lookup.query_param()]).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use axum::extract::Query;
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::get;
    use std::collections::HashMap;
    use tokio::net::TcpListener;

    fn keys() -> CredentialRecord {
        CredentialRecord::new("test", "ck", "cs", "at", "as")
    }

    /// Mock API: echoes the query back inside a status and checks for an
    /// OAuth header; `q=limit` answers 429, `q=broken` answers 400.
    async fn start_mock_api() -> (String, tokio::task::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let url = format!("http://{addr}/1.1");

        let app = axum::Router::new()
            .route(
                "/1.1/search/tweets.json",
                get(
                    |headers: HeaderMap, Query(params): Query<HashMap<String, String>>| async move {
                        let auth = headers
                            .get("authorization")
                            .and_then(|v| v.to_str().ok())
                            .unwrap_or("");
                        if !auth.starts_with("OAuth ") {
                            return (StatusCode::UNAUTHORIZED, "{}".to_string()).into_response();
                        }
                        match params.get("q").map(String::as_str) {
                            Some("limit") => (
                                StatusCode::TOO_MANY_REQUESTS,
                                r#"{"errors":[{"code":88,"message":"Rate limit exceeded"}]}"#
                                    .to_string(),
                            )
                                .into_response(),
                            Some("broken") => (
                                StatusCode::BAD_REQUEST,
                                r#"{"errors":[{"code":25,"message":"Query parameters are missing."}]}"#
                                    .to_string(),
                            )
                                .into_response(),
                            _ => {
                                let text = format!(
                                    "q={} count={} max_id={}",
                                    params.get("q").cloned().unwrap_or_default(),
                                    params.get("count").cloned().unwrap_or_default(),
                                    params.get("max_id").cloned().unwrap_or_default(),
                                );
                                axum::Json(serde_json::json!({
                                    "statuses": [{"id": 10, "id_str": "10", "full_text": text}]
                                }))
                                .into_response()
                            }
                        }
                    },
                ),
            )
            .route(
                "/1.1/statuses/show.json",
                get(|Query(params): Query<HashMap<String, String>>| async move {
                    let id = params.get("id").cloned().unwrap_or_default();
                    if id == "404" {
                        return (
                            StatusCode::NOT_FOUND,
                            r#"{"errors":[{"code":144,"message":"No status found with that ID."}]}"#,
                        )
                            .into_response();
                    }
                    axum::Json(serde_json::json!({"id_str": id, "text": "hello"})).into_response()
                }),
            )
            .route(
                "/1.1/users/show.json",
                get(|Query(params): Query<HashMap<String, String>>| async move {
                    axum::Json(serde_json::json!({
                        "screen_name": params.get("screen_name").cloned().unwrap_or_else(|| "by-id".into()),
                        "followers_count": 3,
                        "friends_count": 4
                    }))
                }),
            );

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (url, handle)
    }

    fn client_for(base_url: &str) -> HttpClient {
        HttpClient::new(
            keys(),
            &ClientSettings {
                base_url: base_url.to_string(),
                timeout: Duration::from_secs(5),
            },
        )
        .unwrap()
    }

    #[test]
    fn new_rejects_invalid_credential() {
        let bad = CredentialRecord::new("bad", "ck", " ", "at", "as");
        let result = HttpClient::new(bad, &ClientSettings::default());
        assert!(matches!(result, Err(CredentialError::Invalid { .. })));
    }

    #[test]
    fn default_settings_target_v1_1() {
        let settings = ClientSettings::default();
        assert_eq!(settings.base_url, "https://api.twitter.com/1.1");
        assert_eq!(settings.timeout, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn search_sends_signed_request_with_parameters() {
        let (url, _server) = start_mock_api().await;
        let client = client_for(&url);

        let request = SearchRequest::new("#rust lang", 50).with_max_id(Some(999));
        let statuses = client.search(&request).await.unwrap();

        assert_eq!(statuses.len(), 1);
        assert_eq!(
            statuses[0].full_text.as_deref(),
            Some("q=#rust lang count=50 max_id=999")
        );
    }

    #[tokio::test]
    async fn search_without_watermark_omits_max_id() {
        let (url, _server) = start_mock_api().await;
        let client = client_for(&url);

        let statuses = client.search(&SearchRequest::new("rust", 5)).await.unwrap();
        assert_eq!(statuses[0].full_text.as_deref(), Some("q=rust count=5 max_id="));
    }

    #[tokio::test]
    async fn rate_limit_response_is_classified() {
        let (url, _server) = start_mock_api().await;
        let client = client_for(&url);

        let err = client
            .search(&SearchRequest::new("limit", 5))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::RateLimited);
        assert_eq!(err.code, Some(88));
    }

    #[tokio::test]
    async fn bad_request_is_fatal() {
        let (url, _server) = start_mock_api().await;
        let client = client_for(&url);

        let err = client
            .search(&SearchRequest::new("broken", 5))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Fatal);
        assert_eq!(err.status, Some(400));
    }

    #[tokio::test]
    async fn get_status_and_not_found() {
        let (url, _server) = start_mock_api().await;
        let client = client_for(&url);

        let status = client.get_status(42).await.unwrap();
        assert_eq!(status.status_id(), Some(42));

        let err = client.get_status(404).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn get_user_by_screen_name() {
        let (url, _server) = start_mock_api().await;
        let client = client_for(&url);

        let user = client
            .get_user(&UserLookup::ScreenName("jack".into()))
            .await
            .unwrap();
        assert_eq!(user.screen_name.as_deref(), Some("jack"));
        assert_eq!(user.followers_count, Some(3));
    }

    #[tokio::test]
    async fn unreachable_server_is_transient() {
        // Bind then drop a listener so the port is closed
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = client_for(&format!("http://{addr}/1.1"));
        let err = client.get_status(1).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Transient);
    }
}
