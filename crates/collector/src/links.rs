//! Information sources cited by a post
//!
//! The sources of a post are the hosts of the links in its text. Shortened
//! links can be followed to their final destination; the platform's own
//! hosts are never reported as sources.

use std::collections::BTreeSet;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use tracing::debug;
use url::Url;

use crate::error::{Error, Result};

/// Hosts that never count as an external source.
pub const EXCLUDED_HOSTS: [&str; 2] = ["twitter.com", "t.co"];

pub const DEFAULT_LINK_TIMEOUT: Duration = Duration::from_secs(10);

const MAX_REDIRECTS: usize = 10;

static LINK: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"https?://[^/\s]+(?:/\S+)?").ok());

/// Every `http(s)://host[/path]` link in `text`, in order of appearance.
pub fn extract_links(text: &str) -> Vec<String> {
    let Some(pattern) = LINK.as_ref() else {
        return Vec::new();
    };
    pattern
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Host of `link` without a leading `www.`; `None` if it is not a URL.
pub fn host_of(link: &str) -> Option<String> {
    let url = Url::parse(link).ok()?;
    let host = url.host_str()?;
    Some(host.strip_prefix("www.").unwrap_or(host).to_string())
}

/// Resolves the links in a post to source hosts.
pub struct LinkResolver {
    http: reqwest::Client,
    follow_redirects: bool,
}

impl LinkResolver {
    /// `timeout` bounds the whole redirect chain of one link.
    pub fn new(follow_redirects: bool, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()
            .map_err(|e| Error::Http(format!("building link client: {e}")))?;
        Ok(Self {
            http,
            follow_redirects,
        })
    }

    /// Final URL of `link`, or the link itself when redirects are not
    /// followed. `None` if it cannot be reached.
    pub async fn resolve(&self, link: &str) -> Option<String> {
        if !self.follow_redirects {
            return Some(link.to_string());
        }
        match self.http.get(link).send().await {
            Ok(response) => Some(response.url().to_string()),
            Err(e) => {
                debug!(link, error = %e, "link unreachable, skipping");
                None
            }
        }
    }

    /// Distinct source hosts of the links in `text`, sorted.
    pub async fn source_hosts(&self, text: &str) -> Vec<String> {
        let mut hosts = BTreeSet::new();
        for link in extract_links(text) {
            let Some(resolved) = self.resolve(&link).await else {
                continue;
            };
            if let Some(host) = host_of(&resolved) {
                hosts.insert(host);
            }
        }
        hosts
            .into_iter()
            .filter(|host| !EXCLUDED_HOSTS.contains(&host.as_str()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{StatusCode, header};
    use axum::response::IntoResponse;
    use axum::routing::get;
    use tokio::net::TcpListener;

    #[test]
    fn extracts_links_with_and_without_paths() {
        let text = "read https://www.example.org/a/b?c=1 and http://news.test also https://t.co/xyz";
        assert_eq!(
            extract_links(text),
            vec![
                "https://www.example.org/a/b?c=1",
                "http://news.test",
                "https://t.co/xyz"
            ]
        );
        assert!(extract_links("no links here").is_empty());
    }

    #[test]
    fn host_strips_www_and_port() {
        assert_eq!(host_of("https://www.example.org/a").as_deref(), Some("example.org"));
        assert_eq!(host_of("http://localhost:8080/x").as_deref(), Some("localhost"));
        assert_eq!(host_of("not a url"), None);
    }

    #[tokio::test]
    async fn without_redirects_hosts_come_from_the_text() {
        let resolver = LinkResolver::new(false, DEFAULT_LINK_TIMEOUT).unwrap();
        let text = "https://www.example.org/a https://example.org/b https://twitter.com/x/status/1 https://t.co/abc http://blog.test/post";
        assert_eq!(
            resolver.source_hosts(text).await,
            vec!["blog.test".to_string(), "example.org".to_string()]
        );
    }

    #[tokio::test]
    async fn follows_redirects_and_skips_unreachable_links() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let app = axum::Router::new()
            .route(
                "/short",
                get(move || async move {
                    (
                        StatusCode::FOUND,
                        [(header::LOCATION, format!("http://localhost:{port}/article"))],
                    )
                        .into_response()
                }),
            )
            .route("/article", get(|| async { "article" }));
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let closed = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let closed_port = closed.local_addr().unwrap().port();
        drop(closed);

        let resolver = LinkResolver::new(true, Duration::from_secs(5)).unwrap();
        let text = format!("see http://127.0.0.1:{port}/short and http://127.0.0.1:{closed_port}/gone");

        assert_eq!(resolver.source_hosts(&text).await, vec!["localhost".to_string()]);
    }
}
