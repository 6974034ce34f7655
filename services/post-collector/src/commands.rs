//! Subcommand runners
//!
//! Results go to `out` as JSON lines, one post or author per line. Logs go
//! to stderr, so stdout stays machine-readable.

use std::io::Write;

use anyhow::{Context, Result, bail};
use collector::{IndexCollector, IndexQuery, LinkResolver, Post, TwitterCollector};
use credential_pool::Cancellation;
use serde::Serialize;
use tracing::info;
use twitter_api::{TwitterApi, UserLookup};

fn write_line<W: Write, T: Serialize>(out: &mut W, value: &T) -> Result<()> {
    serde_json::to_writer(&mut *out, value).context("serializing output")?;
    writeln!(out).context("writing output")?;
    Ok(())
}

fn write_posts<W: Write>(out: &mut W, posts: &[Post]) -> Result<()> {
    for post in posts {
        write_line(out, post)?;
    }
    Ok(())
}

pub async fn search<C, W>(
    collector: &TwitterCollector<C>,
    terms: &str,
    count: usize,
    cancel: &Cancellation,
    out: &mut W,
) -> Result<usize>
where
    C: TwitterApi + 'static,
    W: Write,
{
    let posts = collector
        .search_by_terms(terms, count, cancel)
        .await
        .with_context(|| format!("searching for {terms:?}"))?;
    info!(terms, requested = count, returned = posts.len(), "search complete");
    write_posts(out, &posts)?;
    Ok(posts.len())
}

pub async fn status<C, W>(collector: &TwitterCollector<C>, id: u64, cancel: &Cancellation, out: &mut W) -> Result<()>
where
    C: TwitterApi + 'static,
    W: Write,
{
    let post = collector
        .status_by_id(id, cancel)
        .await
        .with_context(|| format!("fetching status {id}"))?;
    let Some(post) = post else {
        bail!("status {id} not found");
    };
    write_line(out, &post)
}

pub async fn user<C, W>(collector: &TwitterCollector<C>, input: &str, cancel: &Cancellation, out: &mut W) -> Result<()>
where
    C: TwitterApi + 'static,
    W: Write,
{
    let lookup = UserLookup::parse(input);
    let author = collector
        .user(lookup, cancel)
        .await
        .with_context(|| format!("fetching user {input}"))?;
    let Some(author) = author else {
        bail!("user {input} not found");
    };
    write_line(out, &author)
}

#[derive(Debug, Serialize)]
struct Sources<'a> {
    id: u64,
    sources: &'a [String],
}

/// Hosts cited by one post.
pub async fn sources<C, W>(
    collector: &TwitterCollector<C>,
    resolver: &LinkResolver,
    id: u64,
    cancel: &Cancellation,
    out: &mut W,
) -> Result<()>
where
    C: TwitterApi + 'static,
    W: Write,
{
    let post = collector
        .status_by_id(id, cancel)
        .await
        .with_context(|| format!("fetching status {id}"))?;
    let Some(post) = post else {
        bail!("status {id} not found");
    };
    let hosts = resolver.source_hosts(&post.text).await;
    write_line(out, &Sources { id, sources: &hosts })
}

pub async fn index<W: Write>(
    index: &IndexCollector,
    query: &IndexQuery,
    from: usize,
    size: usize,
    out: &mut W,
) -> Result<usize> {
    let posts = index
        .search_posts(query, from, size)
        .await
        .context("querying post index")?;
    write_posts(out, &posts)?;
    Ok(posts.len())
}

pub fn pool<C, W: Write>(collector: &TwitterCollector<C>, out: &mut W) -> Result<()>
where
    C: TwitterApi + 'static,
{
    write_line(out, &collector.pool().summary())
}

#[cfg(test)]
mod tests {
    use super::*;
    use credential_pool::{Credential, CredentialPool, DEFAULT_BACKOFF};
    use std::sync::Arc;
    use std::time::Duration;
    use twitter_api::{ApiError, ApiResult, BoxFuture, RawStatus, RawUser, SearchRequest};

    /// Status 1 links out, everything else is missing; one user, "ana".
    struct Fake;

    impl TwitterApi for Fake {
        fn search<'a>(&'a self, request: &'a SearchRequest) -> BoxFuture<'a, ApiResult<Vec<RawStatus>>> {
            Box::pin(async move {
                let top = request.max_id.unwrap_or(100);
                Ok((0..u64::from(request.count)).map(|i| raw_status(top - i)).collect())
            })
        }

        fn get_status(&self, id: u64) -> BoxFuture<'_, ApiResult<RawStatus>> {
            Box::pin(async move {
                if id == 1 {
                    Ok(raw_status(1))
                } else {
                    Err(ApiError::fatal("404: No status found").with_status(404))
                }
            })
        }

        fn get_user<'a>(&'a self, lookup: &'a UserLookup) -> BoxFuture<'a, ApiResult<RawUser>> {
            Box::pin(async move {
                match lookup {
                    UserLookup::ScreenName(name) if name == "ana" => Ok(raw_user()),
                    _ => Err(ApiError::fatal("404: User not found").with_status(404)),
                }
            })
        }
    }

    fn raw_user() -> RawUser {
        RawUser {
            id: Some(7),
            screen_name: Some("ana".into()),
            followers_count: Some(10),
            friends_count: Some(20),
        }
    }

    fn raw_status(id: u64) -> RawStatus {
        RawStatus {
            id: Some(id),
            text: Some("via https://www.example.org/a and https://t.co/xyz".into()),
            created_at: Some("Wed Oct 10 20:19:24 +0000 2018".into()),
            user: Some(raw_user()),
            ..Default::default()
        }
    }

    fn collector() -> TwitterCollector<Fake> {
        let pool = CredentialPool::new(vec![Credential::new("k1", Fake)], DEFAULT_BACKOFF);
        TwitterCollector::new(Arc::new(pool))
    }

    fn lines(out: &[u8]) -> Vec<serde_json::Value> {
        std::str::from_utf8(out)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn search_writes_one_line_per_post() {
        let mut out = Vec::new();
        let n = search(&collector(), "#rust", 3, &Cancellation::none(), &mut out)
            .await
            .unwrap();
        assert_eq!(n, 3);
        let ids: Vec<u64> = lines(&out).iter().map(|v| v["id"].as_u64().unwrap()).collect();
        assert_eq!(ids, vec![100, 99, 98]);
        assert_eq!(lines(&out)[0]["kind"], "original");
    }

    #[tokio::test]
    async fn status_found_and_missing() {
        let collector = collector();
        let mut out = Vec::new();
        status(&collector, 1, &Cancellation::none(), &mut out).await.unwrap();
        assert_eq!(lines(&out)[0]["author"]["handle"], "ana");

        let err = status(&collector, 2, &Cancellation::none(), &mut Vec::new())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "status 2 not found");
    }

    #[tokio::test]
    async fn user_accepts_at_names() {
        let collector = collector();
        let mut out = Vec::new();
        user(&collector, "@ana", &Cancellation::none(), &mut out).await.unwrap();
        assert_eq!(
            lines(&out),
            vec![serde_json::json!({"handle": "ana", "follower_count": 10, "friend_count": 20})]
        );

        let err = user(&collector, "bob", &Cancellation::none(), &mut Vec::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not found"), "got: {err}");
    }

    #[tokio::test]
    async fn sources_lists_external_hosts() {
        let resolver = LinkResolver::new(false, Duration::from_secs(1)).unwrap();
        let mut out = Vec::new();
        sources(&collector(), &resolver, 1, &Cancellation::none(), &mut out)
            .await
            .unwrap();
        assert_eq!(
            lines(&out),
            vec![serde_json::json!({"id": 1, "sources": ["example.org"]})]
        );
    }

    #[test]
    fn pool_prints_summary() {
        let mut out = Vec::new();
        pool(&collector(), &mut out).unwrap();
        let summary = &lines(&out)[0];
        assert_eq!(summary["status"], "healthy");
        assert_eq!(summary["credentials_total"], 1);
    }
}
