// src/ingest/mod.rs
//! Aggregation: per-keyword search → match → merge → dedup → badwords → length.

pub mod filters;
pub mod providers;
pub mod types;

use std::time::{Duration, Instant};

use futures::future::join_all;
use metrics::{counter, histogram};

use crate::feeds::FeedPolicy;
use crate::ingest::filters::{filter_posts, matches, FilterStats};
use crate::ingest::types::{AggregateError, FetchError, SearchProvider};
use crate::post::PostRecord;

/// Bounds for outbound search calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregateOptions {
    /// Page size per `searchPosts` call.
    pub search_limit: u32,
    /// Max pages fetched per keyword via the continuation cursor.
    pub pages_per_keyword: u32,
    /// Per-call timeout; expiry fails only that keyword.
    pub timeout: Duration,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self {
            search_limit: 100,
            pages_per_keyword: 2,
            timeout: Duration::from_secs(8),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateOutcome {
    pub posts: Vec<PostRecord>,
    /// Keywords whose fetch failed and contributed nothing.
    pub failed_keywords: Vec<String>,
    pub stats: FilterStats,
}

/// Fetch one keyword. Any failure discards that keyword's results entirely.
pub async fn fetch_keyword(
    provider: &dyn SearchProvider,
    keyword: &str,
    opts: &AggregateOptions,
) -> Result<Vec<PostRecord>, FetchError> {
    let mut matched = Vec::new();
    let mut cursor: Option<String> = None;

    for _ in 0..opts.pages_per_keyword.max(1) {
        counter!("feed_search_requests_total").increment(1);
        let call = provider.search_posts(keyword, opts.search_limit, cursor.as_deref());
        let page = match tokio::time::timeout(opts.timeout, call).await {
            Ok(res) => res?,
            Err(_) => return Err(FetchError::Timeout(opts.timeout)),
        };

        if page.posts.is_empty() {
            break;
        }
        matched.extend(page.posts.into_iter().filter(|p| matches(p, keyword)));

        match page.cursor {
            Some(next) if !next.is_empty() => cursor = Some(next),
            _ => break,
        }
    }
    Ok(matched)
}

/// Build the post set for one feed.
///
/// Keywords are searched concurrently and merged in keyword order. A failing
/// keyword is logged and skipped; only a backend-level fault (no session)
/// aborts the whole run. An empty result is not an error.
pub async fn aggregate<S: AsRef<str>>(
    provider: &dyn SearchProvider,
    policy: &FeedPolicy,
    blocklist: &[S],
    opts: &AggregateOptions,
) -> Result<AggregateOutcome, AggregateError> {
    let t0 = Instant::now();

    let fetches = policy
        .keywords
        .iter()
        .map(|kw| fetch_keyword(provider, kw, opts));
    let results = join_all(fetches).await;

    let mut collected = Vec::new();
    let mut failed_keywords = Vec::new();
    for (keyword, res) in policy.keywords.iter().zip(results) {
        match res {
            Ok(mut posts) => collected.append(&mut posts),
            Err(e) if e.is_backend_fault() => {
                tracing::error!(
                    target: "ingest",
                    error = %e,
                    provider = provider.name(),
                    feed = %policy.key,
                    "search backend unavailable"
                );
                counter!("feed_search_errors_total").increment(1);
                return Err(AggregateError::Backend(e));
            }
            Err(e) => {
                tracing::warn!(
                    target: "ingest",
                    error = %e,
                    provider = provider.name(),
                    feed = %policy.key,
                    keyword = %keyword,
                    "keyword search failed, skipping"
                );
                counter!("feed_search_errors_total").increment(1);
                failed_keywords.push(keyword.clone());
            }
        }
    }

    let matched = collected.len();
    let (posts, stats) = filter_posts(collected, blocklist, policy.min_text_length);

    counter!("feed_posts_matched_total").increment(matched as u64);
    counter!("feed_posts_dedup_total").increment(stats.dedup as u64);
    counter!("feed_posts_blocked_total").increment(stats.blocked as u64);
    counter!("feed_posts_short_total").increment(stats.short as u64);
    histogram!("feed_aggregate_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);

    tracing::info!(
        target: "ingest",
        feed = %policy.key,
        keywords = policy.keywords.len(),
        failed = failed_keywords.len(),
        matched,
        dedup = stats.dedup,
        blocked = stats.blocked,
        short = stats.short,
        kept = posts.len(),
        "aggregate done"
    );

    Ok(AggregateOutcome {
        posts,
        failed_keywords,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feeds::FeedOrdering;
    use crate::ingest::providers::fixture::StaticProvider;

    fn policy(keywords: &[&str]) -> FeedPolicy {
        FeedPolicy::new(
            "test",
            keywords.iter().map(|s| s.to_string()).collect(),
            FeedOrdering::Recency,
        )
    }

    #[tokio::test]
    async fn unmatched_results_are_dropped() {
        let provider = StaticProvider::new().with_page(
            "光时",
            vec![
                PostRecord::new("u1", "喜欢光时"),
                PostRecord::new("u2", "喜欢光"),
            ],
        );
        let out = aggregate(
            &provider,
            &policy(&["光时"]),
            &[] as &[String],
            &AggregateOptions::default(),
        )
        .await
        .expect("aggregate");
        let uris: Vec<_> = out.posts.iter().map(|p| p.uri.as_str()).collect();
        assert_eq!(uris, vec!["u1"]);
    }

    #[tokio::test]
    async fn stops_after_page_budget() {
        let provider = StaticProvider::new()
            .with_page("k", vec![PostRecord::new("p1", "k one")])
            .with_page("k", vec![PostRecord::new("p2", "k two")])
            .with_page("k", vec![PostRecord::new("p3", "k three")]);
        let opts = AggregateOptions {
            pages_per_keyword: 2,
            ..AggregateOptions::default()
        };
        let posts = fetch_keyword(&provider, "k", &opts).await.expect("fetch");
        assert_eq!(posts.len(), 2);
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn session_failure_aborts() {
        let provider = StaticProvider::new()
            .with_page("ok", vec![PostRecord::new("p1", "ok")])
            .with_failure("down", FetchError::Session("login refused".into()));
        let err = aggregate(
            &provider,
            &policy(&["ok", "down"]),
            &[] as &[String],
            &AggregateOptions::default(),
        )
        .await
        .expect_err("backend fault");
        assert!(matches!(err, AggregateError::Backend(FetchError::Session(_))));
    }
}
