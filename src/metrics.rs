use anyhow::{Context, Result};
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder and describe all series.
    /// Fails if a recorder is already installed.
    pub fn init(cache_ttl_secs: u64) -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;

        describe_series();
        gauge!("feed_cache_ttl_secs").set(cache_ttl_secs as f64);

        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}

fn describe_series() {
    describe_counter!(
        "feed_skeleton_requests_total",
        "getFeedSkeleton requests served."
    );
    describe_counter!(
        "feed_search_requests_total",
        "Outbound searchPosts calls."
    );
    describe_counter!(
        "feed_search_errors_total",
        "Keyword searches that failed (transport, timeout, status, decode, session)."
    );
    describe_counter!(
        "feed_posts_matched_total",
        "Posts accepted by the keyword matcher."
    );
    describe_counter!("feed_posts_dedup_total", "Posts dropped as duplicate uri.");
    describe_counter!("feed_posts_blocked_total", "Posts dropped by the badword filter.");
    describe_counter!(
        "feed_posts_short_total",
        "Posts dropped for being below the feed's minimum length."
    );
    describe_counter!("feed_cache_hits_total", "Feed cache hits.");
    describe_counter!("feed_cache_misses_total", "Feed cache misses (refreshes).");
    describe_histogram!("feed_aggregate_ms", "Aggregation time in milliseconds.");
    describe_gauge!("feed_cache_ttl_secs", "Configured cache validity window.");
}
