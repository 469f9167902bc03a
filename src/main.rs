//! Keyword Feed Generator: binary entrypoint.
//! Boots the Axum HTTP server, wiring config, the Bluesky search client,
//! the feed cache and metrics.

use std::sync::Arc;

use anyhow::Context;
use shuttle_axum::ShuttleAxum;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use bsky_keyword_feed::ingest::providers::bsky::{BskyClient, Credentials};
use bsky_keyword_feed::metrics::Metrics;
use bsky_keyword_feed::{create_router, AppConfig, AppState};

/// Compact logs filtered by `RUST_LOG`. The deployment runtime may already
/// have installed a subscriber; in that case this is a no-op.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("bsky_keyword_feed=info,warn"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init();
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let config = AppConfig::load().context("loading feed configuration")?;
    info!(
        hostname = %config.hostname,
        feeds = config.feeds.iter().count(),
        cache_ttl_secs = config.cache_ttl.as_secs(),
        top_n = config.top_n,
        "feed config loaded"
    );

    let credentials = Credentials::from_env()?;
    let client = BskyClient::new(&config.service_url, credentials, config.aggregate.timeout)?;
    // Log in once up front; a failure here is retried on the first search.
    if let Err(e) = client.login().await {
        warn!(error = %e, "initial login failed, will retry on first search");
    }

    let metrics = match Metrics::init(config.cache_ttl.as_secs()) {
        Ok(m) => Some(m),
        Err(e) => {
            warn!(error = ?e, "metrics disabled");
            None
        }
    };

    let state = AppState::new(config, Arc::new(client));
    let mut router = create_router(state);
    if let Some(m) = metrics {
        router = router.merge(m.router());
    }

    Ok(router.into())
}
