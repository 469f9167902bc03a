use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use metrics::counter;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::cache::FeedCache;
use crate::config::AppConfig;
use crate::identity::{self, DidDocument, FeedGeneratorDescription};
use crate::ingest::{self, types::AggregateError, types::SearchProvider};
use crate::rank;

pub const CACHE_HEADER: &str = "x-feed-cache";

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub provider: Arc<dyn SearchProvider>,
    pub cache: Arc<FeedCache>,
}

impl AppState {
    pub fn new(config: AppConfig, provider: Arc<dyn SearchProvider>) -> Self {
        Self {
            config: Arc::new(config),
            provider,
            cache: Arc::new(FeedCache::new()),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(liveness))
        .route("/.well-known/did.json", get(did_json))
        .route(
            "/xrpc/app.bsky.feed.describeFeedGenerator",
            get(describe_feed_generator),
        )
        .route("/xrpc/app.bsky.feed.getFeedSkeleton", get(get_feed_skeleton))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

async fn liveness() -> &'static str {
    "bsky-keyword-feed: ok"
}

async fn did_json(State(state): State<AppState>) -> Json<DidDocument> {
    Json(identity::did_document(&state.config.hostname))
}

async fn describe_feed_generator(State(state): State<AppState>) -> Json<FeedGeneratorDescription> {
    let cfg = &state.config;
    Json(identity::describe(&cfg.hostname, &cfg.publisher_did, &cfg.feeds))
}

#[derive(Debug, Deserialize)]
struct SkeletonQuery {
    feed: String,
    #[serde(default)]
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct SkeletonItem {
    post: String,
}

#[derive(Debug, Serialize)]
struct FeedSkeleton {
    feed: Vec<SkeletonItem>,
}

async fn get_feed_skeleton(
    State(state): State<AppState>,
    Query(q): Query<SkeletonQuery>,
) -> Result<Response, ApiError> {
    counter!("feed_skeleton_requests_total").increment(1);

    let cfg = &state.config;
    let policy = cfg.feeds.resolve(&q.feed);
    let provider = state.provider.as_ref();

    let (posts, status) = state
        .cache
        .get(&policy.key, cfg.cache_ttl, || async {
            ingest::aggregate(provider, policy, cfg.badwords.as_slice(), &cfg.aggregate)
                .await
                .map(|outcome| outcome.posts)
        })
        .await?;

    let now = Utc::now();
    let ranked = rank::rank(&posts, policy.ordering, now, &cfg.rank);
    let limit = q.limit.map_or(cfg.top_n, |l| l.clamp(1, cfg.top_n));
    let feed: Vec<SkeletonItem> = ranked
        .into_iter()
        .take(limit)
        .map(|p| SkeletonItem {
            post: p.uri.clone(),
        })
        .collect();

    tracing::debug!(
        target: "api",
        feed = %policy.key,
        cache = status.as_header(),
        available = posts.len(),
        returned = feed.len(),
        "getFeedSkeleton"
    );

    Ok((
        [(CACHE_HEADER, status.as_header())],
        Json(FeedSkeleton { feed }),
    )
        .into_response())
}

/// XRPC-style error body: `{"error": "...", "message": "..."}`.
#[derive(Debug)]
pub enum ApiError {
    Upstream(AggregateError),
}

impl From<AggregateError> for ApiError {
    fn from(e: AggregateError) -> Self {
        ApiError::Upstream(e)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Upstream(e) => {
                tracing::error!(target: "api", error = %e, "feed skeleton failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorBody {
                        error: "InternalServerError",
                        message: "search backend unavailable",
                    }),
                )
                    .into_response()
            }
        }
    }
}
