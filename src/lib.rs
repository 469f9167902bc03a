// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod cache;
pub mod config;
pub mod feeds;
pub mod identity;
pub mod metrics;
pub mod post;
pub mod rank;
pub mod scoring;

// Search → match → dedup → badwords pipeline and search providers
pub mod ingest;

// ---- Re-exports for stable public API ----
pub use crate::api::{create_router, AppState};
pub use crate::config::AppConfig;
pub use crate::post::PostRecord;
