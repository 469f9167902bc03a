// src/ingest/types.rs
use std::time::Duration;

use thiserror::Error;

use crate::post::PostRecord;

/// One page of search results plus the continuation cursor, if any.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchPage {
    pub posts: Vec<PostRecord>,
    pub cursor: Option<String>,
}

/// Failure of a single search call.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FetchError {
    #[error("search transport error: {0}")]
    Transport(String),
    #[error("search timed out after {0:?}")]
    Timeout(Duration),
    #[error("search returned HTTP {status}")]
    Status { status: u16 },
    #[error("malformed search response: {0}")]
    Decode(String),
    /// No session could be established with the backend.
    #[error("search session unavailable: {0}")]
    Session(String),
}

impl FetchError {
    /// Faults that mean the backend cannot be used at all, not just for one keyword.
    pub fn is_backend_fault(&self) -> bool {
        matches!(self, FetchError::Session(_))
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum AggregateError {
    #[error("search backend unreachable: {0}")]
    Backend(#[source] FetchError),
}

/// Remote post search (`app.bsky.feed.searchPosts` or a stand-in).
#[async_trait::async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search_posts(
        &self,
        query: &str,
        limit: u32,
        cursor: Option<&str>,
    ) -> Result<SearchPage, FetchError>;

    fn name(&self) -> &'static str;
}
