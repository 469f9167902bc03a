// src/ingest/providers/fixture.rs
//! In-memory search provider for tests and offline runs.
//!
//! Pages are served per keyword in insertion order; the cursor handed back is
//! the index of the next page.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::ingest::types::{FetchError, SearchPage, SearchProvider};
use crate::post::{PostRecord, SearchPostsResponse};

#[derive(Debug, Default)]
pub struct StaticProvider {
    pages: HashMap<String, Vec<Vec<PostRecord>>>,
    failures: HashMap<String, FetchError>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl StaticProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one page of results for `keyword`.
    pub fn with_page(mut self, keyword: &str, posts: Vec<PostRecord>) -> Self {
        self.pages.entry(keyword.to_string()).or_default().push(posts);
        self
    }

    /// Every search for `keyword` fails with `err`.
    pub fn with_failure(mut self, keyword: &str, err: FetchError) -> Self {
        self.failures.insert(keyword.to_string(), err);
        self
    }

    /// Sleep before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Append a page decoded from a raw `searchPosts` JSON body.
    pub fn with_search_response(self, keyword: &str, json: &str) -> Result<Self> {
        let body: SearchPostsResponse =
            serde_json::from_str(json).context("parsing searchPosts fixture")?;
        let posts = body.posts.into_iter().map(PostRecord::from).collect();
        Ok(self.with_page(keyword, posts))
    }

    /// Number of `search_posts` calls served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SearchProvider for StaticProvider {
    async fn search_posts(
        &self,
        query: &str,
        _limit: u32,
        cursor: Option<&str>,
    ) -> Result<SearchPage, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = self.failures.get(query) {
            return Err(err.clone());
        }

        let index = match cursor {
            Some(c) => c
                .parse::<usize>()
                .map_err(|_| FetchError::Decode(format!("bad cursor {c:?}")))?,
            None => 0,
        };
        let pages = self.pages.get(query).map(Vec::as_slice).unwrap_or_default();
        let posts = pages.get(index).cloned().unwrap_or_default();
        let cursor = (index + 1 < pages.len()).then(|| (index + 1).to_string());
        Ok(SearchPage { posts, cursor })
    }

    fn name(&self) -> &'static str {
        "static"
    }
}
