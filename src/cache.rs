//! # Feed cache
//! Last aggregated post set per feed slot, valid for a fixed window.
//!
//! Each slot sits behind its own async mutex that is held while a refresh is
//! running, so concurrent requests for a stale slot wait for the one in-flight
//! refresh instead of starting their own. Entries are immutable `Arc`
//! snapshots replaced as a whole.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use metrics::counter;
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::Instant;

use crate::post::PostRecord;

/// Shared, read-only post set.
pub type Snapshot = Arc<Vec<PostRecord>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    pub fn as_header(self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
        }
    }
}

#[derive(Debug)]
struct CacheEntry {
    posts: Snapshot,
    fetched_at: Instant,
}

type Slot = Arc<AsyncMutex<Option<CacheEntry>>>;

#[derive(Debug, Default)]
pub struct FeedCache {
    slots: Mutex<HashMap<String, Slot>>,
}

impl FeedCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: &str) -> Slot {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.entry(key.to_string()).or_default().clone()
    }

    /// Return the cached snapshot for `key` if younger than `validity`,
    /// otherwise run `producer`, store its result and return it.
    ///
    /// A producer error leaves the previous entry in place and is returned
    /// unchanged.
    pub async fn get<F, Fut, E>(
        &self,
        key: &str,
        validity: Duration,
        producer: F,
    ) -> Result<(Snapshot, CacheStatus), E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<PostRecord>, E>>,
    {
        let slot = self.slot(key);
        let mut entry = slot.lock().await;

        if let Some(cached) = entry.as_ref() {
            if cached.fetched_at.elapsed() < validity {
                counter!("feed_cache_hits_total").increment(1);
                return Ok((Arc::clone(&cached.posts), CacheStatus::Hit));
            }
        }

        counter!("feed_cache_misses_total").increment(1);
        let posts: Snapshot = Arc::new(producer().await?);
        *entry = Some(CacheEntry {
            posts: Arc::clone(&posts),
            fetched_at: Instant::now(),
        });
        tracing::debug!(target: "cache", slot = key, posts = posts.len(), "cache refreshed");
        Ok((posts, CacheStatus::Miss))
    }

    /// Number of slots created so far.
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
