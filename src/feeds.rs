//! # Feed Selector
//!
//! Static table of feeds served by this generator. Each feed has a stable key
//! (the record key of its `app.bsky.feed.generator` record), a keyword set, an
//! optional minimum text length and an ordering policy.
//!
//! Resolution order for an incoming feed identifier:
//! 1. exact match of the identifier's record key (last `/` segment),
//! 2. first feed, in table order, with a marker contained in the identifier,
//! 3. the default feed.
//!
//! The resolved key doubles as the cache slot, so arbitrary client strings map
//! onto a bounded set of slots.

use serde::{Deserialize, Serialize};

/// How a feed orders its posts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedOrdering {
    /// Newest `indexed_at` first.
    Recency,
    /// Score descending, posts in the priority language first.
    ScoredLanguagePriority,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeedPolicy {
    pub key: String,
    pub markers: Vec<String>,
    pub keywords: Vec<String>,
    pub min_text_length: Option<usize>,
    pub ordering: FeedOrdering,
}

impl FeedPolicy {
    pub fn new(key: impl Into<String>, keywords: Vec<String>, ordering: FeedOrdering) -> Self {
        Self {
            key: key.into(),
            markers: Vec::new(),
            keywords,
            min_text_length: None,
            ordering,
        }
    }

    pub fn markers<I, S>(mut self, markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.markers = markers.into_iter().map(Into::into).collect();
        self
    }

    pub fn min_text_length(mut self, min: usize) -> Self {
        self.min_text_length = Some(min);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeedTable {
    default: FeedPolicy,
    variants: Vec<FeedPolicy>,
}

impl FeedTable {
    pub fn new(default: FeedPolicy, variants: Vec<FeedPolicy>) -> Self {
        Self { default, variants }
    }

    /// Default feed first, then variants in table order.
    pub fn iter(&self) -> impl Iterator<Item = &FeedPolicy> {
        std::iter::once(&self.default).chain(self.variants.iter())
    }

    pub fn default_feed(&self) -> &FeedPolicy {
        &self.default
    }

    pub fn get(&self, key: &str) -> Option<&FeedPolicy> {
        self.iter().find(|f| f.key == key)
    }

    pub fn resolve(&self, identifier: &str) -> &FeedPolicy {
        let identifier = identifier.trim();
        if let Some(exact) = self.get(record_key(identifier)) {
            return exact;
        }
        self.variants
            .iter()
            .find(|f| {
                f.markers
                    .iter()
                    .any(|m| !m.is_empty() && identifier.contains(m.as_str()))
            })
            .unwrap_or(&self.default)
    }
}

/// Last `/` segment of an `at://` feed URI; the whole string otherwise.
pub fn record_key(identifier: &str) -> &str {
    identifier.rsplit('/').next().unwrap_or(identifier)
}
