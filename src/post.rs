//! # Post Record
//! Normalized, read-only view of one post returned by `app.bsky.feed.searchPosts`.
//!
//! The wire shape (`app.bsky.feed.defs#postView`) is decoded tolerantly: the
//! `record` object is kept as raw JSON and only `text`, `langs` and image alt
//! texts are pulled out of it. Missing counters default to zero, an unparseable
//! `indexedAt` becomes `None`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

/// One fetched post, as used by matching, filtering and ranking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostRecord {
    /// `at://` URI; dedup key and the only field returned to clients.
    pub uri: String,
    pub text: String,
    /// Image descriptions joined with a single space.
    pub alt_text: String,
    pub like_count: u64,
    pub repost_count: u64,
    /// `None` when the source timestamp could not be parsed.
    pub indexed_at: Option<DateTime<Utc>>,
    pub languages: BTreeSet<String>,
}

impl PostRecord {
    /// Minimal record with the given uri and text; everything else empty.
    pub fn new(uri: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            text: text.into(),
            alt_text: String::new(),
            like_count: 0,
            repost_count: 0,
            indexed_at: None,
            languages: BTreeSet::new(),
        }
    }

    pub fn alt_text(mut self, alt: impl Into<String>) -> Self {
        self.alt_text = alt.into();
        self
    }

    pub fn engagement(mut self, likes: u64, reposts: u64) -> Self {
        self.like_count = likes;
        self.repost_count = reposts;
        self
    }

    pub fn indexed_at(mut self, at: DateTime<Utc>) -> Self {
        self.indexed_at = Some(at);
        self
    }

    pub fn languages<I, S>(mut self, langs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.languages = langs.into_iter().filter_map(|l| normalize_lang(l.as_ref())).collect();
        self
    }

    /// True if any declared language has `tag` as its primary subtag
    /// (`ja` matches `ja` and `ja-JP`).
    pub fn has_language(&self, tag: &str) -> bool {
        let tag = tag.trim().to_ascii_lowercase();
        self.languages
            .iter()
            .any(|l| l == &tag || l.split('-').next() == Some(tag.as_str()))
    }

    /// Combined engagement, saturating.
    pub fn engagement_total(&self) -> u64 {
        self.like_count.saturating_add(self.repost_count)
    }
}

/// `app.bsky.feed.defs#postView` (only the fields we read).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    pub uri: String,
    #[serde(default)]
    pub record: Value,
    #[serde(default)]
    pub like_count: Option<u64>,
    #[serde(default)]
    pub repost_count: Option<u64>,
    #[serde(default)]
    pub indexed_at: Option<String>,
}

/// `app.bsky.feed.searchPosts` output.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchPostsResponse {
    #[serde(default)]
    pub posts: Vec<PostView>,
    #[serde(default)]
    pub cursor: Option<String>,
}

impl From<PostView> for PostRecord {
    fn from(view: PostView) -> Self {
        let text = view
            .record
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let languages = view
            .record
            .get("langs")
            .and_then(Value::as_array)
            .map(|langs| {
                langs
                    .iter()
                    .filter_map(Value::as_str)
                    .filter_map(normalize_lang)
                    .collect()
            })
            .unwrap_or_default();

        Self {
            uri: view.uri,
            text,
            alt_text: collect_alt_text(view.record.get("embed")),
            like_count: view.like_count.unwrap_or(0),
            repost_count: view.repost_count.unwrap_or(0),
            indexed_at: view.indexed_at.as_deref().and_then(parse_indexed_at),
            languages,
        }
    }
}

/// Parse an RFC 3339 timestamp into UTC; `None` on failure.
pub fn parse_indexed_at(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn normalize_lang(raw: &str) -> Option<String> {
    let t = raw.trim();
    if t.is_empty() {
        None
    } else {
        Some(t.to_ascii_lowercase())
    }
}

// Images live at `embed.images` (app.bsky.embed.images) or
// `embed.media.images` (app.bsky.embed.recordWithMedia).
fn collect_alt_text(embed: Option<&Value>) -> String {
    let Some(embed) = embed else {
        return String::new();
    };
    let images = embed
        .get("images")
        .or_else(|| embed.get("media").and_then(|m| m.get("images")))
        .and_then(Value::as_array);

    match images {
        Some(images) => images
            .iter()
            .filter_map(|img| img.get("alt").and_then(Value::as_str))
            .map(str::trim)
            .filter(|alt| !alt.is_empty())
            .collect::<Vec<_>>()
            .join(" "),
        None => String::new(),
    }
}
