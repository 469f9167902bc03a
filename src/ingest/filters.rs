// src/ingest/filters.rs
//! Matcher, badword filter, dedup and length gate. All pure.

use std::collections::HashSet;

use crate::post::PostRecord;

/// Counts of posts dropped by each stage of [`filter_posts`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterStats {
    pub dedup: usize,
    pub blocked: usize,
    pub short: usize,
}

/// Lowercased keyword with leading `#` removed.
pub fn normalize_keyword(keyword: &str) -> String {
    keyword.trim().trim_start_matches('#').to_lowercase()
}

/// Upstream search is fuzzy; accept a post only if the keyword really occurs
/// in its text or alt text.
pub fn matches(post: &PostRecord, keyword: &str) -> bool {
    let needle = normalize_keyword(keyword);
    if needle.is_empty() {
        return false;
    }
    post.text.to_lowercase().contains(&needle) || post.alt_text.to_lowercase().contains(&needle)
}

/// False if any blocklist term occurs in the post text (case-insensitive).
/// Empty text is always clean.
pub fn is_clean<S: AsRef<str>>(post: &PostRecord, blocklist: &[S]) -> bool {
    if post.text.is_empty() {
        return true;
    }
    let text = post.text.to_lowercase();
    !blocklist
        .iter()
        .map(|t| t.as_ref().trim())
        .filter(|t| !t.is_empty())
        .any(|t| text.contains(&t.to_lowercase()))
}

/// Keep the first occurrence of every `uri`, in input order.
/// Returns the survivors and the number of dropped duplicates.
pub fn dedup_by_uri(posts: Vec<PostRecord>) -> (Vec<PostRecord>, usize) {
    let mut seen: HashSet<String> = HashSet::with_capacity(posts.len());
    let mut keep = Vec::with_capacity(posts.len());
    let mut dropped = 0usize;
    for post in posts {
        if seen.insert(post.uri.clone()) {
            keep.push(post);
        } else {
            dropped += 1;
        }
    }
    (keep, dropped)
}

/// Length is counted in characters, not bytes.
pub fn meets_min_length(post: &PostRecord, min_text_length: Option<usize>) -> bool {
    match min_text_length {
        Some(min) => post.text.chars().count() >= min,
        None => true,
    }
}

/// Dedup, then badwords, then minimum length.
pub fn filter_posts<S: AsRef<str>>(
    raw: Vec<PostRecord>,
    blocklist: &[S],
    min_text_length: Option<usize>,
) -> (Vec<PostRecord>, FilterStats) {
    let (unique, dedup) = dedup_by_uri(raw);
    let mut stats = FilterStats {
        dedup,
        ..FilterStats::default()
    };

    let mut keep = Vec::with_capacity(unique.len());
    for post in unique {
        if !is_clean(&post, blocklist) {
            stats.blocked += 1;
            continue;
        }
        if !meets_min_length(&post, min_text_length) {
            stats.short += 1;
            continue;
        }
        keep.push(post);
    }
    (keep, stats)
}
