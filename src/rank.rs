//! # Ranker
//! Pure ordering of a cached post set per feed policy. No I/O.
//!
//! - `Recency`: `indexed_at` descending, stable.
//! - `ScoredLanguagePriority`: posts tagged with the priority language first,
//!   each group by score descending (ties by `uri`), so the first
//!   `min(30, n)` slots always go to priority-language posts. Nothing is dropped.
//!
//! Posts without a usable timestamp keep their input order at the tail.

use chrono::{DateTime, Utc};

use crate::feeds::FeedOrdering;
use crate::post::PostRecord;
use crate::scoring::{self, DEFAULT_GRAVITY};

#[derive(Debug, Clone, PartialEq)]
pub struct RankParams {
    pub gravity: f64,
    pub priority_language: String,
}

impl Default for RankParams {
    fn default() -> Self {
        Self {
            gravity: DEFAULT_GRAVITY,
            priority_language: "ja".to_string(),
        }
    }
}

pub fn rank<'a>(
    posts: &'a [PostRecord],
    ordering: FeedOrdering,
    now: DateTime<Utc>,
    params: &RankParams,
) -> Vec<&'a PostRecord> {
    match ordering {
        FeedOrdering::Recency => by_recency(posts),
        FeedOrdering::ScoredLanguagePriority => by_score_with_priority(posts, now, params),
    }
}

fn by_recency(posts: &[PostRecord]) -> Vec<&PostRecord> {
    let (mut dated, undated): (Vec<&PostRecord>, Vec<&PostRecord>) =
        posts.iter().partition(|p| p.indexed_at.is_some());
    dated.sort_by(|a, b| b.indexed_at.cmp(&a.indexed_at));
    dated.extend(undated);
    dated
}

fn by_score_with_priority<'a>(
    posts: &'a [PostRecord],
    now: DateTime<Utc>,
    params: &RankParams,
) -> Vec<&'a PostRecord> {
    let mut priority = Vec::new();
    let mut others = Vec::new();
    let mut unscored = Vec::new();

    for post in posts {
        match scoring::score(post, params.gravity, now) {
            Some(s) if post.has_language(&params.priority_language) => priority.push((post, s)),
            Some(s) => others.push((post, s)),
            None => unscored.push(post),
        }
    }

    sort_by_score(&mut priority);
    sort_by_score(&mut others);

    priority
        .into_iter()
        .chain(others)
        .map(|(post, _)| post)
        .chain(unscored)
        .collect()
}

fn sort_by_score(v: &mut [(&PostRecord, f64)]) {
    v.sort_by(|(a, sa), (b, sb)| sb.total_cmp(sa).then_with(|| a.uri.cmp(&b.uri)));
}
