//! Decay-weighted popularity score.
//!
//! `score = (likes + reposts + 1) / (age_hours + 2) ^ gravity`
//!
//! The `+1` keeps fresh posts without engagement above zero, the `+2` keeps
//! very young posts from dominating. Higher `gravity` favors recency.
//! `now` is passed in so one ranking pass uses a single clock reading.

use chrono::{DateTime, Utc};

use crate::post::PostRecord;

pub const DEFAULT_GRAVITY: f64 = 2.2;

/// Hours between `indexed_at` and `now`, never negative.
pub fn age_hours(indexed_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let ms = (now - indexed_at).num_milliseconds() as f64;
    (ms / 3_600_000.0).max(0.0)
}

/// Score from raw inputs.
pub fn score_at(engagement: u64, age_hours: f64, gravity: f64) -> f64 {
    (engagement as f64 + 1.0) / (age_hours.max(0.0) + 2.0).powf(gravity)
}

/// `None` when the post has no usable timestamp.
pub fn score(post: &PostRecord, gravity: f64, now: DateTime<Utc>) -> Option<f64> {
    let indexed_at = post.indexed_at?;
    Some(score_at(
        post.engagement_total(),
        age_hours(indexed_at, now),
        gravity,
    ))
}
