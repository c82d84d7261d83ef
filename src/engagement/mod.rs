//! Engagement score computation.
//!
//! The score is a weighted sum of lifetime counters plus a 90-day rolling
//! window of discrete activity events, normalized to 0-100 against an assumed
//! maximum raw score.

use chrono::{DateTime, Duration, Utc};

use crate::models::{parse_rfc3339, ActivityEvent, ActivityKind, User};

// Weights for lifetime counters.
const LOGIN_WEIGHT: i64 = 2;
const PROJECT_WEIGHT: i64 = 10;
const SHARE_WEIGHT: i64 = 20;

// Points per activity event inside the window.
const COMMENT_POINTS: i64 = 5;
const UPLOAD_POINTS: i64 = 10;
const SURVEY_ANSWER_POINTS: i64 = 15;

/// Rolling window for activity events.
pub const WINDOW_DAYS: i64 = 90;

/// Raw score a user would need for a normalized score of 100.
const MAX_RAW_SCORE: i64 = 300;

fn event_points(kind: ActivityKind) -> i64 {
    match kind {
        ActivityKind::Comment => COMMENT_POINTS,
        ActivityKind::Upload => UPLOAD_POINTS,
        ActivityKind::SurveyAnswer => SURVEY_ANSWER_POINTS,
    }
}

/// Weighted raw score from counters and events inside the window.
pub fn raw_score(user: &User, events: &[ActivityEvent], now: DateTime<Utc>) -> i64 {
    let cutoff = now - Duration::days(WINDOW_DAYS);
    let counter_score = user.login_count * LOGIN_WEIGHT
        + user.project_count * PROJECT_WEIGHT
        + (user.share_count_guest + user.share_count_pro) * SHARE_WEIGHT;

    let event_score: i64 = events
        .iter()
        .filter(|e| match parse_rfc3339(&e.created_at) {
            Some(ts) => ts >= cutoff,
            // Malformed timestamps count; dropping them could only lower a
            // score the user already earned.
            None => true,
        })
        .map(|e| event_points(e.kind))
        .sum();

    counter_score + event_score
}

/// Normalized 0-100 engagement score.
pub fn compute_score(user: &User, events: &[ActivityEvent], now: DateTime<Utc>) -> i64 {
    let raw = raw_score(user, events, now);
    let normalized = (raw as f64 / MAX_RAW_SCORE as f64 * 100.0).round() as i64;
    normalized.clamp(0, 100)
}
