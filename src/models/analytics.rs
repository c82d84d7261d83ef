//! Daily analytics rollup rows.

use serde::{Deserialize, Serialize};

/// Aggregated platform counters for one calendar day (UTC).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyStats {
    /// YYYY-MM-DD.
    pub date: String,
    pub new_users: i64,
    /// Users with at least one activity event that day.
    pub active_users: i64,
    pub projects_created: i64,
    pub versions_uploaded: i64,
    pub comments_created: i64,
    pub feedback_answers: i64,
    pub computed_at: String,
}

/// Query parameters for reading the rollup.
#[derive(Debug, Clone, Deserialize)]
pub struct DailyStatsQuery {
    /// How many trailing days to return (default 30).
    #[serde(default = "default_days")]
    pub days: i64,
}

/// Request body for rebuilding the rollup.
#[derive(Debug, Clone, Deserialize)]
pub struct RebuildStatsRequest {
    #[serde(default = "default_days")]
    pub days: i64,
}

fn default_days() -> i64 {
    30
}
