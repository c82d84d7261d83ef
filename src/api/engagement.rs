//! Engagement score recomputation endpoint.

use axum::extract::State;
use chrono::Utc;
use serde::Serialize;

use super::{load_user, success, ApiResult};
use crate::auth::AuthUser;
use crate::engagement;
use crate::AppState;

/// Response body for `POST /api/engagement/recompute`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementResponse {
    pub raw_score: i64,
    pub score: i64,
}

/// POST /api/engagement/recompute - Recompute and persist the caller's score.
pub async fn recompute_engagement(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<EngagementResponse> {
    let user = load_user(&state, &auth.user_id).await?;
    let events = state.repo.list_activity_for_user(&user.id).await?;

    let now = Utc::now();
    let raw_score = engagement::raw_score(&user, &events, now);
    let score = engagement::compute_score(&user, &events, now);
    state.repo.set_engagement_score(&user.id, score).await?;

    success(EngagementResponse { raw_score, score })
}
