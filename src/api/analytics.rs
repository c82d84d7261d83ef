//! Admin analytics rollup endpoints.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Serialize;

use super::{success, ApiResult};
use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::jobs;
use crate::models::{DailyStats, DailyStatsQuery, RebuildStatsRequest};
use crate::AppState;

/// Response body for the rebuild endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RebuildResponse {
    pub days_updated: i64,
}

/// POST /api/admin/analytics/rebuild - Recompute the daily rollup. Admin only.
pub async fn rebuild_analytics(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<RebuildStatsRequest>,
) -> ApiResult<RebuildResponse> {
    auth.require_admin()?;
    if request.days <= 0 || request.days > 365 {
        return Err(AppError::InvalidArgument(
            "days must be between 1 and 365".to_string(),
        ));
    }

    let days_updated = jobs::rebuild_daily_stats(&state.repo, request.days).await;
    success(RebuildResponse { days_updated })
}

/// GET /api/admin/analytics/daily - Read the rollup. Admin only.
pub async fn get_daily_stats(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<DailyStatsQuery>,
) -> ApiResult<Vec<DailyStats>> {
    auth.require_admin()?;
    let stats = state.repo.list_daily_stats(query.days.clamp(1, 365)).await?;
    success(stats)
}
