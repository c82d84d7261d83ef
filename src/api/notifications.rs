//! In-app notification endpoints.

use axum::extract::{Path, State};

use super::{success, ApiResult};
use crate::auth::AuthUser;
use crate::models::Notification;
use crate::AppState;

/// GET /api/notifications - List the caller's notifications, newest first.
pub async fn list_notifications(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Vec<Notification>> {
    let notifications = state.repo.list_notifications(&auth.user_id).await?;
    success(notifications)
}

/// POST /api/notifications/{id}/read - Mark one notification as read.
pub async fn mark_notification_read(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<()> {
    state.repo.mark_notification_read(&id, &auth.user_id).await?;
    success(())
}
