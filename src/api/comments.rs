//! Comment, reply, resolve, and soft-delete endpoints.
//!
//! Comments live embedded in the project document; every mutation loads the
//! project, edits it in memory, and writes it back whole.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;

use super::projects::load_project_for_viewer;
use super::{success, ApiResult};
use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::{
    ActivityKind, Comment, CreateCommentRequest, CreateReplyRequest, Project, ProjectRole, Reply,
};
use crate::roles;
use crate::AppState;

/// POST /api/projects/{id}/versions/{versionId}/comments - Pin a comment.
pub async fn create_comment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((project_id, version_id)): Path<(String, String)>,
    Json(request): Json<CreateCommentRequest>,
) -> ApiResult<Comment> {
    if request.body.trim().is_empty() {
        return Err(AppError::InvalidArgument(
            "Comment body is required".to_string(),
        ));
    }

    let (mut project, role) = load_project_for_viewer(&state, &project_id, &auth, None).await?;
    let author = super::load_user(&state, &auth.user_id).await?;
    let audience = roles::audience_for_author(role, request.audience);
    let now = Utc::now().to_rfc3339();

    let comment = Comment {
        id: uuid::Uuid::new_v4().to_string(),
        author_id: author.id.clone(),
        author_name: author.display_name.clone(),
        body: request.body.trim().to_string(),
        pin: request.pin,
        audience: Some(audience),
        resolved: false,
        deleted: false,
        replies: Vec::new(),
        created_at: now.clone(),
        updated_at: now,
    };

    let version = project
        .versions
        .iter_mut()
        .find(|v| v.id == version_id)
        .ok_or_else(|| AppError::NotFound(format!("Version {} not found", version_id)))?;
    version.comments.push(comment.clone());
    state.repo.update_project(&project).await?;

    if let Err(e) = state
        .repo
        .record_activity(&auth.user_id, ActivityKind::Comment)
        .await
    {
        tracing::warn!("Failed to record comment activity: {}", e);
    }
    notify_owner(
        &state,
        &project,
        &auth.user_id,
        "comment",
        &format!("{} commented on {}", author.display_name, project.name),
    )
    .await;

    success(comment)
}

/// POST .../comments/{commentId}/replies - Reply to a comment.
pub async fn create_reply(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((project_id, version_id, comment_id)): Path<(String, String, String)>,
    Json(request): Json<CreateReplyRequest>,
) -> ApiResult<Reply> {
    if request.body.trim().is_empty() {
        return Err(AppError::InvalidArgument(
            "Reply body is required".to_string(),
        ));
    }

    let (mut project, role) = load_project_for_viewer(&state, &project_id, &auth, None).await?;
    let author = super::load_user(&state, &auth.user_id).await?;
    let project_name = project.name.clone();
    let comment = find_comment(&mut project, &version_id, &comment_id)?;

    // Replying requires being able to see the thread.
    if comment.deleted || !roles::can_see_comment(comment.audience, role) {
        return Err(AppError::NotFound(format!(
            "Comment {} not found",
            comment_id
        )));
    }

    let reply = Reply {
        id: uuid::Uuid::new_v4().to_string(),
        author_id: author.id.clone(),
        author_name: author.display_name.clone(),
        body: request.body.trim().to_string(),
        deleted: false,
        created_at: Utc::now().to_rfc3339(),
    };
    comment.replies.push(reply.clone());
    comment.updated_at = reply.created_at.clone();
    state.repo.update_project(&project).await?;

    notify_owner(
        &state,
        &project,
        &auth.user_id,
        "reply",
        &format!("{} replied on {}", author.display_name, project_name),
    )
    .await;

    success(reply)
}

/// POST .../comments/{commentId}/resolve - Mark a comment resolved.
pub async fn resolve_comment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((project_id, version_id, comment_id)): Path<(String, String, String)>,
) -> ApiResult<Comment> {
    let (mut project, role) = load_project_for_viewer(&state, &project_id, &auth, None).await?;
    let user_id = auth.user_id.clone();
    let comment = find_comment(&mut project, &version_id, &comment_id)?;

    if role != ProjectRole::Owner && comment.author_id != user_id {
        return Err(AppError::PermissionDenied(
            "Only the owner or the author may resolve a comment".to_string(),
        ));
    }

    comment.resolved = true;
    comment.updated_at = Utc::now().to_rfc3339();
    let resolved = comment.clone();
    state.repo.update_project(&project).await?;
    success(resolved)
}

/// DELETE .../comments/{commentId} - Soft-delete a comment.
///
/// The record stays embedded; only the flag flips.
pub async fn delete_comment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((project_id, version_id, comment_id)): Path<(String, String, String)>,
) -> ApiResult<()> {
    let (mut project, role) = load_project_for_viewer(&state, &project_id, &auth, None).await?;
    let user_id = auth.user_id.clone();
    let comment = find_comment(&mut project, &version_id, &comment_id)?;

    if role != ProjectRole::Owner && comment.author_id != user_id {
        return Err(AppError::PermissionDenied(
            "Only the owner or the author may delete a comment".to_string(),
        ));
    }

    comment.deleted = true;
    comment.updated_at = Utc::now().to_rfc3339();
    state.repo.update_project(&project).await?;
    success(())
}

fn find_comment<'a>(
    project: &'a mut Project,
    version_id: &str,
    comment_id: &str,
) -> Result<&'a mut Comment, AppError> {
    let version = project
        .versions
        .iter_mut()
        .find(|v| v.id == version_id)
        .ok_or_else(|| AppError::NotFound(format!("Version {} not found", version_id)))?;
    version
        .comments
        .iter_mut()
        .find(|c| c.id == comment_id)
        .ok_or_else(|| AppError::NotFound(format!("Comment {} not found", comment_id)))
}

/// Queue a notification for the project owner unless they triggered it.
async fn notify_owner(
    state: &AppState,
    project: &Project,
    actor_id: &str,
    kind: &str,
    message: &str,
) {
    if project.owner_id == actor_id {
        return;
    }
    if let Err(e) = state
        .repo
        .insert_notification(&project.owner_id, kind, message, Some(project.id.as_str()))
        .await
    {
        tracing::warn!("Failed to queue {} notification: {}", kind, e);
    }
}
