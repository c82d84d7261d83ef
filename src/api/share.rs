//! Tokenized share links and public shared-project access.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;

use super::projects::require_project;
use super::{success, ApiResult};
use crate::auth::{constant_time_compare, AuthUser};
use crate::errors::AppError;
use crate::models::{CreateShareLinkRequest, Project, ProjectView, ShareSettings};
use crate::roles;
use crate::AppState;

/// POST /api/projects/{id}/share - Create or replace the share link. Owner
/// only.
pub async fn create_share_link(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    Json(request): Json<CreateShareLinkRequest>,
) -> ApiResult<ShareSettings> {
    let mut project = require_project(&state, &id).await?;
    if project.owner_id != auth.user_id {
        return Err(AppError::PermissionDenied(
            "Only the owner may share a project".to_string(),
        ));
    }

    let share = ShareSettings {
        token: uuid::Uuid::new_v4().to_string(),
        role: request.role,
        enabled: true,
        created_at: Utc::now().to_rfc3339(),
    };
    project.share = Some(share.clone());
    state.repo.update_project(&project).await?;
    state
        .repo
        .increment_share_count(&auth.user_id, request.role)
        .await?;
    success(share)
}

/// DELETE /api/projects/{id}/share - Disable the share link. Owner only.
pub async fn disable_share_link(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<()> {
    let mut project = require_project(&state, &id).await?;
    if project.owner_id != auth.user_id {
        return Err(AppError::PermissionDenied(
            "Only the owner may manage sharing".to_string(),
        ));
    }
    if let Some(share) = &mut project.share {
        share.enabled = false;
    }
    state.repo.update_project(&project).await?;
    success(())
}

/// GET /api/shared/{token} - Resolve a share link. No auth.
pub async fn get_shared_project(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> ApiResult<ProjectView> {
    let (project, share) = resolve_share_token(&state, &token).await?;
    let role = share.role.to_project_role();
    success(ProjectView {
        project: roles::project_for_viewer(project, role),
        role,
    })
}

/// GET /api/shared/{token}/files/{documentId} - Stream a document to a link
/// holder. No auth.
pub async fn get_shared_file(
    State(state): State<AppState>,
    Path((token, document_id)): Path<(String, String)>,
) -> Result<axum::response::Response, AppError> {
    let (project, _) = resolve_share_token(&state, &token).await?;
    let document = state
        .repo
        .get_document(&document_id)
        .await?
        .filter(|d| d.project_id == project.id)
        .ok_or_else(|| AppError::NotFound(format!("Document {} not found", document_id)))?;
    super::files::stream_document(&state, &document).await
}

/// Look up a project by token, verifying the stored token in constant time.
/// Disabled or unknown tokens are indistinguishable from missing projects.
async fn resolve_share_token(
    state: &AppState,
    token: &str,
) -> Result<(Project, ShareSettings), AppError> {
    let not_found = || AppError::NotFound("Share link not found".to_string());

    let project = state
        .repo
        .get_project_by_share_token(token)
        .await?
        .ok_or_else(not_found)?;
    let share = project.share.clone().ok_or_else(not_found)?;
    if !share.enabled || !constant_time_compare(&share.token, token) {
        return Err(not_found());
    }
    Ok((project, share))
}
