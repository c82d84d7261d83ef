//! Project CRUD, collaborator invites, and version uploads.

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use chrono::{Duration, Utc};
use serde_json::json;

use super::{load_user, success, ApiResult};
use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::{
    ActivityKind, Collaborator, CreateProjectRequest, Document, InviteCollaboratorRequest,
    Project, ProjectRole, ProjectVersion, ProjectView, ProjectViewQuery, UploadVersionQuery,
};
use crate::roles;
use crate::AppState;

/// Hours until the invite followup email goes out.
const INVITE_FOLLOWUP_HOURS: i64 = 72;

/// POST /api/projects - Create a project.
pub async fn create_project(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<CreateProjectRequest>,
) -> ApiResult<Project> {
    if request.name.trim().is_empty() {
        return Err(AppError::InvalidArgument("Name is required".to_string()));
    }

    let user = load_user(&state, &auth.user_id).await?;
    let limits = state.repo.get_plan_limits(&user.plan).await?;
    if limits.max_projects >= 0 {
        let owned = state.repo.count_projects_owned(&user.id).await?;
        if owned >= limits.max_projects {
            return Err(AppError::FailedPrecondition(format!(
                "The {} plan allows at most {} projects",
                user.plan.as_str(),
                limits.max_projects
            )));
        }
    }

    let project = state
        .repo
        .create_project(&user.id, request.name.trim(), request.description.as_deref())
        .await?;
    state.repo.increment_project_count(&user.id).await?;
    success(project)
}

/// GET /api/projects - List projects the caller participates in.
pub async fn list_projects(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Vec<ProjectView>> {
    let projects = state
        .repo
        .list_projects_for_user(&auth.user_id, &auth.email)
        .await?;

    let views = projects
        .into_iter()
        .filter_map(|p| {
            roles::derive_role(&p, &auth.user_id, &auth.email).map(|role| ProjectView {
                project: roles::project_for_viewer(p, role),
                role,
            })
        })
        .collect();
    success(views)
}

/// GET /api/projects/{id} - View a project with role-filtered comments.
pub async fn get_project(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    Query(query): Query<ProjectViewQuery>,
) -> ApiResult<ProjectView> {
    let (project, role) = load_project_for_viewer(&state, &id, &auth, query.view_as).await?;
    success(ProjectView {
        project: roles::project_for_viewer(project, role),
        role,
    })
}

/// DELETE /api/projects/{id} - Delete a project. Owner only.
pub async fn delete_project(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<()> {
    let project = require_project(&state, &id).await?;
    if project.owner_id != auth.user_id {
        return Err(AppError::PermissionDenied(
            "Only the owner may delete a project".to_string(),
        ));
    }
    state.repo.delete_project(&id).await?;
    success(())
}

/// POST /api/projects/{id}/collaborators - Invite a collaborator. Owner only.
pub async fn invite_collaborator(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    Json(request): Json<InviteCollaboratorRequest>,
) -> ApiResult<Project> {
    let email = request.email.trim().to_lowercase();
    if !email.contains('@') {
        return Err(AppError::InvalidArgument(
            "A valid email address is required".to_string(),
        ));
    }

    let mut project = require_project(&state, &id).await?;
    if project.owner_id != auth.user_id {
        return Err(AppError::PermissionDenied(
            "Only the owner may invite collaborators".to_string(),
        ));
    }
    if email == auth.email.to_lowercase() {
        return Err(AppError::InvalidArgument(
            "The owner is already a collaborator".to_string(),
        ));
    }
    if project
        .collaborators
        .iter()
        .any(|c| c.email.eq_ignore_ascii_case(&email))
    {
        return Err(AppError::Conflict(format!("{} is already invited", email)));
    }

    let owner = load_user(&state, &auth.user_id).await?;
    let limits = state.repo.get_plan_limits(&owner.plan).await?;
    // Rejected invites are never persisted.
    if !roles::invite_allowed(&limits, &project.collaborators, request.role) {
        return Err(AppError::FailedPrecondition(format!(
            "The {} plan allows at most {} {} collaborators per project",
            owner.plan.as_str(),
            match request.role {
                crate::models::CollaboratorRole::Guest => limits.max_guest_collaborators,
                crate::models::CollaboratorRole::Professional => limits.max_pro_collaborators,
            },
            request.role.as_str()
        )));
    }

    let invitee = state.repo.get_user_by_email(&email).await?;
    project.collaborators.push(Collaborator {
        email: email.clone(),
        role: request.role,
        invited_at: Utc::now().to_rfc3339(),
        user_id: invitee.as_ref().map(|u| u.id.clone()),
    });
    state.repo.update_project(&project).await?;
    state
        .repo
        .increment_share_count(&owner.id, request.role)
        .await?;

    let payload = json!({
        "projectName": project.name,
        "ownerName": owner.display_name,
        "role": request.role.as_str(),
    });
    state
        .mailer
        .send_best_effort(&email, "You have been invited to a design review", "collaborator_invite", &payload)
        .await;

    // Followup nudge, cancelled if the invitee opens the project first.
    let due_at = (Utc::now() + Duration::hours(INVITE_FOLLOWUP_HOURS)).to_rfc3339();
    let reference = invite_reference(&project.id, &email);
    if let Err(e) = state
        .repo
        .schedule_email(&email, "invite_followup", &payload, Some(reference.as_str()), &due_at)
        .await
    {
        tracing::warn!("Failed to schedule invite followup for {}: {}", email, e);
    }

    if let Some(invitee) = invitee {
        if let Err(e) = state
            .repo
            .insert_notification(
                &invitee.id,
                "invite",
                &format!("{} invited you to {}", owner.display_name, project.name),
                Some(project.id.as_str()),
            )
            .await
        {
            tracing::warn!("Failed to queue invite notification: {}", e);
        }
    }

    success(project)
}

/// POST /api/projects/{id}/versions - Upload a new plan version.
///
/// The raw request body is the document; category and filename travel as
/// query parameters. Guests cannot upload.
pub async fn upload_version(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    Query(query): Query<UploadVersionQuery>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> ApiResult<Project> {
    if query.category.trim().is_empty() || query.filename.trim().is_empty() {
        return Err(AppError::InvalidArgument(
            "category and filename are required".to_string(),
        ));
    }
    if body.is_empty() {
        return Err(AppError::InvalidArgument(
            "Request body must contain the document".to_string(),
        ));
    }

    let mut project = require_project(&state, &id).await?;
    let role = roles::derive_role(&project, &auth.user_id, &auth.email)
        .ok_or_else(|| AppError::PermissionDenied("No access to this project".to_string()))?;
    if role == ProjectRole::Guest {
        return Err(AppError::PermissionDenied(
            "Guests cannot upload plan versions".to_string(),
        ));
    }

    let content_type = headers
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/pdf")
        .to_string();

    let doc_id = uuid::Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339();
    let relative_path = format!("{}/{}", project.id, doc_id);
    let full_path = state.config.storage_path.join(&relative_path);
    if let Some(parent) = full_path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to create storage dir: {}", e)))?;
    }
    tokio::fs::write(&full_path, &body)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to store document: {}", e)))?;

    let document = Document {
        id: doc_id.clone(),
        project_id: project.id.clone(),
        filename: query.filename.trim().to_string(),
        content_type,
        size_bytes: body.len() as i64,
        storage_path: relative_path,
        uploaded_by: auth.user_id.clone(),
        created_at: now.clone(),
    };
    state.repo.insert_document(&document).await?;

    // Version numbers are scoped per category label.
    let category = query.category.trim().to_string();
    let next_number = project
        .versions
        .iter()
        .filter(|v| v.category == category)
        .map(|v| v.category_version_number)
        .max()
        .unwrap_or(0)
        + 1;

    for version in &mut project.versions {
        version.is_current = false;
    }
    project.versions.push(ProjectVersion {
        id: uuid::Uuid::new_v4().to_string(),
        category,
        category_version_number: next_number,
        document_id: Some(doc_id),
        is_current: true,
        uploaded_by: auth.user_id.clone(),
        uploaded_at: now,
        comments: Vec::new(),
    });
    state.repo.update_project(&project).await?;

    if let Err(e) = state.repo.record_activity(&auth.user_id, ActivityKind::Upload).await {
        tracing::warn!("Failed to record upload activity: {}", e);
    }

    success(roles::project_for_viewer(project, role))
}

/// PUT /api/projects/{id}/versions/{versionId}/current - Move the current
/// flag. Owner only.
pub async fn set_current_version(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((id, version_id)): Path<(String, String)>,
) -> ApiResult<Project> {
    let mut project = require_project(&state, &id).await?;
    if project.owner_id != auth.user_id {
        return Err(AppError::PermissionDenied(
            "Only the owner may change the current version".to_string(),
        ));
    }
    if !project.versions.iter().any(|v| v.id == version_id) {
        return Err(AppError::NotFound(format!(
            "Version {} not found",
            version_id
        )));
    }

    for version in &mut project.versions {
        version.is_current = version.id == version_id;
    }
    state.repo.update_project(&project).await?;
    success(project)
}

/// Load a project or 404.
pub(super) async fn require_project(state: &AppState, id: &str) -> Result<Project, AppError> {
    state
        .repo
        .get_project(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Project {} not found", id)))
}

/// Load a project and derive the caller's role, honoring the admin-only
/// `view_as` override.
///
/// First access by an invited user stamps their id onto the collaborator
/// entry and cancels any pending invite followups.
pub(super) async fn load_project_for_viewer(
    state: &AppState,
    id: &str,
    auth: &AuthUser,
    view_as: Option<ProjectRole>,
) -> Result<(Project, ProjectRole), AppError> {
    let mut project = require_project(state, id).await?;

    let mut accepted = false;
    for collaborator in &mut project.collaborators {
        if collaborator.email.eq_ignore_ascii_case(&auth.email) && collaborator.user_id.is_none() {
            collaborator.user_id = Some(auth.user_id.clone());
            accepted = true;
        }
    }
    if accepted {
        if let Err(e) = state.repo.update_project(&project).await {
            tracing::warn!("Failed to stamp collaborator acceptance: {}", e);
        }
        let reference = invite_reference(&project.id, &auth.email.to_lowercase());
        if let Err(e) = state.repo.cancel_scheduled_emails(&reference).await {
            tracing::warn!("Failed to cancel invite followups: {}", e);
        }
    }

    let derived = roles::derive_role(&project, &auth.user_id, &auth.email);
    let role = roles::apply_view_as(derived, view_as, auth.is_admin)
        .ok_or_else(|| AppError::PermissionDenied("No access to this project".to_string()))?;
    Ok((project, role))
}

fn invite_reference(project_id: &str, email: &str) -> String {
    format!("{}:{}", project_id, email)
}
