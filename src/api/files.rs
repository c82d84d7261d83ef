//! Document streaming for authenticated project participants.

use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
};

use super::projects::require_project;
use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::Document;
use crate::roles;
use crate::AppState;

/// GET /api/files/{documentId} - Stream a stored plan document.
pub async fn get_file(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(document_id): Path<String>,
) -> Result<Response, AppError> {
    let document = state
        .repo
        .get_document(&document_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Document {} not found", document_id)))?;

    let project = require_project(&state, &document.project_id).await?;
    if roles::derive_role(&project, &auth.user_id, &auth.email).is_none() && !auth.is_admin {
        return Err(AppError::PermissionDenied(
            "No access to this document".to_string(),
        ));
    }

    stream_document(&state, &document).await
}

/// Read document bytes off disk and wrap them in a typed response.
pub(super) async fn stream_document(
    state: &AppState,
    document: &Document,
) -> Result<Response, AppError> {
    let path = state.config.storage_path.join(&document.storage_path);
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to read stored document: {}", e)))?;

    Ok((
        [
            (header::CONTENT_TYPE, document.content_type.clone()),
            (
                header::CONTENT_DISPOSITION,
                format!("inline; filename=\"{}\"", document.filename),
            ),
        ],
        bytes,
    )
        .into_response())
}
