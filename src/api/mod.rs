//! REST API module.
//!
//! Contains all API routes and handlers following the frontend contract.

mod analytics;
mod auth;
mod billing;
mod comments;
mod engagement;
mod features;
mod feedback;
mod files;
mod notifications;
mod projects;
mod referrals;
mod share;

pub use analytics::*;
pub use auth::*;
pub use billing::*;
pub use comments::*;
pub use engagement::*;
pub use features::*;
pub use feedback::*;
pub use files::*;
pub use notifications::*;
pub use projects::*;
pub use referrals::*;
pub use share::*;

use axum::Json;
use serde::Serialize;

use crate::errors::AppError;
use crate::models::User;
use crate::AppState;

/// Success response envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
}

/// Handler result carrying the success envelope; errors render through
/// `AppError::into_response`.
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, AppError>;

/// Wrap data in the success envelope.
pub fn success<T: Serialize>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse {
        success: true,
        data,
    }))
}

/// Load the authenticated caller's user row.
///
/// A valid token for a deleted account degrades to `unauthenticated`.
pub(crate) async fn load_user(state: &AppState, user_id: &str) -> Result<User, AppError> {
    state
        .repo
        .get_user(user_id)
        .await?
        .ok_or_else(|| AppError::Unauthenticated("Account no longer exists".to_string()))
}
