//! Feature listing, token-debiting votes, and admin cost management.

use axum::{
    extract::{Path, State},
    Json,
};

use super::{load_user, success, ApiResult};
use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::{Feature, SetFeatureCostRequest, TransactionKind};
use crate::AppState;

/// GET /api/features - List votable features. Public.
pub async fn list_features(State(state): State<AppState>) -> ApiResult<Vec<Feature>> {
    let features = state.repo.list_features().await?;
    success(features)
}

/// POST /api/features/{key}/vote - Cast a vote, debiting its token cost.
///
/// Balance check and debit are separate statements; concurrent votes can
/// race past the check.
pub async fn vote_feature(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(key): Path<String>,
) -> ApiResult<Feature> {
    let feature = state
        .repo
        .get_feature(&key)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Feature {} not found", key)))?;

    if state.repo.has_voted(&key, &auth.user_id).await? {
        return Err(AppError::Conflict(
            "You have already voted for this feature".to_string(),
        ));
    }

    let user = load_user(&state, &auth.user_id).await?;
    if user.token_balance < feature.cost_tokens {
        return Err(AppError::FailedPrecondition(format!(
            "Voting costs {} tokens; balance is {}",
            feature.cost_tokens, user.token_balance
        )));
    }

    state.repo.record_vote(&key, &user.id).await?;
    state
        .repo
        .adjust_token_balance(&user.id, -feature.cost_tokens)
        .await?;
    state
        .repo
        .insert_transaction(
            &user.id,
            TransactionKind::FeatureVote,
            -feature.cost_tokens,
            Some(key.as_str()),
        )
        .await?;

    let feature = state
        .repo
        .get_feature(&key)
        .await?
        .ok_or_else(|| AppError::Internal("Feature vanished after vote".to_string()))?;
    success(feature)
}

/// PUT /api/admin/features/{key}/cost - Set a feature's vote cost, creating
/// the feature when new. Admin only.
pub async fn admin_set_feature_cost(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(key): Path<String>,
    Json(request): Json<SetFeatureCostRequest>,
) -> ApiResult<Feature> {
    auth.require_admin()?;
    if request.cost_tokens < 0 {
        return Err(AppError::InvalidArgument(
            "costTokens must not be negative".to_string(),
        ));
    }

    let feature = state
        .repo
        .set_feature_cost(
            &key,
            request.cost_tokens,
            request.title.as_deref(),
            request.description.as_deref(),
        )
        .await?;
    success(feature)
}
