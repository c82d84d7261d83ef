//! Feedback campaign endpoints: active-campaign selection, answers, and
//! admin campaign creation.

use axum::{extract::State, Json};
use chrono::Utc;

use super::{load_user, success, ApiResult};
use crate::auth::AuthUser;
use crate::campaigns;
use crate::errors::AppError;
use crate::models::{
    ActiveCampaign, ActivityKind, CreateCampaignRequest, FeedbackAnswerRequest, FeedbackCampaign,
};
use crate::AppState;

/// GET /api/feedback/active - Select at most one campaign to show.
///
/// Returning a campaign records the impression: attribution upsert plus
/// counter bump, issued as independent statements.
pub async fn feedback_active(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Option<ActiveCampaign>> {
    let user = load_user(&state, &auth.user_id).await?;
    let campaigns_list = state.repo.list_campaigns().await?;
    let attributions = state.repo.list_attributions_for_user(&user.id).await?;

    let selected = campaigns::select_campaign(&campaigns_list, &attributions, &user, Utc::now());
    match selected {
        Some(campaign) => {
            state.repo.record_impression(&campaign.id, &user.id).await?;
            success(Some(ActiveCampaign::from(campaign)))
        }
        None => success(None),
    }
}

/// POST /api/feedback/answer - Store an answer to a shown campaign.
pub async fn feedback_answer(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<FeedbackAnswerRequest>,
) -> ApiResult<()> {
    if request.answer.trim().is_empty() {
        return Err(AppError::InvalidArgument("Answer is required".to_string()));
    }
    if state.repo.get_campaign(&request.campaign_id).await?.is_none() {
        return Err(AppError::NotFound(format!(
            "Campaign {} not found",
            request.campaign_id
        )));
    }

    state
        .repo
        .record_answer(&request.campaign_id, &auth.user_id, request.answer.trim())
        .await?;
    if let Err(e) = state
        .repo
        .record_activity(&auth.user_id, ActivityKind::SurveyAnswer)
        .await
    {
        tracing::warn!("Failed to record survey activity: {}", e);
    }
    success(())
}

/// POST /api/admin/feedback/campaigns - Create a campaign. Admin only.
pub async fn admin_create_campaign(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<CreateCampaignRequest>,
) -> ApiResult<FeedbackCampaign> {
    auth.require_admin()?;
    if request.name.trim().is_empty() || request.prompt.trim().is_empty() {
        return Err(AppError::InvalidArgument(
            "Name and prompt are required".to_string(),
        ));
    }
    if request.frequency_cap_days < 0 {
        return Err(AppError::InvalidArgument(
            "frequencyCapDays must not be negative".to_string(),
        ));
    }

    let campaign = state.repo.create_campaign(&request, &auth.user_id).await?;
    success(campaign)
}
