//! Referral summary endpoint.

use axum::extract::State;

use super::{load_user, success, ApiResult};
use crate::auth::AuthUser;
use crate::models::ReferralSummary;
use crate::AppState;

/// GET /api/referrals/me - Own code, balance, and referral history.
pub async fn referrals_me(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<ReferralSummary> {
    let user = load_user(&state, &auth.user_id).await?;
    let referrals = state.repo.list_referrals_for_referrer(&user.id).await?;
    success(ReferralSummary {
        referral_code: user.referral_code,
        token_balance: user.token_balance,
        referrals,
    })
}
