//! Registration, login, and profile endpoints.

use axum::{extract::State, Json};

use super::{load_user, success, ApiResult};
use crate::auth::{self, AuthUser};
use crate::errors::AppError;
use crate::models::{
    AuthResponse, LoginRequest, ReferralStatus, RegisterRequest, TransactionKind, User,
    UserProfile,
};
use crate::AppState;

/// POST /api/auth/register - Create an account and issue a token.
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> ApiResult<AuthResponse> {
    let email = request.email.trim().to_lowercase();
    if !email.contains('@') {
        return Err(AppError::InvalidArgument(
            "A valid email address is required".to_string(),
        ));
    }
    if request.password.len() < 8 {
        return Err(AppError::InvalidArgument(
            "Password must be at least 8 characters".to_string(),
        ));
    }
    if request.display_name.trim().is_empty() {
        return Err(AppError::InvalidArgument(
            "Display name is required".to_string(),
        ));
    }

    let password_hash = auth::hash_password(&request.password)?;
    let is_admin = state.config.admin_emails.contains(&email);
    let referral_code = new_referral_code();

    // Resolve the referrer before creating the account so referred_by can be
    // stored on the user row. Referral application itself is best-effort.
    let referrer = match &request.referral_code {
        Some(code) if !code.trim().is_empty() => {
            state.repo.get_user_by_referral_code(code.trim()).await?
        }
        _ => None,
    };

    let user = state
        .repo
        .create_user(
            &email,
            request.display_name.trim(),
            &password_hash,
            is_admin,
            &referral_code,
            referrer.as_ref().map(|u| u.id.as_str()),
        )
        .await?;

    if let Some(code) = &request.referral_code {
        let code = code.trim();
        if !code.is_empty() {
            if let Err(e) = apply_referral(&state, code, referrer.as_ref(), &user).await {
                tracing::warn!("Referral application failed for {}: {}", email, e);
            }
        }
    }

    issue_auth_response(&state, &user)
}

/// POST /api/auth/login - Verify credentials and issue a token.
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<AuthResponse> {
    let user = state
        .repo
        .get_user_by_email(request.email.trim())
        .await?
        .ok_or_else(|| AppError::Unauthenticated("Invalid email or password".to_string()))?;

    if !auth::verify_password(&request.password, &user.password_hash)? {
        return Err(AppError::Unauthenticated(
            "Invalid email or password".to_string(),
        ));
    }

    state.repo.record_login(&user.id).await?;
    // Reflect the bump in the returned profile-bearing token response.
    let user = load_user(&state, &user.id).await?;
    issue_auth_response(&state, &user)
}

/// GET /api/auth/me - Profile of the bearer-token holder.
pub async fn me(State(state): State<AppState>, auth: AuthUser) -> ApiResult<UserProfile> {
    let user = load_user(&state, &auth.user_id).await?;
    success(UserProfile::from(&user))
}

fn issue_auth_response(state: &AppState, user: &User) -> ApiResult<AuthResponse> {
    let token = auth::generate_token(
        &user.id,
        &user.email,
        user.is_admin,
        &state.config.jwt_secret,
        state.config.token_expiry_hours,
    )?;
    success(AuthResponse {
        token,
        expires_in: state.config.token_expiry_hours * 3600,
        user: UserProfile::from(user),
    })
}

/// Apply a referral code to a freshly registered account.
///
/// Any failure here is logged by the caller and never blocks registration.
async fn apply_referral(
    state: &AppState,
    code: &str,
    referrer: Option<&User>,
    referred: &User,
) -> Result<(), AppError> {
    let Some(referrer) = referrer else {
        return Err(AppError::NotFound(format!("Referral code {} unknown", code)));
    };
    if referrer.id == referred.id {
        return Err(AppError::InvalidArgument(
            "Self-referral is not allowed".to_string(),
        ));
    }

    let reward = state.config.referral_reward_tokens;
    state
        .repo
        .insert_referral(code, &referrer.id, &referred.id, reward, ReferralStatus::Rewarded)
        .await?;
    // Balance credit and ledger entry are issued as separate statements.
    state.repo.adjust_token_balance(&referrer.id, reward).await?;
    state
        .repo
        .insert_transaction(
            &referrer.id,
            TransactionKind::ReferralReward,
            reward,
            Some(referred.id.as_str()),
        )
        .await?;
    Ok(())
}

/// Short human-pasteable referral code.
fn new_referral_code() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_uppercase()
}
