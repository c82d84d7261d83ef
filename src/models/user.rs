//! User account model and auth request/response shapes.

use serde::{Deserialize, Serialize};

use super::Plan;

/// A registered user. Internal representation; never serialized directly
/// because it carries the password hash — see [`UserProfile`].
#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub password_hash: String,
    pub plan: Plan,
    pub is_admin: bool,
    pub stripe_customer_id: Option<String>,
    /// Code this user hands out to referred friends.
    pub referral_code: String,
    /// Id of the user whose code was applied at registration, if any.
    pub referred_by: Option<String>,
    pub token_balance: i64,
    pub login_count: i64,
    pub project_count: i64,
    pub share_count_guest: i64,
    pub share_count_pro: i64,
    /// Persisted result of the last engagement recompute, 0-100.
    pub engagement_score: i64,
    pub created_at: String,
    pub last_login_at: Option<String>,
}

/// Public view of a user, safe to return from the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub plan: Plan,
    pub is_admin: bool,
    pub referral_code: String,
    pub token_balance: i64,
    pub engagement_score: i64,
    pub created_at: String,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            display_name: user.display_name.clone(),
            plan: user.plan.clone(),
            is_admin: user.is_admin,
            referral_code: user.referral_code.clone(),
            token_balance: user.token_balance,
            engagement_score: user.engagement_score,
            created_at: user.created_at.clone(),
        }
    }
}

/// Request body for registering a new account.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub display_name: String,
    /// Referral code of an existing user; applied best-effort.
    #[serde(default)]
    pub referral_code: Option<String>,
}

/// Request body for logging in.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Successful auth response carrying the bearer token.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub token: String,
    /// Token lifetime in seconds.
    pub expires_in: i64,
    pub user: UserProfile,
}
