//! Referral records. Rewards are paid in feature-vote tokens.

use serde::{Deserialize, Serialize};

/// A referral relationship created when a new account registers with an
/// existing user's code.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Referral {
    pub id: String,
    /// The referrer's code as entered at registration.
    pub code: String,
    pub referrer_id: String,
    pub referred_id: String,
    pub status: ReferralStatus,
    pub reward_tokens: i64,
    pub created_at: String,
}

/// Lifecycle of a referral.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReferralStatus {
    Applied,
    Rewarded,
}

impl ReferralStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferralStatus::Applied => "applied",
            ReferralStatus::Rewarded => "rewarded",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "applied" => Some(ReferralStatus::Applied),
            "rewarded" => Some(ReferralStatus::Rewarded),
            _ => None,
        }
    }
}

/// Response body for `GET /api/referrals/me`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferralSummary {
    pub referral_code: String,
    pub token_balance: i64,
    pub referrals: Vec<Referral>,
}
