//! Feature voting models. Votes are paid for with referral tokens.

use serde::{Deserialize, Serialize};

/// A feature on the roadmap users can vote for.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feature {
    pub key: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Tokens debited from the voter's balance.
    pub cost_tokens: i64,
    pub vote_count: i64,
    pub created_at: String,
}

/// One cast vote.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureVote {
    pub id: String,
    pub feature_key: String,
    pub user_id: String,
    pub created_at: String,
}

/// Request body for `PUT /api/admin/features/{key}/cost`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetFeatureCostRequest {
    pub cost_tokens: i64,
    /// Required when the feature does not exist yet.
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}
