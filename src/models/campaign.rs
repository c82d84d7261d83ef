//! Feedback campaign, segment rule, and attribution models.

use serde::{Deserialize, Serialize};

/// An admin-authored in-app feedback campaign.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackCampaign {
    pub id: String,
    pub name: String,
    /// Question shown to the user.
    pub prompt: String,
    pub segment: SegmentRule,
    /// Minimum days between two impressions for the same user.
    pub frequency_cap_days: i64,
    pub active_from: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_until: Option<String>,
    /// Explicit per-user override: these users always match (a-rule).
    #[serde(default)]
    pub targeted_user_ids: Vec<String>,
    /// Debug override: show to everyone regardless of segment (b-rule).
    #[serde(default)]
    pub force_show: bool,
    pub impressions: i64,
    pub answer_count: i64,
    pub created_by: String,
    pub created_at: String,
}

/// Targeting rule of a campaign.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SegmentRule {
    /// Matches every user.
    All,
    /// Hardcoded composite: new-ish, free-plan, returned-but-slow, low
    /// engagement.
    GivingUpAlmost,
    /// All listed conditions must hold.
    Conditions { conditions: Vec<SegmentCondition> },
}

/// A single field/operator/value comparison.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SegmentCondition {
    pub field: SegmentField,
    pub op: SegmentOp,
    /// Number for numeric fields, string for `plan`.
    pub value: serde_json::Value,
}

/// User fields a segment condition may inspect.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SegmentField {
    Plan,
    EngagementScore,
    LoginCount,
    ProjectCount,
    AccountAgeDays,
}

/// Comparison operator of a segment condition.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SegmentOp {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
}

/// Record linking a shown campaign to a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignAttribution {
    pub id: String,
    pub campaign_id: String,
    pub user_id: String,
    pub shown_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answered_at: Option<String>,
}

/// A stored answer to a campaign prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackAnswer {
    pub id: String,
    pub campaign_id: String,
    pub user_id: String,
    pub answer: String,
    pub created_at: String,
}

/// Campaign fields exposed to the asking user.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveCampaign {
    pub id: String,
    pub name: String,
    pub prompt: String,
}

impl From<&FeedbackCampaign> for ActiveCampaign {
    fn from(c: &FeedbackCampaign) -> Self {
        Self {
            id: c.id.clone(),
            name: c.name.clone(),
            prompt: c.prompt.clone(),
        }
    }
}

/// Request body for `POST /api/admin/feedback/campaigns`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCampaignRequest {
    pub name: String,
    pub prompt: String,
    #[serde(default = "default_segment")]
    pub segment: SegmentRule,
    #[serde(default = "default_frequency_cap")]
    pub frequency_cap_days: i64,
    /// Defaults to now.
    #[serde(default)]
    pub active_from: Option<String>,
    #[serde(default)]
    pub active_until: Option<String>,
    #[serde(default)]
    pub targeted_user_ids: Vec<String>,
    #[serde(default)]
    pub force_show: bool,
}

fn default_segment() -> SegmentRule {
    SegmentRule::All
}

fn default_frequency_cap() -> i64 {
    14
}

/// Request body for `POST /api/feedback/answer`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackAnswerRequest {
    pub campaign_id: String,
    pub answer: String,
}
