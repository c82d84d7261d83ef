//! In-app notification queue entries.

use serde::{Deserialize, Serialize};

/// One queued notification for a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    /// e.g. `comment`, `reply`, `invite`.
    pub kind: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    pub read: bool,
    pub created_at: String,
}

/// An email queued for later delivery (invite followups).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledEmail {
    pub id: String,
    pub recipient: String,
    pub template: String,
    pub payload: serde_json::Value,
    /// Correlates followups with the invite that produced them so
    /// acceptance can cancel them.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    pub due_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<String>,
    pub created_at: String,
}
