//! Comment and reply models.

use serde::{Deserialize, Serialize};

/// Visibility channel of a comment.
///
/// `guest-owner` and `pro-owner` pair one collaborator type with the owner;
/// `public` is visible to every participant. Legacy comments predate the tag
/// and carry no audience at all.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Audience {
    GuestOwner,
    ProOwner,
    Public,
}

/// Location of a comment pin on the plan document.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Pin {
    /// 1-based page index for multi-page documents.
    pub page: i64,
    /// Normalized coordinates in [0, 1] relative to the page.
    pub x: f64,
    pub y: f64,
}

/// A comment pinned to a project version.
///
/// Comments are never physically removed; `deleted` is a soft flag and the
/// record stays embedded in its version.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub author_id: String,
    pub author_name: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pin: Option<Pin>,
    /// Absent on legacy data; treated as public when filtering.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audience: Option<Audience>,
    #[serde(default)]
    pub resolved: bool,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub replies: Vec<Reply>,
    pub created_at: String,
    pub updated_at: String,
}

/// A threaded reply. Inherits the parent comment's audience.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    pub id: String,
    pub author_id: String,
    pub author_name: String,
    pub body: String,
    #[serde(default)]
    pub deleted: bool,
    pub created_at: String,
}

/// Request body for creating a comment.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommentRequest {
    pub body: String,
    #[serde(default)]
    pub pin: Option<Pin>,
    /// Honored for owners only; guests and professionals always post into
    /// their own channel.
    #[serde(default)]
    pub audience: Option<Audience>,
}

/// Request body for replying to a comment.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReplyRequest {
    pub body: String,
}
