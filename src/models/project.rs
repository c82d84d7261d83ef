//! Project, version, and sharing models.
//!
//! Versions and their comments are embedded in the project document, mirroring
//! the document-read patterns of the original data model. Mutations load the
//! project, edit it in memory, and write it back whole.

use serde::{Deserialize, Serialize};

use super::Comment;

/// Viewer's relationship to a project, recomputed on every request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProjectRole {
    Owner,
    Guest,
    Professional,
}

/// Role granted to an invited collaborator or a share link. Never `owner`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CollaboratorRole {
    Guest,
    Professional,
}

impl CollaboratorRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollaboratorRole::Guest => "guest",
            CollaboratorRole::Professional => "professional",
        }
    }

    pub fn to_project_role(self) -> ProjectRole {
        match self {
            CollaboratorRole::Guest => ProjectRole::Guest,
            CollaboratorRole::Professional => ProjectRole::Professional,
        }
    }
}

/// An invited collaborator. Matched by email; `user_id` is stamped once the
/// invitee opens the project with a registered account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collaborator {
    pub email: String,
    pub role: CollaboratorRole,
    pub invited_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

/// Tokenized share link settings. At most one active link per project;
/// regenerating replaces the token.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareSettings {
    pub token: String,
    pub role: CollaboratorRole,
    pub enabled: bool,
    pub created_at: String,
}

/// A single uploaded plan revision within a project.
///
/// `category_version_number` counts uploads per category label, so "Floor plan
/// v3" and "Elevation v1" can coexist in one project.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectVersion {
    pub id: String,
    pub category: String,
    pub category_version_number: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    /// Exactly one version per project carries this flag.
    pub is_current: bool,
    pub uploaded_by: String,
    pub uploaded_at: String,
    #[serde(default)]
    pub comments: Vec<Comment>,
}

/// A design review project.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub collaborators: Vec<Collaborator>,
    /// Ordered by upload timestamp.
    #[serde(default)]
    pub versions: Vec<ProjectVersion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub share: Option<ShareSettings>,
    pub created_at: String,
    pub updated_at: String,
}

/// A project as served to a specific viewer: comments filtered for the
/// viewer's role, share settings visible to the owner only.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectView {
    pub project: Project,
    pub role: ProjectRole,
}

/// Request body for creating a project.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProjectRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Request body for inviting a collaborator.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteCollaboratorRequest {
    pub email: String,
    pub role: CollaboratorRole,
}

/// Request body for creating or replacing the share link.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateShareLinkRequest {
    pub role: CollaboratorRole,
}

/// Query parameters accepted when uploading a new version.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadVersionQuery {
    pub category: String,
    pub filename: String,
}

/// Query parameters for viewing a project.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectViewQuery {
    /// Admin-only role injection for support and testing.
    #[serde(default)]
    pub view_as: Option<ProjectRole>,
}
