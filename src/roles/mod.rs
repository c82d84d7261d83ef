//! Project role derivation and comment visibility predicates.
//!
//! Roles are never stored; they are recomputed from the project document on
//! every request. All functions here are pure.

use crate::models::{
    Audience, Collaborator, CollaboratorRole, PlanLimits, Project, ProjectRole,
};

/// Derive the viewer's role on a project, or `None` when they have no access.
///
/// The owner is implicitly a collaborator and never appears in the
/// collaborator list. Invited collaborators are matched by email
/// (case-insensitive).
pub fn derive_role(project: &Project, user_id: &str, user_email: &str) -> Option<ProjectRole> {
    if project.owner_id == user_id {
        return Some(ProjectRole::Owner);
    }
    project
        .collaborators
        .iter()
        .find(|c| c.email.eq_ignore_ascii_case(user_email))
        .map(|c| c.role.to_project_role())
}

/// Apply an explicit role override for admin support and testing.
///
/// Non-admin callers cannot inject a role; their derived role stands.
pub fn apply_view_as(
    derived: Option<ProjectRole>,
    view_as: Option<ProjectRole>,
    is_admin: bool,
) -> Option<ProjectRole> {
    match (view_as, is_admin) {
        (Some(role), true) => Some(role),
        _ => derived,
    }
}

/// Whether a viewer with the given role may see a comment.
///
/// Comments without an audience predate the tag and are treated as public;
/// this is a backward-compatibility fallback, not a designed invariant.
pub fn can_see_comment(audience: Option<Audience>, role: ProjectRole) -> bool {
    if role == ProjectRole::Owner {
        return true;
    }
    match audience {
        None | Some(Audience::Public) => true,
        Some(Audience::GuestOwner) => role == ProjectRole::Guest,
        Some(Audience::ProOwner) => role == ProjectRole::Professional,
    }
}

/// Audience a new comment is posted into.
///
/// Guests and professionals always post into their own channel. Owners pick
/// explicitly and default to public.
pub fn audience_for_author(role: ProjectRole, requested: Option<Audience>) -> Audience {
    match role {
        ProjectRole::Guest => Audience::GuestOwner,
        ProjectRole::Professional => Audience::ProOwner,
        ProjectRole::Owner => requested.unwrap_or(Audience::Public),
    }
}

/// Whether the owner's plan allows inviting one more collaborator of the
/// given role. `-1` in the limits means unlimited.
pub fn invite_allowed(
    limits: &PlanLimits,
    collaborators: &[Collaborator],
    new_role: CollaboratorRole,
) -> bool {
    let max = match new_role {
        CollaboratorRole::Guest => limits.max_guest_collaborators,
        CollaboratorRole::Professional => limits.max_pro_collaborators,
    };
    if max < 0 {
        return true;
    }
    let existing = collaborators.iter().filter(|c| c.role == new_role).count() as i64;
    existing < max
}

/// Strip a project document down to what the given viewer may see.
///
/// Comments the role may not see are removed; soft-deleted comments and
/// replies are hidden from everyone but the owner, who sees them flagged.
/// Share settings are owner-only.
pub fn project_for_viewer(mut project: Project, role: ProjectRole) -> Project {
    let is_owner = role == ProjectRole::Owner;
    for version in &mut project.versions {
        version.comments.retain(|c| {
            (is_owner || !c.deleted) && can_see_comment(c.audience, role)
        });
        if !is_owner {
            for comment in &mut version.comments {
                comment.replies.retain(|r| !r.deleted);
            }
        }
    }
    if !is_owner {
        project.share = None;
    }
    project
}
