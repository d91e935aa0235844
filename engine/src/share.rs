//! Share grants and the shared-editor patch preconditions.
//!
//! Authorization on the shared path is by token possession: a valid,
//! non-revoked share id with editor permission succeeds whether or not the
//! caller is independently authenticated. The same validity rules run
//! client side (before any network call) and server side (before any
//! write).

use crate::mode::SessionMode;
use crate::{ProjectId, ShareId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Permission level attached to a share grant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SharePermission {
    #[default]
    Viewer,
    Editor,
}

/// A grant created when a project owner enables sharing.
///
/// Revoking (making the project private) clears the grant; every
/// shared-mode operation consults it and fails after revocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareGrant {
    pub share_id: ShareId,
    pub project_id: ProjectId,
    pub permission: SharePermission,
    pub requires_auth: bool,
}

impl ShareGrant {
    pub fn allows_edit(&self) -> bool {
        self.permission == SharePermission::Editor
    }
}

/// Distinct rejection reasons for the shared-editor patch path.
///
/// The first three arise client side before any network call; the rest are
/// server-side re-validation results, surfaced verbatim to the
/// collaborator.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum PatchRejection {
    #[error("shared editing is not active")]
    NotShared,

    #[error("No share ID found")]
    MissingShareId,

    #[error("no project ID found")]
    MissingProjectId,

    #[error("share grant does not allow editing")]
    NoEditorPermission,

    #[error("share not found")]
    ShareNotFound,

    #[error("invalid payload: {detail}")]
    InvalidPayload { detail: String },
}

/// Client-side precondition for a shared-editor patch.
///
/// Checked before any network call; the server re-validates independently.
pub fn validate_shared_patch(
    mode: SessionMode,
    share_id: &str,
    project_id: &str,
) -> Result<(), PatchRejection> {
    if !mode.is_shared() {
        return Err(PatchRejection::NotShared);
    }
    if !mode.can_edit_shared() {
        return Err(PatchRejection::NoEditorPermission);
    }
    if share_id.is_empty() {
        return Err(PatchRejection::MissingShareId);
    }
    if project_id.is_empty() {
        return Err(PatchRejection::MissingProjectId);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const EDITOR: SessionMode = SessionMode::SharedCollaborative(SharePermission::Editor);
    const VIEWER: SessionMode = SessionMode::SharedCollaborative(SharePermission::Viewer);

    #[test]
    fn editor_patch_passes_preconditions() {
        assert_eq!(validate_shared_patch(EDITOR, "share-1", "p1"), Ok(()));
    }

    #[test]
    fn viewer_is_rejected_for_any_payload() {
        assert_eq!(
            validate_shared_patch(VIEWER, "share-1", "p1"),
            Err(PatchRejection::NoEditorPermission)
        );
    }

    #[test]
    fn non_shared_modes_are_rejected() {
        assert_eq!(
            validate_shared_patch(SessionMode::Owner, "share-1", "p1"),
            Err(PatchRejection::NotShared)
        );
        assert_eq!(
            validate_shared_patch(SessionMode::LocalOnly, "share-1", "p1"),
            Err(PatchRejection::NotShared)
        );
    }

    #[test]
    fn missing_share_id_rejected_with_expected_reason() {
        let rejection = validate_shared_patch(EDITOR, "", "p1").unwrap_err();
        assert_eq!(rejection, PatchRejection::MissingShareId);
        assert_eq!(rejection.to_string(), "No share ID found");
    }

    #[test]
    fn missing_project_id_rejected() {
        assert_eq!(
            validate_shared_patch(EDITOR, "share-1", ""),
            Err(PatchRejection::MissingProjectId)
        );
    }

    #[test]
    fn rejection_wire_format() {
        let json = serde_json::to_string(&PatchRejection::NoEditorPermission).unwrap();
        assert_eq!(json, r#"{"reason":"no_editor_permission"}"#);

        let parsed: PatchRejection =
            serde_json::from_str(r#"{"reason":"share_not_found"}"#).unwrap();
        assert_eq!(parsed, PatchRejection::ShareNotFound);
    }

    #[test]
    fn grant_permissions() {
        let grant = ShareGrant {
            share_id: "share-1".into(),
            project_id: "p1".into(),
            permission: SharePermission::Viewer,
            requires_auth: false,
        };
        assert!(!grant.allows_edit());

        let grant = ShareGrant {
            permission: SharePermission::Editor,
            ..grant
        };
        assert!(grant.allows_edit());
    }
}
