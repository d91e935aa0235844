//! Mode resolution - which persistence path services a call.
//!
//! The ambient session context (credential state, shared-link markers) is
//! passed in explicitly as an [`AmbientContext`] value, so resolution is a
//! pure function with no hidden process-wide state. Callers re-resolve on
//! every save/load because credential state can change mid-session.

use crate::share::SharePermission;
use crate::{ShareId, Timestamp, UserId};
use serde::{Deserialize, Serialize};

/// A user credential as seen by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub user_id: UserId,
    /// Milliseconds since epoch; `None` means non-expiring.
    pub expires_at: Option<Timestamp>,
}

impl Credential {
    pub fn is_valid(&self, now: Timestamp) -> bool {
        !self.user_id.is_empty() && self.expires_at.map_or(true, |exp| exp > now)
    }
}

/// Shared-mode markers present when a session was opened through a share
/// link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareMarkers {
    pub share_id: ShareId,
    pub permission: SharePermission,
}

/// Everything mode resolution depends on, captured at the moment of the
/// call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AmbientContext {
    pub credential: Option<Credential>,
    pub share: Option<ShareMarkers>,
    pub now: Timestamp,
}

/// The persistence path selected for a save/load call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    /// Authenticated owner, remote backend is authoritative.
    Owner,
    /// Anonymous session, local device storage is authoritative.
    LocalOnly,
    /// Share-token session with the declared permission.
    SharedCollaborative(SharePermission),
}

impl SessionMode {
    pub fn is_shared(&self) -> bool {
        matches!(self, SessionMode::SharedCollaborative(_))
    }

    pub fn can_edit_shared(&self) -> bool {
        matches!(
            self,
            SessionMode::SharedCollaborative(SharePermission::Editor)
        )
    }
}

/// Select the persistence path for the given ambient context.
///
/// Shared markers take precedence over everything: a logged-in user viewing
/// someone else's share is still in shared mode for that session. Owner
/// requires a valid, unexpired credential. LocalOnly is the fallback.
pub fn resolve_mode(ctx: &AmbientContext) -> SessionMode {
    if let Some(share) = &ctx.share {
        return SessionMode::SharedCollaborative(share.permission);
    }

    match &ctx.credential {
        Some(credential) if credential.is_valid(ctx.now) => SessionMode::Owner,
        _ => SessionMode::LocalOnly,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credential(expires_at: Option<Timestamp>) -> Credential {
        Credential {
            user_id: "user-1".into(),
            expires_at,
        }
    }

    fn share(permission: SharePermission) -> ShareMarkers {
        ShareMarkers {
            share_id: "share-1".into(),
            permission,
        }
    }

    #[test]
    fn anonymous_resolves_local_only() {
        let ctx = AmbientContext::default();
        assert_eq!(resolve_mode(&ctx), SessionMode::LocalOnly);
    }

    #[test]
    fn valid_credential_resolves_owner() {
        let ctx = AmbientContext {
            credential: Some(credential(Some(2_000))),
            share: None,
            now: 1_000,
        };
        assert_eq!(resolve_mode(&ctx), SessionMode::Owner);
    }

    #[test]
    fn expired_credential_falls_back_to_local() {
        let ctx = AmbientContext {
            credential: Some(credential(Some(500))),
            share: None,
            now: 1_000,
        };
        assert_eq!(resolve_mode(&ctx), SessionMode::LocalOnly);
    }

    #[test]
    fn share_markers_win_over_authentication() {
        let ctx = AmbientContext {
            credential: Some(credential(None)),
            share: Some(share(SharePermission::Viewer)),
            now: 1_000,
        };
        assert_eq!(
            resolve_mode(&ctx),
            SessionMode::SharedCollaborative(SharePermission::Viewer)
        );
    }

    #[test]
    fn shared_editor_can_edit() {
        let ctx = AmbientContext {
            credential: None,
            share: Some(share(SharePermission::Editor)),
            now: 0,
        };
        let mode = resolve_mode(&ctx);
        assert!(mode.is_shared());
        assert!(mode.can_edit_shared());
    }

    #[test]
    fn shared_viewer_cannot_edit() {
        let mode = SessionMode::SharedCollaborative(SharePermission::Viewer);
        assert!(mode.is_shared());
        assert!(!mode.can_edit_shared());
    }

    #[test]
    fn mode_changes_with_context() {
        // Sign-out mid-session: same project, new context, new mode.
        let signed_in = AmbientContext {
            credential: Some(credential(None)),
            share: None,
            now: 1_000,
        };
        assert_eq!(resolve_mode(&signed_in), SessionMode::Owner);

        let signed_out = AmbientContext {
            credential: None,
            ..signed_in
        };
        assert_eq!(resolve_mode(&signed_out), SessionMode::LocalOnly);
    }
}
