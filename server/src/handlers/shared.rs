//! Shared-access handlers: share-token resolution and the shared-editor
//! patch path.
//!
//! Authorization here is by token possession. The patch path re-runs the
//! same checks the client ran before sending: the grant must exist, must
//! belong to the target project, and must carry editor permission. Each
//! failure gets its own rejection reason so a collaborator can tell a
//! revoked link from a downgraded one.

use crate::db;
use crate::error::{AppError, Result};
use crate::handlers::ProjectResponse;
use folio_engine::{PatchRejection, SharePermission};
use serde::Deserialize;
use serde_json::Value;
use sqlx::PgPool;

/// Header carrying the share token on the patch path.
pub const SHARE_ID_HEADER: &str = "x-share-id";

/// Request body for the shared-editor patch. Deliberately narrow: only
/// the name and the snapshot are writable through this path.
#[derive(Debug, Deserialize)]
pub struct SharedPatchRequest {
    pub share_id: String,
    pub project_data: Value,
    #[serde(default)]
    pub name: Option<String>,
}

/// Resolve a share token to its project.
///
/// A grant may demand authentication (`requires_auth`); in that case an
/// anonymous caller is turned away even with a valid token.
pub async fn handle_get_shared(
    pool: &PgPool,
    share_id: &str,
    authenticated: bool,
) -> Result<ProjectResponse> {
    let project = db::get_project_by_share(pool, share_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("share not found: {share_id}")))?;

    if project.requires_auth && !authenticated {
        return Err(AppError::Unauthorized);
    }
    Ok(project.into())
}

/// Apply a shared-editor patch to a project.
pub async fn handle_shared_patch(
    pool: &PgPool,
    project_id: &str,
    header_share_id: Option<&str>,
    request: SharedPatchRequest,
) -> Result<ProjectResponse> {
    let Some(share_id) = header_share_id.filter(|s| !s.is_empty()) else {
        return Err(AppError::Patch(PatchRejection::MissingShareId));
    };
    if share_id != request.share_id {
        return Err(AppError::Patch(PatchRejection::InvalidPayload {
            detail: "share id in header and body disagree".to_string(),
        }));
    }

    let project = db::get_project_by_share(pool, share_id).await?;
    let Some(project) = project else {
        // Covers both an unknown token and a revoked grant.
        return Err(AppError::Patch(PatchRejection::ShareNotFound));
    };
    if project.id != project_id {
        return Err(AppError::Patch(PatchRejection::InvalidPayload {
            detail: "share grant does not belong to this project".to_string(),
        }));
    }
    if project.share_permission() != SharePermission::Editor {
        return Err(AppError::Patch(PatchRejection::NoEditorPermission));
    }

    let Some(snapshot) = request.project_data.as_object() else {
        return Err(AppError::Patch(PatchRejection::InvalidPayload {
            detail: "project_data must be an object".to_string(),
        }));
    };
    // The snapshot may omit its id, but a mismatched one is a client bug.
    if let Some(embedded) = snapshot.get("id").and_then(Value::as_str) {
        if embedded != project_id {
            return Err(AppError::Patch(PatchRejection::InvalidPayload {
                detail: "snapshot id does not match the target project".to_string(),
            }));
        }
    }

    let updated = db::apply_shared_patch(
        pool,
        project_id,
        request.name.as_deref(),
        &request.project_data,
    )
    .await?
    .ok_or_else(|| AppError::Patch(PatchRejection::ShareNotFound))?;

    tracing::info!(
        id = %project_id,
        share = %share_id,
        version = updated.server_version,
        "shared-editor patch applied"
    );
    Ok(updated.into())
}
