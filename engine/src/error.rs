//! Error types for the Folio engine.

use crate::{ProjectId, ShareId};
use thiserror::Error;

/// All possible errors from the persistence engine.
///
/// A version conflict is deliberately not an error: it is a legitimate
/// outcome of a save, surfaced by callers with both snapshots attached so
/// the user is forced to choose a resolution.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("malformed snapshot: missing required field '{0}'")]
    MalformedSnapshot(String),

    #[error("project not found: {0}")]
    NotFound(ProjectId),

    #[error("share grant does not allow editing")]
    NoEditorPermission,

    #[error("share not found: {0}")]
    ShareNotFound(ShareId),

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("network failure: {0}")]
    NetworkFailure(String),

    #[error("storage failure: {0}")]
    Storage(String),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
