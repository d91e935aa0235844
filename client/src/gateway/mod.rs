//! Storage gateway - where a snapshot lives.
//!
//! The gateway abstracts the durable home of a project: local device
//! storage or the remote backend. Both speak the same record shapes; the
//! persistence service picks one per call based on the resolved session
//! mode, and exactly one of them is authoritative for a project at a time.

pub mod local;
pub mod remote;

use folio_engine::error::Result;
use folio_engine::{ProjectId, ShareId, SharePermission, UserId, Version};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A full project record as stored durably.
///
/// `project_data` is the snapshot wire tree produced by the engine codec;
/// the surrounding fields are storage metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub id: ProjectId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub created_by: Option<UserId>,
    pub project_data: Value,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub share_id: Option<ShareId>,
    #[serde(default)]
    pub share_permissions: SharePermission,
    #[serde(default)]
    pub requires_auth: bool,
    pub local_version: Version,
    pub server_version: Version,
    pub created_at: String,
    pub updated_at: String,
}

impl ProjectRecord {
    /// The snapshot-internal creation timestamp, used so updates never
    /// invent `createdAt` locally.
    pub fn snapshot_created_at(&self) -> Option<u64> {
        self.project_data.get("createdAt").and_then(Value::as_u64)
    }
}

/// A summary row for project lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSummary {
    pub id: ProjectId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default)]
    pub num_pages: u32,
    #[serde(default)]
    pub current_page: u32,
    #[serde(default)]
    pub current_workflow_step: String,
    #[serde(default)]
    pub source_language: String,
    #[serde(default)]
    pub desired_language: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_public: bool,
    pub server_version: Version,
}

/// Body for creating a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub project_data: Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_public: bool,
}

/// Body for updating a project. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProjectRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_public: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_version: Option<Version>,
}

/// Body for the shared-editor patch path. Deliberately narrow: name and
/// snapshot only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedPatchRequest {
    pub share_id: ShareId,
    pub project_data: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// The conflict payload returned instead of an updated record when the
/// client's version is stale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictPayload {
    pub local_version: Version,
    pub server_version: Version,
    pub server_data: Value,
}

/// Result of an update attempt against a gateway.
#[derive(Debug, Clone)]
pub enum UpdateOutcome {
    Updated(ProjectRecord),
    /// Remote only: the durable version moved ahead of the client.
    Conflict(ConflictPayload),
}

/// The four persistence operations every backend supports.
pub trait StorageGateway: Send + Sync {
    /// Create a new project. The returned record carries the
    /// backend-assigned id, which the caller must adopt for all subsequent
    /// operations on this project.
    fn create(
        &self,
        request: CreateProjectRequest,
    ) -> impl std::future::Future<Output = Result<ProjectRecord>> + Send;

    /// Read a project. Fails with `NotFound` for unknown ids.
    fn read(
        &self,
        id: &str,
    ) -> impl std::future::Future<Output = Result<ProjectRecord>> + Send;

    /// Update a project.
    fn update(
        &self,
        id: &str,
        request: UpdateProjectRequest,
    ) -> impl std::future::Future<Output = Result<UpdateOutcome>> + Send;

    /// Delete a project. Idempotent: deleting twice is not an error.
    fn delete(&self, id: &str) -> impl std::future::Future<Output = Result<()>> + Send;

    /// List project summaries.
    fn list(
        &self,
        limit: u32,
        offset: u32,
    ) -> impl std::future::Future<Output = Result<Vec<ProjectSummary>>> + Send;
}

/// Operations only the remote backend provides: share resolution and the
/// reduced-privilege patch channel.
pub trait RemoteAccess: StorageGateway {
    /// Read a public project without authentication.
    fn read_public(
        &self,
        id: &str,
    ) -> impl std::future::Future<Output = Result<ProjectRecord>> + Send;

    /// Resolve a share token to its backing project.
    fn read_shared(
        &self,
        share_id: &str,
    ) -> impl std::future::Future<Output = Result<ProjectRecord>> + Send;

    /// Submit a shared-editor patch. Authorized by token possession, not
    /// user identity.
    fn shared_patch(
        &self,
        project_id: &str,
        request: SharedPatchRequest,
    ) -> impl std::future::Future<Output = Result<ProjectRecord>> + Send;
}
