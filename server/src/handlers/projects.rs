//! Project CRUD handlers - create, read, update (version-checked), delete,
//! list, search, stats, and the owner-side share settings.

use crate::db::{self, ProjectChanges, StoredProject, UpdateResult};
use crate::error::{AppError, ConflictBody, Result};
use folio_engine::{SharePermission, Version};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::PgPool;
use std::collections::BTreeMap;

/// Request body for creating a project.
#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub project_data: Value,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_public: bool,
}

/// Request body for updating a project. Absent fields are left untouched.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateProjectRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub project_data: Option<Value>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub is_public: Option<bool>,
    /// The version the client last saw. Required: the version check is
    /// what keeps two stale tabs from silently overwriting each other.
    pub local_version: Option<Version>,
}

/// Full project response.
#[derive(Debug, Serialize)]
pub struct ProjectResponse {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub created_by: Option<String>,
    pub project_data: Value,
    pub tags: Vec<String>,
    pub is_public: bool,
    pub share_id: Option<String>,
    pub share_permissions: SharePermission,
    pub requires_auth: bool,
    pub local_version: Version,
    pub server_version: Version,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<StoredProject> for ProjectResponse {
    fn from(project: StoredProject) -> Self {
        let share_permissions = project.share_permission();
        Self {
            id: project.id,
            name: project.name,
            description: project.description,
            created_by: project.created_by,
            project_data: project.project_data,
            tags: project.tags,
            is_public: project.is_public,
            share_id: project.share_id,
            share_permissions,
            requires_auth: project.requires_auth,
            local_version: project.server_version as Version,
            server_version: project.server_version as Version,
            created_at: project.created_at,
            updated_at: project.updated_at,
        }
    }
}

/// Summary row for project lists: index columns only, no snapshot blob.
#[derive(Debug, Serialize)]
pub struct ProjectSummaryResponse {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    pub num_pages: u32,
    pub current_page: u32,
    pub current_workflow_step: String,
    pub source_language: String,
    pub desired_language: String,
    pub tags: Vec<String>,
    pub is_public: bool,
    pub server_version: Version,
}

impl From<StoredProject> for ProjectSummaryResponse {
    fn from(project: StoredProject) -> Self {
        Self {
            id: project.id,
            name: project.name,
            description: project.description,
            created_at: project.created_at,
            updated_at: project.updated_at,
            num_pages: project.num_pages.max(0) as u32,
            current_page: project.current_page.max(0) as u32,
            current_workflow_step: project.current_workflow_step,
            source_language: project.source_language,
            desired_language: project.desired_language,
            tags: project.tags,
            is_public: project.is_public,
            server_version: project.server_version as Version,
        }
    }
}

/// Per-user project aggregates.
#[derive(Debug, Serialize)]
pub struct ProjectStatsResponse {
    pub total_projects: i64,
    /// Project counts keyed by workflow step name.
    pub workflow_step_counts: BTreeMap<String, i64>,
    pub last_updated: chrono::DateTime<chrono::Utc>,
}

/// Owner-side share settings.
#[derive(Debug, Deserialize)]
pub struct ShareSettingsRequest {
    pub is_public: bool,
    #[serde(default)]
    pub share_permissions: Option<SharePermission>,
    #[serde(default)]
    pub requires_auth: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct ShareSettingsResponse {
    pub share_id: Option<String>,
    pub is_public: bool,
    pub share_permissions: SharePermission,
    pub requires_auth: bool,
}

impl From<&StoredProject> for ShareSettingsResponse {
    fn from(project: &StoredProject) -> Self {
        Self {
            share_id: project.share_id.clone(),
            is_public: project.is_public,
            share_permissions: project.share_permission(),
            requires_auth: project.requires_auth,
        }
    }
}

pub async fn handle_create(
    pool: &PgPool,
    user_id: &str,
    request: CreateProjectRequest,
) -> Result<ProjectResponse> {
    if !request.project_data.is_object() {
        return Err(AppError::BadRequest(
            "project_data must be an object".to_string(),
        ));
    }

    let project = db::insert_project(
        pool,
        &request.name,
        request.description.as_deref(),
        user_id,
        &request.project_data,
        &request.tags,
        request.is_public,
    )
    .await?;

    tracing::info!(id = %project.id, user = user_id, "project created");
    Ok(project.into())
}

pub async fn handle_get(pool: &PgPool, user_id: &str, id: &str) -> Result<ProjectResponse> {
    let project = db::get_project(pool, id, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("project not found: {id}")))?;
    Ok(project.into())
}

pub async fn handle_get_public(pool: &PgPool, id: &str) -> Result<ProjectResponse> {
    let project = db::get_public_project(pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("project not found: {id}")))?;
    Ok(project.into())
}

pub async fn handle_update(
    pool: &PgPool,
    user_id: &str,
    id: &str,
    request: UpdateProjectRequest,
) -> Result<ProjectResponse> {
    let client_version = request
        .local_version
        .ok_or_else(|| AppError::BadRequest("local_version is required".to_string()))?;

    let changes = ProjectChanges {
        name: request.name,
        project_data: request.project_data,
        tags: request.tags,
        is_public: request.is_public,
    };

    match db::update_project(pool, id, user_id, changes, client_version).await? {
        None => Err(AppError::NotFound(format!("project not found: {id}"))),
        Some(UpdateResult::Updated(project)) => {
            tracing::debug!(%id, version = project.server_version, "project updated");
            Ok(project.into())
        }
        Some(UpdateResult::Stale(current)) => {
            tracing::info!(
                %id,
                client_version,
                server_version = current.server_version,
                "stale update rejected"
            );
            Err(AppError::Conflict(ConflictBody {
                local_version: client_version,
                server_version: current.server_version as u64,
                server_data: current.project_data,
            }))
        }
    }
}

pub async fn handle_delete(pool: &PgPool, user_id: &str, id: &str) -> Result<()> {
    db::delete_project(pool, id, user_id).await?;
    tracing::info!(%id, "project deleted");
    Ok(())
}

pub async fn handle_list(
    pool: &PgPool,
    user_id: &str,
    limit: i64,
    offset: i64,
) -> Result<Vec<ProjectSummaryResponse>> {
    let projects = db::list_projects(pool, user_id, limit, offset).await?;
    Ok(projects.into_iter().map(Into::into).collect())
}

pub async fn handle_search(
    pool: &PgPool,
    user_id: &str,
    term: &str,
    limit: i64,
) -> Result<Vec<ProjectSummaryResponse>> {
    if term.trim().is_empty() {
        return Err(AppError::BadRequest(
            "search term must not be empty".to_string(),
        ));
    }

    let projects = db::search_projects(pool, user_id, term, limit).await?;
    tracing::debug!(user = user_id, hits = projects.len(), "project search");
    Ok(projects.into_iter().map(Into::into).collect())
}

pub async fn handle_stats(pool: &PgPool, user_id: &str) -> Result<ProjectStatsResponse> {
    let step_counts = db::count_projects_by_step(pool, user_id).await?;

    let total_projects = step_counts.iter().map(|(_, count)| count).sum();
    let workflow_step_counts = step_counts.into_iter().collect();

    Ok(ProjectStatsResponse {
        total_projects,
        workflow_step_counts,
        last_updated: chrono::Utc::now(),
    })
}

pub async fn handle_get_share_settings(
    pool: &PgPool,
    user_id: &str,
    id: &str,
) -> Result<ShareSettingsResponse> {
    let project = db::get_project(pool, id, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("project not found: {id}")))?;
    Ok((&project).into())
}

pub async fn handle_put_share_settings(
    pool: &PgPool,
    user_id: &str,
    id: &str,
    request: ShareSettingsRequest,
) -> Result<ShareSettingsResponse> {
    let project = db::update_share_settings(
        pool,
        id,
        user_id,
        request.is_public,
        request.share_permissions.unwrap_or_default(),
        request.requires_auth.unwrap_or(false),
    )
    .await?
    .ok_or_else(|| AppError::NotFound(format!("project not found: {id}")))?;

    tracing::info!(%id, is_public = project.is_public, "share settings updated");
    Ok((&project).into())
}
