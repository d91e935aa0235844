//! Database operations for the projects table.
//!
//! Every write re-derives the extracted index columns (page counts,
//! languages, workflow step) from the snapshot, so list queries never have
//! to open the JSONB blob. The version check runs inside a row-locking
//! transaction: on a stale client the row is returned untouched.

use folio_engine::{evaluate_write, SharePermission, Version, WriteDecision, INITIAL_VERSION};
use serde_json::Value;
use sqlx::{PgPool, Row};
use uuid::Uuid;

/// A stored project row from the database.
#[derive(Debug, Clone)]
pub struct StoredProject {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub created_by: Option<String>,
    pub project_data: Value,
    pub tags: Vec<String>,
    pub is_public: bool,
    pub share_id: Option<String>,
    pub share_permissions: Option<String>,
    pub requires_auth: bool,
    pub server_version: i64,
    pub num_pages: i32,
    pub current_page: i32,
    pub current_workflow_step: String,
    pub source_language: String,
    pub desired_language: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for StoredProject {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(StoredProject {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            created_by: row.try_get("created_by")?,
            project_data: row.try_get("project_data")?,
            tags: row.try_get("tags")?,
            is_public: row.try_get("is_public")?,
            share_id: row.try_get("share_id")?,
            share_permissions: row.try_get("share_permissions")?,
            requires_auth: row.try_get("requires_auth")?,
            server_version: row.try_get("server_version")?,
            num_pages: row.try_get("num_pages")?,
            current_page: row.try_get("current_page")?,
            current_workflow_step: row.try_get("current_workflow_step")?,
            source_language: row.try_get("source_language")?,
            desired_language: row.try_get("desired_language")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl StoredProject {
    /// The permission attached to the share grant; viewer when unset.
    pub fn share_permission(&self) -> SharePermission {
        match self.share_permissions.as_deref() {
            Some("editor") => SharePermission::Editor,
            _ => SharePermission::Viewer,
        }
    }
}

/// Index columns extracted from a snapshot for list queries.
#[derive(Debug, Default)]
pub struct SnapshotIndex {
    pub num_pages: i32,
    pub current_page: i32,
    pub current_workflow_step: String,
    pub source_language: String,
    pub desired_language: String,
}

impl SnapshotIndex {
    /// Pull the indexable fields out of a snapshot tree. Missing or
    /// malformed fields fall back to defaults; indexing never fails a
    /// write.
    pub fn from_snapshot(data: &Value) -> Self {
        let doc_u32 = |key: &str| {
            data.pointer(&format!("/documentState/{key}"))
                .and_then(Value::as_u64)
                .and_then(|n| i32::try_from(n).ok())
                .unwrap_or_default()
        };
        let top_str = |key: &str| {
            data.get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        Self {
            num_pages: doc_u32("numPages"),
            current_page: doc_u32("currentPage"),
            current_workflow_step: data
                .pointer("/viewState/currentWorkflowStep")
                .and_then(Value::as_str)
                .unwrap_or("translate")
                .to_string(),
            source_language: top_str("sourceLanguage"),
            desired_language: top_str("desiredLanguage"),
        }
    }
}

/// Fields accepted by [`update_project`]. `None` leaves a column untouched.
#[derive(Debug, Default)]
pub struct ProjectChanges {
    pub name: Option<String>,
    pub project_data: Option<Value>,
    pub tags: Option<Vec<String>>,
    pub is_public: Option<bool>,
}

/// Outcome of a version-checked update.
#[derive(Debug)]
pub enum UpdateResult {
    Updated(StoredProject),
    /// The client's version was stale; the row is returned untouched.
    Stale(StoredProject),
}

const PROJECT_COLUMNS: &str = "id, name, description, created_by, project_data, tags, \
     is_public, share_id, share_permissions, requires_auth, server_version, \
     num_pages, current_page, current_workflow_step, source_language, \
     desired_language, created_at, updated_at";

/// Insert a new project at the initial version.
pub async fn insert_project(
    pool: &PgPool,
    name: &str,
    description: Option<&str>,
    created_by: &str,
    project_data: &Value,
    tags: &[String],
    is_public: bool,
) -> Result<StoredProject, sqlx::Error> {
    let id = Uuid::new_v4().to_string();
    let index = SnapshotIndex::from_snapshot(project_data);

    sqlx::query_as::<_, StoredProject>(&format!(
        r#"
        INSERT INTO projects (
            id, name, description, created_by, project_data, tags, is_public,
            requires_auth, server_version, num_pages, current_page,
            current_workflow_step, source_language, desired_language
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, false, $8, $9, $10, $11, $12, $13)
        RETURNING {PROJECT_COLUMNS}
        "#
    ))
    .bind(&id)
    .bind(name)
    .bind(description)
    .bind(created_by)
    .bind(project_data)
    .bind(tags)
    .bind(is_public)
    .bind(INITIAL_VERSION as i64)
    .bind(index.num_pages)
    .bind(index.current_page)
    .bind(&index.current_workflow_step)
    .bind(&index.source_language)
    .bind(&index.desired_language)
    .fetch_one(pool)
    .await
}

/// Get a project owned by (or visible to) the given user.
pub async fn get_project(
    pool: &PgPool,
    id: &str,
    user_id: &str,
) -> Result<Option<StoredProject>, sqlx::Error> {
    sqlx::query_as::<_, StoredProject>(&format!(
        r#"
        SELECT {PROJECT_COLUMNS}
        FROM projects
        WHERE id = $1 AND (created_by = $2 OR created_by IS NULL)
        "#
    ))
    .bind(id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

/// Get a public project without any ownership check.
pub async fn get_public_project(
    pool: &PgPool,
    id: &str,
) -> Result<Option<StoredProject>, sqlx::Error> {
    sqlx::query_as::<_, StoredProject>(&format!(
        r#"
        SELECT {PROJECT_COLUMNS}
        FROM projects
        WHERE id = $1 AND is_public = true
        "#
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Resolve a share token to its project.
pub async fn get_project_by_share(
    pool: &PgPool,
    share_id: &str,
) -> Result<Option<StoredProject>, sqlx::Error> {
    sqlx::query_as::<_, StoredProject>(&format!(
        r#"
        SELECT {PROJECT_COLUMNS}
        FROM projects
        WHERE share_id = $1
        "#
    ))
    .bind(share_id)
    .fetch_optional(pool)
    .await
}

/// Apply a version-checked update.
///
/// The row is locked for the duration of the check so two racing clients
/// cannot both observe the same version; exactly one wins and the loser
/// sees [`UpdateResult::Stale`].
pub async fn update_project(
    pool: &PgPool,
    id: &str,
    user_id: &str,
    changes: ProjectChanges,
    client_version: Version,
) -> Result<Option<UpdateResult>, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let Some(current) = sqlx::query_as::<_, StoredProject>(&format!(
        r#"
        SELECT {PROJECT_COLUMNS}
        FROM projects
        WHERE id = $1 AND (created_by = $2 OR created_by IS NULL)
        FOR UPDATE
        "#
    ))
    .bind(id)
    .bind(user_id)
    .fetch_optional(&mut *tx)
    .await?
    else {
        return Ok(None);
    };

    let next = match evaluate_write(client_version, current.server_version as u64) {
        WriteDecision::Accept { next } => next,
        WriteDecision::Stale => {
            tx.rollback().await?;
            return Ok(Some(UpdateResult::Stale(current)));
        }
    };

    let project_data = changes.project_data.unwrap_or(current.project_data);
    let index = SnapshotIndex::from_snapshot(&project_data);

    let updated = sqlx::query_as::<_, StoredProject>(&format!(
        r#"
        UPDATE projects SET
            name = $2,
            project_data = $3,
            tags = $4,
            is_public = $5,
            server_version = $6,
            num_pages = $7,
            current_page = $8,
            current_workflow_step = $9,
            source_language = $10,
            desired_language = $11,
            updated_at = now()
        WHERE id = $1
        RETURNING {PROJECT_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(changes.name.unwrap_or(current.name))
    .bind(&project_data)
    .bind(changes.tags.unwrap_or(current.tags))
    .bind(changes.is_public.unwrap_or(current.is_public))
    .bind(next as i64)
    .bind(index.num_pages)
    .bind(index.current_page)
    .bind(&index.current_workflow_step)
    .bind(&index.source_language)
    .bind(&index.desired_language)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(Some(UpdateResult::Updated(updated)))
}

/// Apply a shared-editor patch: name and snapshot only, version bumped.
pub async fn apply_shared_patch(
    pool: &PgPool,
    id: &str,
    name: Option<&str>,
    project_data: &Value,
) -> Result<Option<StoredProject>, sqlx::Error> {
    let index = SnapshotIndex::from_snapshot(project_data);

    sqlx::query_as::<_, StoredProject>(&format!(
        r#"
        UPDATE projects SET
            name = COALESCE($2, name),
            project_data = $3,
            server_version = server_version + 1,
            num_pages = $4,
            current_page = $5,
            current_workflow_step = $6,
            source_language = $7,
            desired_language = $8,
            updated_at = now()
        WHERE id = $1
        RETURNING {PROJECT_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(name)
    .bind(project_data)
    .bind(index.num_pages)
    .bind(index.current_page)
    .bind(&index.current_workflow_step)
    .bind(&index.source_language)
    .bind(&index.desired_language)
    .fetch_optional(pool)
    .await
}

/// Delete a project. Idempotent: a missing row is not an error.
pub async fn delete_project(pool: &PgPool, id: &str, user_id: &str) -> Result<(), sqlx::Error> {
    sqlx::query(r#"DELETE FROM projects WHERE id = $1 AND (created_by = $2 OR created_by IS NULL)"#)
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// List the user's projects, most recently updated first.
pub async fn list_projects(
    pool: &PgPool,
    user_id: &str,
    limit: i64,
    offset: i64,
) -> Result<Vec<StoredProject>, sqlx::Error> {
    sqlx::query_as::<_, StoredProject>(&format!(
        r#"
        SELECT {PROJECT_COLUMNS}
        FROM projects
        WHERE created_by = $1 OR created_by IS NULL
        ORDER BY updated_at DESC
        LIMIT $2 OFFSET $3
        "#
    ))
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

/// Search the user's projects by name, most recently updated first.
///
/// Matches case-insensitively against both the indexed `name` column and
/// the name embedded in the snapshot, since a shared-editor patch can
/// change the latter without the former. Wildcard characters in the term
/// are escaped so they match literally.
pub async fn search_projects(
    pool: &PgPool,
    user_id: &str,
    term: &str,
    limit: i64,
) -> Result<Vec<StoredProject>, sqlx::Error> {
    let pattern = format!("%{}%", escape_like(term));

    sqlx::query_as::<_, StoredProject>(&format!(
        r#"
        SELECT {PROJECT_COLUMNS}
        FROM projects
        WHERE (created_by = $1 OR created_by IS NULL)
          AND (name ILIKE $2 OR project_data->>'name' ILIKE $2)
        ORDER BY updated_at DESC
        LIMIT $3
        "#
    ))
    .bind(user_id)
    .bind(&pattern)
    .bind(limit)
    .fetch_all(pool)
    .await
}

fn escape_like(term: &str) -> String {
    term.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Count the user's projects per workflow step. Steps with no projects are
/// simply absent from the result.
pub async fn count_projects_by_step(
    pool: &PgPool,
    user_id: &str,
) -> Result<Vec<(String, i64)>, sqlx::Error> {
    sqlx::query_as::<_, (String, i64)>(
        r#"
        SELECT current_workflow_step, COUNT(*)
        FROM projects
        WHERE created_by = $1 OR created_by IS NULL
        GROUP BY current_workflow_step
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

/// Update the sharing columns.
///
/// Enabling sharing mints a share id if the project has none. Making the
/// project private revokes the grant: share id cleared, permission reset
/// to viewer.
pub async fn update_share_settings(
    pool: &PgPool,
    id: &str,
    user_id: &str,
    is_public: bool,
    permission: SharePermission,
    requires_auth: bool,
) -> Result<Option<StoredProject>, sqlx::Error> {
    let permission = match permission {
        SharePermission::Editor => "editor",
        SharePermission::Viewer => "viewer",
    };

    if is_public {
        sqlx::query_as::<_, StoredProject>(&format!(
            r#"
            UPDATE projects SET
                is_public = true,
                share_id = COALESCE(share_id, $3),
                share_permissions = $4,
                requires_auth = $5,
                updated_at = now()
            WHERE id = $1 AND (created_by = $2 OR created_by IS NULL)
            RETURNING {PROJECT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(user_id)
        .bind(Uuid::new_v4().to_string())
        .bind(permission)
        .bind(requires_auth)
        .fetch_optional(pool)
        .await
    } else {
        sqlx::query_as::<_, StoredProject>(&format!(
            r#"
            UPDATE projects SET
                is_public = false,
                share_id = NULL,
                share_permissions = 'viewer',
                requires_auth = false,
                updated_at = now()
            WHERE id = $1 AND (created_by = $2 OR created_by IS NULL)
            RETURNING {PROJECT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn snapshot_index_extracts_list_fields() {
        let data = json!({
            "sourceLanguage": "ja",
            "desiredLanguage": "en",
            "documentState": {"numPages": 12, "currentPage": 3},
            "viewState": {"currentWorkflowStep": "layout"}
        });

        let index = SnapshotIndex::from_snapshot(&data);
        assert_eq!(index.num_pages, 12);
        assert_eq!(index.current_page, 3);
        assert_eq!(index.current_workflow_step, "layout");
        assert_eq!(index.source_language, "ja");
        assert_eq!(index.desired_language, "en");
    }

    #[test]
    fn snapshot_index_tolerates_garbage() {
        let data = json!({"documentState": {"numPages": "many"}, "viewState": []});
        let index = SnapshotIndex::from_snapshot(&data);
        assert_eq!(index.num_pages, 0);
        assert_eq!(index.current_workflow_step, "translate");
        assert_eq!(index.source_language, "");
    }

    #[test]
    fn search_terms_match_wildcards_literally() {
        assert_eq!(escape_like("chapter 3"), "chapter 3");
        assert_eq!(escape_like("100%_done"), "100\\%\\_done");
        assert_eq!(escape_like("a\\b"), "a\\\\b");
    }

    #[test]
    fn share_permission_defaults_to_viewer() {
        let mut project = sample_project();
        assert_eq!(project.share_permission(), SharePermission::Viewer);

        project.share_permissions = Some("editor".into());
        assert_eq!(project.share_permission(), SharePermission::Editor);

        project.share_permissions = Some("bogus".into());
        assert_eq!(project.share_permission(), SharePermission::Viewer);
    }

    fn sample_project() -> StoredProject {
        StoredProject {
            id: "p1".into(),
            name: "Doc".into(),
            description: None,
            created_by: Some("user-1".into()),
            project_data: json!({}),
            tags: vec![],
            is_public: false,
            share_id: None,
            share_permissions: None,
            requires_auth: false,
            server_version: 1,
            num_pages: 0,
            current_page: 1,
            current_workflow_step: "translate".into(),
            source_language: String::new(),
            desired_language: String::new(),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }
}
