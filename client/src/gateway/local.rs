//! Local device storage - the anonymous/offline home of a project.
//!
//! One JSON entry per project under a root directory, keyed by a
//! namespaced string containing the project id, plus one "current project"
//! pointer entry. Entries are plain serialized snapshots as produced by the
//! engine codec.

use crate::gateway::{
    CreateProjectRequest, ProjectRecord, ProjectSummary, StorageGateway, UpdateOutcome,
    UpdateProjectRequest,
};
use folio_engine::error::Result;
use folio_engine::{Error, SharePermission};
use serde_json::Value;
use std::path::{Path, PathBuf};
use uuid::Uuid;

const PROJECT_KEY_PREFIX: &str = "folio.project.";
const CURRENT_PROJECT_KEY: &str = "folio.current-project";

/// On-device storage gateway.
#[derive(Debug, Clone)]
pub struct LocalGateway {
    root: PathBuf,
}

impl LocalGateway {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn entry_path(&self, id: &str) -> PathBuf {
        self.root.join(format!("{PROJECT_KEY_PREFIX}{id}.json"))
    }

    fn pointer_path(&self) -> PathBuf {
        self.root.join(CURRENT_PROJECT_KEY)
    }

    /// Remember which project the device was last editing.
    pub async fn set_current_project(&self, id: &str) -> Result<()> {
        ensure_root(&self.root).await?;
        tokio::fs::write(self.pointer_path(), id)
            .await
            .map_err(storage_err)
    }

    /// The project id the device was last editing, if any.
    pub async fn current_project(&self) -> Result<Option<String>> {
        match tokio::fs::read_to_string(self.pointer_path()).await {
            Ok(id) if !id.trim().is_empty() => Ok(Some(id.trim().to_string())),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(storage_err(e)),
        }
    }

    async fn read_snapshot(&self, id: &str) -> Result<Value> {
        let raw = match tokio::fs::read_to_string(self.entry_path(id)).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::NotFound(id.to_string()))
            }
            Err(e) => return Err(storage_err(e)),
        };
        serde_json::from_str(&raw).map_err(|e| Error::Storage(e.to_string()))
    }

    async fn write_snapshot(&self, id: &str, snapshot: &Value) -> Result<()> {
        ensure_root(&self.root).await?;
        let raw = serde_json::to_string(snapshot).map_err(|e| Error::Storage(e.to_string()))?;
        tokio::fs::write(self.entry_path(id), raw)
            .await
            .map_err(storage_err)
    }
}

impl StorageGateway for LocalGateway {
    async fn create(&self, request: CreateProjectRequest) -> Result<ProjectRecord> {
        let id = format!("local-{}", Uuid::new_v4());

        let mut snapshot = request.project_data;
        if let Some(obj) = snapshot.as_object_mut() {
            obj.insert("id".into(), Value::String(id.clone()));
            obj.insert("name".into(), Value::String(request.name.clone()));
        }

        self.write_snapshot(&id, &snapshot).await?;
        tracing::debug!(%id, "created local project entry");
        Ok(record_from_snapshot(&id, snapshot))
    }

    async fn read(&self, id: &str) -> Result<ProjectRecord> {
        let snapshot = self.read_snapshot(id).await?;
        Ok(record_from_snapshot(id, snapshot))
    }

    async fn update(&self, id: &str, request: UpdateProjectRequest) -> Result<UpdateOutcome> {
        let mut snapshot = match self.read_snapshot(id).await {
            Ok(existing) => existing,
            // Local storage has no create/update distinction worth
            // surfacing; an update to a missing entry starts a fresh one.
            Err(Error::NotFound(_)) => Value::Object(serde_json::Map::new()),
            Err(e) => return Err(e),
        };

        if let Some(data) = request.project_data {
            snapshot = data;
        }
        if let Some(obj) = snapshot.as_object_mut() {
            obj.insert("id".into(), Value::String(id.to_string()));
            if let Some(name) = request.name {
                obj.insert("name".into(), Value::String(name));
            }
        }

        self.write_snapshot(id, &snapshot).await?;
        Ok(UpdateOutcome::Updated(record_from_snapshot(id, snapshot)))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        match tokio::fs::remove_file(self.entry_path(id)).await {
            Ok(()) => {}
            // Idempotent: deleting twice is not an error.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(storage_err(e)),
        }

        // Drop a dangling current-project pointer.
        if self.current_project().await?.as_deref() == Some(id) {
            let _ = tokio::fs::remove_file(self.pointer_path()).await;
        }
        Ok(())
    }

    async fn list(&self, limit: u32, offset: u32) -> Result<Vec<ProjectSummary>> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(storage_err(e)),
        };

        let mut summaries = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(storage_err)? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(id) = name
                .strip_prefix(PROJECT_KEY_PREFIX)
                .and_then(|rest| rest.strip_suffix(".json"))
            else {
                continue;
            };

            match self.read_snapshot(id).await {
                Ok(snapshot) => summaries.push(summary_from_snapshot(id, &snapshot)),
                Err(e) => {
                    tracing::warn!(%id, error = %e, "skipping unreadable local entry");
                }
            }
        }

        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(summaries
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }
}

fn record_from_snapshot(id: &str, snapshot: Value) -> ProjectRecord {
    let name = snapshot
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let created_at = millis_field(&snapshot, "createdAt");
    let updated_at = millis_field(&snapshot, "updatedAt");

    ProjectRecord {
        id: id.to_string(),
        name,
        description: None,
        created_by: None,
        project_data: snapshot,
        tags: Vec::new(),
        is_public: false,
        share_id: None,
        share_permissions: SharePermission::Viewer,
        requires_auth: false,
        local_version: 1,
        server_version: 1,
        created_at,
        updated_at,
    }
}

fn summary_from_snapshot(id: &str, snapshot: &Value) -> ProjectSummary {
    let doc = snapshot.get("documentState");
    let doc_u32 = |key: &str| {
        doc.and_then(|d| d.get(key))
            .and_then(Value::as_u64)
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or_default()
    };
    let top_str = |key: &str| {
        snapshot
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };

    ProjectSummary {
        id: id.to_string(),
        name: top_str("name"),
        description: None,
        created_at: millis_field(snapshot, "createdAt"),
        updated_at: millis_field(snapshot, "updatedAt"),
        num_pages: doc_u32("numPages"),
        current_page: doc_u32("currentPage"),
        current_workflow_step: snapshot
            .pointer("/viewState/currentWorkflowStep")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        source_language: top_str("sourceLanguage"),
        desired_language: top_str("desiredLanguage"),
        tags: Vec::new(),
        is_public: false,
        server_version: 1,
    }
}

fn millis_field(snapshot: &Value, key: &str) -> String {
    snapshot
        .get(key)
        .and_then(Value::as_u64)
        .map(|ms| ms.to_string())
        .unwrap_or_default()
}

async fn ensure_root(root: &Path) -> Result<()> {
    tokio::fs::create_dir_all(root).await.map_err(storage_err)
}

fn storage_err(e: std::io::Error) -> Error {
    Error::Storage(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn gateway() -> (tempfile::TempDir, LocalGateway) {
        let dir = tempfile::tempdir().unwrap();
        let gateway = LocalGateway::new(dir.path());
        (dir, gateway)
    }

    fn create_request(name: &str) -> CreateProjectRequest {
        CreateProjectRequest {
            name: name.into(),
            description: None,
            project_data: json!({
                "name": name,
                "createdAt": 1_000,
                "updatedAt": 1_000,
                "documentState": {"numPages": 3, "deletedPages": []}
            }),
            tags: Vec::new(),
            is_public: false,
        }
    }

    #[tokio::test]
    async fn create_assigns_namespaced_local_id() {
        let (_dir, gateway) = gateway();
        let record = gateway.create(create_request("Doc A")).await.unwrap();

        assert!(record.id.starts_with("local-"));
        assert_eq!(record.project_data["id"], record.id.as_str());

        let read_back = gateway.read(&record.id).await.unwrap();
        assert_eq!(read_back.name, "Doc A");
    }

    #[tokio::test]
    async fn read_missing_is_not_found() {
        let (_dir, gateway) = gateway();
        let err = gateway.read("local-missing").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn update_replaces_snapshot() {
        let (_dir, gateway) = gateway();
        let record = gateway.create(create_request("Doc A")).await.unwrap();

        let outcome = gateway
            .update(
                &record.id,
                UpdateProjectRequest {
                    name: Some("Doc A v2".into()),
                    project_data: Some(json!({
                        "name": "Doc A v2",
                        "updatedAt": 2_000,
                        "documentState": {"deletedPages": [3]}
                    })),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let UpdateOutcome::Updated(updated) = outcome else {
            panic!("local updates never conflict");
        };
        assert_eq!(updated.name, "Doc A v2");
        assert_eq!(updated.project_data["documentState"]["deletedPages"][0], 3);
        // Entry key is derived from the id, which never changes.
        assert_eq!(updated.id, record.id);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let (_dir, gateway) = gateway();
        let record = gateway.create(create_request("Doc A")).await.unwrap();

        gateway.delete(&record.id).await.unwrap();
        gateway.delete(&record.id).await.unwrap();

        assert!(matches!(
            gateway.read(&record.id).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn current_project_pointer() {
        let (_dir, gateway) = gateway();
        assert_eq!(gateway.current_project().await.unwrap(), None);

        let record = gateway.create(create_request("Doc A")).await.unwrap();
        gateway.set_current_project(&record.id).await.unwrap();
        assert_eq!(
            gateway.current_project().await.unwrap().as_deref(),
            Some(record.id.as_str())
        );

        // Deleting the pointed-at project clears the pointer.
        gateway.delete(&record.id).await.unwrap();
        assert_eq!(gateway.current_project().await.unwrap(), None);
    }

    #[tokio::test]
    async fn list_orders_by_updated_at_desc() {
        let (_dir, gateway) = gateway();

        let mut older = create_request("Older");
        older.project_data["updatedAt"] = json!(1_000);
        let mut newer = create_request("Newer");
        newer.project_data["updatedAt"] = json!(9_000);

        gateway.create(older).await.unwrap();
        gateway.create(newer).await.unwrap();

        let summaries = gateway.list(10, 0).await.unwrap();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].name, "Newer");
        assert_eq!(summaries[1].name, "Older");

        let paged = gateway.list(1, 1).await.unwrap();
        assert_eq!(paged.len(), 1);
        assert_eq!(paged[0].name, "Older");
    }

    #[tokio::test]
    async fn list_skips_corrupt_entries() {
        let (dir, gateway) = gateway();
        gateway.create(create_request("Doc A")).await.unwrap();

        tokio::fs::write(
            dir.path().join(format!("{PROJECT_KEY_PREFIX}broken.json")),
            "{not json",
        )
        .await
        .unwrap();

        let summaries = gateway.list(10, 0).await.unwrap();
        assert_eq!(summaries.len(), 1);
    }
}
