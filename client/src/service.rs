//! The project persistence service.
//!
//! One instance per editing session. Every save and load resolves the
//! session mode fresh from the ambient context, dispatches to the matching
//! gateway and tracks the record version. Concurrent calls are dropped,
//! not queued: a save that arrives while one is in flight returns
//! [`SaveOutcome::AlreadyInFlight`] and the caller relies on the next
//! trigger.

use crate::gateway::{
    CreateProjectRequest, RemoteAccess, SharedPatchRequest, StorageGateway, UpdateOutcome,
    UpdateProjectRequest,
};
use folio_engine::error::Result;
use folio_engine::{
    codec, resolve_mode, validate_shared_patch, AmbientContext, EditorSession, Error,
    PatchRejection, ProjectId, SessionMode, SessionPatch, Version, INITIAL_VERSION,
};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Result of a save attempt.
#[derive(Debug, Clone)]
pub enum SaveOutcome {
    /// First remote save; the caller must adopt the returned id.
    Created(ProjectId),
    /// Accepted remote update.
    Saved,
    /// Written to device storage only.
    SavedLocally,
    /// Shared-editor patch accepted by the backend.
    SharedPatchAcked,
    /// A save was already in flight; this one was dropped.
    AlreadyInFlight,
    /// The durable version moved ahead of ours. No merge is attempted;
    /// both snapshots are handed to the caller to resolve.
    Conflict {
        local: Value,
        server: Value,
        server_version: Version,
    },
    /// The service was shut down while the call was in flight; the result
    /// was discarded and no state was updated.
    Discarded,
}

/// Result of a load attempt.
#[derive(Debug, Clone)]
pub enum LoadOutcome {
    Loaded(SessionPatch),
    /// A load was already in flight; this one was dropped.
    AlreadyInFlight,
    /// Shut down mid-flight; the fetched state was discarded.
    Discarded,
}

/// RAII single-flight guard. Releases the flag when the call completes,
/// including on early return.
struct Flight<'a>(&'a AtomicBool);

impl<'a> Flight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Flight(flag))
    }
}

impl Drop for Flight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Persistence orchestration for one editing session.
pub struct ProjectPersistence<L, R> {
    local: L,
    remote: R,
    save_in_flight: AtomicBool,
    load_in_flight: AtomicBool,
    shut_down: AtomicBool,
    local_version: AtomicU64,
}

impl<L: StorageGateway, R: RemoteAccess> ProjectPersistence<L, R> {
    pub fn new(local: L, remote: R) -> Self {
        Self {
            local,
            remote,
            save_in_flight: AtomicBool::new(false),
            load_in_flight: AtomicBool::new(false),
            shut_down: AtomicBool::new(false),
            local_version: AtomicU64::new(INITIAL_VERSION),
        }
    }

    /// The version of the last accepted save or successful load.
    pub fn local_version(&self) -> Version {
        self.local_version.load(Ordering::Acquire)
    }

    /// Stop accepting results. In-flight calls run to completion but their
    /// outcomes are discarded; the auto-save scheduler is cancelled
    /// separately.
    pub fn shutdown(&self) {
        self.shut_down.store(true, Ordering::Release);
    }

    fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// Save the session to wherever the current mode says it lives.
    ///
    /// On any error the durable copy and the tracked version are left
    /// untouched; the session stays usable and a later save can succeed.
    pub async fn save(
        &self,
        session: &EditorSession,
        ctx: &AmbientContext,
    ) -> Result<SaveOutcome> {
        let Some(_guard) = Flight::acquire(&self.save_in_flight) else {
            tracing::debug!("save dropped: one already in flight");
            return Ok(SaveOutcome::AlreadyInFlight);
        };
        if self.is_shut_down() {
            return Ok(SaveOutcome::Discarded);
        }

        // Mode is resolved per call, never cached: signing out or opening
        // a share link changes where the very next save goes.
        let mode = resolve_mode(ctx);
        tracing::debug!(?mode, id = ?session.id, "saving session");

        match mode {
            SessionMode::LocalOnly => self.save_local(session, ctx).await,
            SessionMode::Owner => self.save_remote(session, ctx).await,
            SessionMode::SharedCollaborative(_) => {
                self.save_shared_patch(mode, session, ctx).await
            }
        }
    }

    async fn save_local(
        &self,
        session: &EditorSession,
        ctx: &AmbientContext,
    ) -> Result<SaveOutcome> {
        let snapshot = codec::serialize(session, ctx.now);

        match &session.id {
            None => {
                let record = self
                    .local
                    .create(CreateProjectRequest {
                        name: snapshot.name.clone(),
                        description: None,
                        project_data: snapshot.to_value(),
                        tags: Vec::new(),
                        is_public: false,
                    })
                    .await?;
                if self.is_shut_down() {
                    return Ok(SaveOutcome::Discarded);
                }
                Ok(SaveOutcome::Created(record.id))
            }
            Some(id) => {
                self.local
                    .update(
                        id,
                        UpdateProjectRequest {
                            name: Some(snapshot.name.clone()),
                            project_data: Some(snapshot.to_value()),
                            ..Default::default()
                        },
                    )
                    .await?;
                if self.is_shut_down() {
                    return Ok(SaveOutcome::Discarded);
                }
                Ok(SaveOutcome::SavedLocally)
            }
        }
    }

    async fn save_remote(
        &self,
        session: &EditorSession,
        ctx: &AmbientContext,
    ) -> Result<SaveOutcome> {
        let mut snapshot = codec::serialize(session, ctx.now);

        let Some(id) = session.id.clone() else {
            let record = self
                .remote
                .create(CreateProjectRequest {
                    name: snapshot.name.clone(),
                    description: None,
                    project_data: snapshot.to_value(),
                    tags: Vec::new(),
                    is_public: false,
                })
                .await?;
            if self.is_shut_down() {
                return Ok(SaveOutcome::Discarded);
            }
            self.local_version
                .store(record.server_version, Ordering::Release);
            tracing::info!(id = %record.id, "project created remotely");
            return Ok(SaveOutcome::Created(record.id));
        };

        // The creation timestamp belongs to the durable copy. Reading it
        // back before each update keeps a client with a half-restored
        // session from rewriting history.
        let durable = self.remote.read(&id).await?;
        if let Some(created_at) = durable.snapshot_created_at() {
            snapshot.created_at = created_at;
        }
        snapshot.id = Some(id.clone());

        let client_version = self.local_version();
        let outcome = self
            .remote
            .update(
                &id,
                UpdateProjectRequest {
                    name: Some(snapshot.name.clone()),
                    project_data: Some(snapshot.to_value()),
                    local_version: Some(client_version),
                    ..Default::default()
                },
            )
            .await?;
        if self.is_shut_down() {
            return Ok(SaveOutcome::Discarded);
        }

        match outcome {
            UpdateOutcome::Updated(record) => {
                self.local_version
                    .store(record.server_version, Ordering::Release);
                Ok(SaveOutcome::Saved)
            }
            UpdateOutcome::Conflict(payload) => {
                tracing::warn!(
                    %id,
                    client_version,
                    server_version = payload.server_version,
                    "version conflict; surfacing both snapshots"
                );
                Ok(SaveOutcome::Conflict {
                    local: snapshot.to_value(),
                    server: payload.server_data,
                    server_version: payload.server_version,
                })
            }
        }
    }

    async fn save_shared_patch(
        &self,
        mode: SessionMode,
        session: &EditorSession,
        ctx: &AmbientContext,
    ) -> Result<SaveOutcome> {
        let share_id = ctx
            .share
            .as_ref()
            .map(|markers| markers.share_id.as_str())
            .unwrap_or_default();
        let project_id = session.id.as_deref().unwrap_or_default();

        // Precondition check runs before any network traffic.
        validate_shared_patch(mode, share_id, project_id)
            .map_err(|rejection| rejection_to_error(rejection, share_id))?;

        let snapshot = codec::serialize(session, ctx.now);
        self.remote
            .shared_patch(
                project_id,
                SharedPatchRequest {
                    share_id: share_id.to_string(),
                    project_data: snapshot.to_value(),
                    name: Some(snapshot.name.clone()),
                },
            )
            .await?;
        if self.is_shut_down() {
            return Ok(SaveOutcome::Discarded);
        }
        Ok(SaveOutcome::SharedPatchAcked)
    }

    /// Load a project and decode it into a session patch.
    ///
    /// In shared mode `id` is ignored and the share token from the ambient
    /// context is resolved instead.
    pub async fn load(&self, id: &str, ctx: &AmbientContext) -> Result<LoadOutcome> {
        let Some(_guard) = Flight::acquire(&self.load_in_flight) else {
            tracing::debug!("load dropped: one already in flight");
            return Ok(LoadOutcome::AlreadyInFlight);
        };
        if self.is_shut_down() {
            return Ok(LoadOutcome::Discarded);
        }

        let mode = resolve_mode(ctx);
        let record = match mode {
            SessionMode::SharedCollaborative(_) => {
                let share_id = ctx
                    .share
                    .as_ref()
                    .map(|markers| markers.share_id.clone())
                    .filter(|share_id| !share_id.is_empty())
                    .ok_or_else(|| {
                        Error::InvalidPayload(PatchRejection::MissingShareId.to_string())
                    })?;
                self.remote.read_shared(&share_id).await?
            }
            SessionMode::Owner => self.remote.read(id).await?,
            SessionMode::LocalOnly => self.local.read(id).await?,
        };

        let patch = codec::deserialize(&record.project_data)?;
        if self.is_shut_down() {
            return Ok(LoadOutcome::Discarded);
        }
        self.local_version
            .store(record.server_version, Ordering::Release);
        tracing::debug!(id = %record.id, version = record.server_version, "session loaded");
        Ok(LoadOutcome::Loaded(patch))
    }
}

fn rejection_to_error(rejection: PatchRejection, share_id: &str) -> Error {
    match rejection {
        PatchRejection::NoEditorPermission => Error::NoEditorPermission,
        PatchRejection::ShareNotFound => Error::ShareNotFound(share_id.to_string()),
        other => Error::InvalidPayload(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{ConflictPayload, ProjectRecord, ProjectSummary};
    use folio_engine::{
        evaluate_write, Credential, DocumentState, SharePermission, ShareMarkers, WriteDecision,
    };
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    // ------------------------------------------------------------------
    // In-memory gateway double
    // ------------------------------------------------------------------

    #[derive(Default)]
    struct MemoryState {
        records: HashMap<String, ProjectRecord>,
        next_id: u32,
        last_update: Option<UpdateProjectRequest>,
        shared_patches: Vec<SharedPatchRequest>,
    }

    #[derive(Clone, Default)]
    struct MemoryGateway {
        state: Arc<Mutex<MemoryState>>,
        update_delay: Option<Duration>,
    }

    impl MemoryGateway {
        fn seed(&self, record: ProjectRecord) {
            self.state
                .lock()
                .unwrap()
                .records
                .insert(record.id.clone(), record);
        }

        fn last_update(&self) -> Option<UpdateProjectRequest> {
            self.state.lock().unwrap().last_update.clone()
        }

        fn shared_patches(&self) -> Vec<SharedPatchRequest> {
            self.state.lock().unwrap().shared_patches.clone()
        }
    }

    fn record(id: &str, server_version: u64, project_data: serde_json::Value) -> ProjectRecord {
        ProjectRecord {
            id: id.into(),
            name: "Doc A".into(),
            description: None,
            created_by: None,
            project_data,
            tags: vec![],
            is_public: false,
            share_id: None,
            share_permissions: SharePermission::Viewer,
            requires_auth: false,
            local_version: server_version,
            server_version,
            created_at: "2026-01-01T00:00:00Z".into(),
            updated_at: "2026-01-01T00:00:00Z".into(),
        }
    }

    impl StorageGateway for MemoryGateway {
        async fn create(&self, request: CreateProjectRequest) -> Result<ProjectRecord> {
            let mut state = self.state.lock().unwrap();
            state.next_id += 1;
            let id = format!("srv-{}", state.next_id);
            let stored = ProjectRecord {
                name: request.name,
                ..record(&id, INITIAL_VERSION, request.project_data)
            };
            state.records.insert(id, stored.clone());
            Ok(stored)
        }

        async fn read(&self, id: &str) -> Result<ProjectRecord> {
            self.state
                .lock()
                .unwrap()
                .records
                .get(id)
                .cloned()
                .ok_or_else(|| Error::NotFound(id.to_string()))
        }

        async fn update(&self, id: &str, request: UpdateProjectRequest) -> Result<UpdateOutcome> {
            if let Some(delay) = self.update_delay {
                tokio::time::sleep(delay).await;
            }
            let mut state = self.state.lock().unwrap();
            state.last_update = Some(request.clone());
            let stored = state
                .records
                .get_mut(id)
                .ok_or_else(|| Error::NotFound(id.to_string()))?;

            let client_version = request.local_version.unwrap_or_default();
            match evaluate_write(client_version, stored.server_version) {
                WriteDecision::Accept { next } => {
                    if let Some(data) = request.project_data {
                        stored.project_data = data;
                    }
                    if let Some(name) = request.name {
                        stored.name = name;
                    }
                    stored.server_version = next;
                    Ok(UpdateOutcome::Updated(stored.clone()))
                }
                WriteDecision::Stale => Ok(UpdateOutcome::Conflict(ConflictPayload {
                    local_version: client_version,
                    server_version: stored.server_version,
                    server_data: stored.project_data.clone(),
                })),
            }
        }

        async fn delete(&self, id: &str) -> Result<()> {
            self.state.lock().unwrap().records.remove(id);
            Ok(())
        }

        async fn list(&self, _limit: u32, _offset: u32) -> Result<Vec<ProjectSummary>> {
            Ok(Vec::new())
        }
    }

    impl RemoteAccess for MemoryGateway {
        async fn read_public(&self, id: &str) -> Result<ProjectRecord> {
            self.read(id).await
        }

        async fn read_shared(&self, share_id: &str) -> Result<ProjectRecord> {
            let state = self.state.lock().unwrap();
            state
                .records
                .values()
                .find(|r| r.share_id.as_deref() == Some(share_id))
                .cloned()
                .ok_or_else(|| Error::ShareNotFound(share_id.to_string()))
        }

        async fn shared_patch(
            &self,
            project_id: &str,
            request: SharedPatchRequest,
        ) -> Result<ProjectRecord> {
            let mut state = self.state.lock().unwrap();
            state.shared_patches.push(request.clone());
            let stored = state
                .records
                .get_mut(project_id)
                .ok_or_else(|| Error::NotFound(project_id.to_string()))?;
            stored.project_data = request.project_data;
            stored.server_version += 1;
            Ok(stored.clone())
        }
    }

    // ------------------------------------------------------------------
    // Contexts and sessions
    // ------------------------------------------------------------------

    fn owner_ctx() -> AmbientContext {
        AmbientContext {
            credential: Some(Credential {
                user_id: "user-1".into(),
                expires_at: None,
            }),
            share: None,
            now: 5_000,
        }
    }

    fn anonymous_ctx() -> AmbientContext {
        AmbientContext {
            credential: None,
            share: None,
            now: 5_000,
        }
    }

    fn shared_ctx(permission: SharePermission) -> AmbientContext {
        AmbientContext {
            credential: None,
            share: Some(ShareMarkers {
                share_id: "share-1".into(),
                permission,
            }),
            now: 5_000,
        }
    }

    fn session(id: Option<&str>) -> EditorSession {
        EditorSession {
            id: id.map(String::from),
            name: "Doc A".into(),
            document: DocumentState {
                num_pages: 3,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn service(
        local: &MemoryGateway,
        remote: &MemoryGateway,
    ) -> ProjectPersistence<MemoryGateway, MemoryGateway> {
        ProjectPersistence::new(local.clone(), remote.clone())
    }

    // ------------------------------------------------------------------
    // Owner flow
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn first_owner_save_creates_and_adopts_server_id() {
        let (local, remote) = (MemoryGateway::default(), MemoryGateway::default());
        let service = service(&local, &remote);

        let outcome = service.save(&session(None), &owner_ctx()).await.unwrap();
        let SaveOutcome::Created(id) = outcome else {
            panic!("expected creation");
        };
        assert_eq!(id, "srv-1");
        assert_eq!(service.local_version(), INITIAL_VERSION);
        // Nothing was written to the device store.
        assert!(local.state.lock().unwrap().records.is_empty());
    }

    #[tokio::test]
    async fn owner_update_preserves_durable_created_at() {
        let (local, remote) = (MemoryGateway::default(), MemoryGateway::default());
        remote.seed(record("p1", 1, json!({"id": "p1", "createdAt": 111})));
        let service = service(&local, &remote);

        let outcome = service
            .save(&session(Some("p1")), &owner_ctx())
            .await
            .unwrap();
        assert!(matches!(outcome, SaveOutcome::Saved));
        assert_eq!(service.local_version(), 2);

        let sent = remote.last_update().unwrap();
        let sent_data = sent.project_data.unwrap();
        assert_eq!(sent_data["createdAt"], 111);
        assert_eq!(sent_data["updatedAt"], 5_000);
        assert_eq!(sent.local_version, Some(1));
    }

    #[tokio::test]
    async fn stale_save_surfaces_conflict_without_touching_version() {
        let (local, remote) = (MemoryGateway::default(), MemoryGateway::default());
        // The durable copy is already two writes ahead of this client.
        remote.seed(record("p1", 3, json!({"id": "p1", "name": "Theirs"})));
        let service = service(&local, &remote);

        let outcome = service
            .save(&session(Some("p1")), &owner_ctx())
            .await
            .unwrap();
        let SaveOutcome::Conflict {
            local: mine,
            server,
            server_version,
        } = outcome
        else {
            panic!("expected conflict");
        };
        assert_eq!(server_version, 3);
        assert_eq!(server["name"], "Theirs");
        assert_eq!(mine["name"], "Doc A");
        // The tracked version only moves on acceptance.
        assert_eq!(service.local_version(), 1);
    }

    #[tokio::test]
    async fn failed_save_leaves_state_untouched() {
        let (local, remote) = (MemoryGateway::default(), MemoryGateway::default());
        let service = service(&local, &remote);

        let err = service
            .save(&session(Some("missing")), &owner_ctx())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert_eq!(service.local_version(), INITIAL_VERSION);

        // The guard was released; the next save goes through.
        remote.seed(record("p1", 1, json!({"id": "p1", "createdAt": 1})));
        let outcome = service
            .save(&session(Some("p1")), &owner_ctx())
            .await
            .unwrap();
        assert!(matches!(outcome, SaveOutcome::Saved));
    }

    // ------------------------------------------------------------------
    // Local-only flow
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn anonymous_save_goes_to_device_storage() {
        let (local, remote) = (MemoryGateway::default(), MemoryGateway::default());
        let service = service(&local, &remote);

        let outcome = service
            .save(&session(None), &anonymous_ctx())
            .await
            .unwrap();
        assert!(matches!(outcome, SaveOutcome::Created(_)));
        assert_eq!(local.state.lock().unwrap().records.len(), 1);
        assert!(remote.state.lock().unwrap().records.is_empty());

        let outcome = service
            .save(&session(Some("srv-1")), &anonymous_ctx())
            .await
            .unwrap();
        assert!(matches!(outcome, SaveOutcome::SavedLocally));
    }

    #[tokio::test]
    async fn signing_out_redirects_the_next_save_locally() {
        let (local, remote) = (MemoryGateway::default(), MemoryGateway::default());
        remote.seed(record("p1", 1, json!({"id": "p1", "createdAt": 1})));
        let service = service(&local, &remote);

        let outcome = service
            .save(&session(Some("p1")), &owner_ctx())
            .await
            .unwrap();
        assert!(matches!(outcome, SaveOutcome::Saved));

        // Same service, credential gone: mode is re-resolved per call.
        let local_record = record("p1", 1, json!({"id": "p1"}));
        local.seed(local_record);
        let outcome = service
            .save(&session(Some("p1")), &anonymous_ctx())
            .await
            .unwrap();
        assert!(matches!(outcome, SaveOutcome::SavedLocally));
    }

    // ------------------------------------------------------------------
    // Shared flow
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn shared_editor_save_uses_patch_path() {
        let (local, remote) = (MemoryGateway::default(), MemoryGateway::default());
        remote.seed(record("p1", 1, json!({"id": "p1"})));
        let service = service(&local, &remote);

        let outcome = service
            .save(&session(Some("p1")), &shared_ctx(SharePermission::Editor))
            .await
            .unwrap();
        assert!(matches!(outcome, SaveOutcome::SharedPatchAcked));

        let patches = remote.shared_patches();
        assert_eq!(patches.len(), 1);
        assert_eq!(patches[0].share_id, "share-1");
        // No full update went through the owner path.
        assert!(remote.last_update().is_none());
    }

    #[tokio::test]
    async fn shared_viewer_save_is_rejected_locally() {
        let (local, remote) = (MemoryGateway::default(), MemoryGateway::default());
        let service = service(&local, &remote);

        let err = service
            .save(&session(Some("p1")), &shared_ctx(SharePermission::Viewer))
            .await
            .unwrap_err();
        assert_eq!(err, Error::NoEditorPermission);
        assert!(remote.shared_patches().is_empty());
    }

    #[tokio::test]
    async fn shared_save_without_project_id_is_rejected_locally() {
        let (local, remote) = (MemoryGateway::default(), MemoryGateway::default());
        let service = service(&local, &remote);

        let err = service
            .save(&session(None), &shared_ctx(SharePermission::Editor))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidPayload(_)));
        assert!(remote.shared_patches().is_empty());
    }

    // ------------------------------------------------------------------
    // Load
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn owner_load_decodes_and_tracks_version() {
        let (local, remote) = (MemoryGateway::default(), MemoryGateway::default());
        remote.seed(record(
            "p1",
            4,
            json!({
                "id": "p1",
                "name": "Doc A",
                "documentState": {"numPages": 3, "deletedPages": [2]}
            }),
        ));
        let service = service(&local, &remote);

        let outcome = service.load("p1", &owner_ctx()).await.unwrap();
        let LoadOutcome::Loaded(patch) = outcome else {
            panic!("expected load");
        };
        assert_eq!(patch.id, "p1");
        assert!(patch.document.deleted_pages.contains(&2));
        assert_eq!(service.local_version(), 4);
    }

    #[tokio::test]
    async fn shared_load_resolves_the_token_not_the_id() {
        let (local, remote) = (MemoryGateway::default(), MemoryGateway::default());
        let mut shared = record("p9", 2, json!({"id": "p9", "name": "Shared", "documentState": {}}));
        shared.share_id = Some("share-1".into());
        remote.seed(shared);
        let service = service(&local, &remote);

        let outcome = service
            .load("ignored", &shared_ctx(SharePermission::Viewer))
            .await
            .unwrap();
        let LoadOutcome::Loaded(patch) = outcome else {
            panic!("expected load");
        };
        assert_eq!(patch.id, "p9");
    }

    #[tokio::test]
    async fn malformed_durable_snapshot_fails_the_load() {
        let (local, remote) = (MemoryGateway::default(), MemoryGateway::default());
        remote.seed(record("p1", 2, json!({"name": "no id or documentState"})));
        let service = service(&local, &remote);

        let err = service.load("p1", &owner_ctx()).await.unwrap_err();
        assert!(matches!(err, Error::MalformedSnapshot(_)));
        // The tracked version is untouched by the failed load.
        assert_eq!(service.local_version(), INITIAL_VERSION);
    }

    // ------------------------------------------------------------------
    // Single flight and shutdown
    // ------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn concurrent_save_is_dropped_not_queued() {
        let local = MemoryGateway::default();
        let remote = MemoryGateway {
            update_delay: Some(Duration::from_secs(5)),
            ..Default::default()
        };
        remote.seed(record("p1", 1, json!({"id": "p1", "createdAt": 1})));
        let service = Arc::new(service(&local, &remote));

        let first = tokio::spawn({
            let service = Arc::clone(&service);
            async move { service.save(&session(Some("p1")), &owner_ctx()).await }
        });
        // Let the first save reach its artificial network delay.
        tokio::task::yield_now().await;

        let second = service.save(&session(Some("p1")), &owner_ctx()).await.unwrap();
        assert!(matches!(second, SaveOutcome::AlreadyInFlight));

        tokio::time::advance(Duration::from_secs(6)).await;
        let first = first.await.unwrap().unwrap();
        assert!(matches!(first, SaveOutcome::Saved));
    }

    #[tokio::test]
    async fn shutdown_discards_results() {
        let (local, remote) = (MemoryGateway::default(), MemoryGateway::default());
        remote.seed(record("p1", 1, json!({"id": "p1", "createdAt": 1})));
        let service = service(&local, &remote);

        service.shutdown();
        let outcome = service
            .save(&session(Some("p1")), &owner_ctx())
            .await
            .unwrap();
        assert!(matches!(outcome, SaveOutcome::Discarded));
        assert_eq!(service.local_version(), INITIAL_VERSION);

        let outcome = service.load("p1", &owner_ctx()).await.unwrap();
        assert!(matches!(outcome, LoadOutcome::Discarded));
    }
}
