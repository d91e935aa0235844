//! Remote backend gateway over HTTP.
//!
//! Speaks the project persistence protocol: CRUD plus the public read,
//! share-token resolution and the reduced-privilege shared-editor patch.
//! HTTP statuses are mapped to engine errors here so the rest of the
//! client never sees a status code.

use crate::gateway::{
    ConflictPayload, CreateProjectRequest, ProjectRecord, ProjectSummary, RemoteAccess,
    SharedPatchRequest, StorageGateway, UpdateOutcome, UpdateProjectRequest,
};
use folio_engine::error::Result;
use folio_engine::Error;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;

/// Header carrying the share token on the shared-editor patch path.
pub const SHARE_ID_HEADER: &str = "x-share-id";
/// Header marking a request as coming from a shared-editor session.
pub const EDITOR_MODE_HEADER: &str = "x-editor-mode";

/// Connection settings for the remote backend.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Base URL without a trailing slash, e.g. `https://api.folio.dev`.
    pub base_url: String,
    /// Bearer token for authenticated routes. Public and shared routes
    /// work without one.
    pub token: Option<String>,
}

/// HTTP implementation of [`StorageGateway`] and [`RemoteAccess`].
#[derive(Debug, Clone)]
pub struct RemoteGateway {
    http: reqwest::Client,
    config: RemoteConfig,
}

impl RemoteGateway {
    pub fn new(config: RemoteConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url.trim_end_matches('/'))
    }

    fn auth_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(token) = &self.config.token {
            if let Ok(value) = HeaderValue::from_str(&format!("Bearer {token}")) {
                headers.insert(AUTHORIZATION, value);
            }
        }
        headers
    }

    async fn decode<T: DeserializeOwned>(&self, response: Response) -> Result<T> {
        response
            .json::<T>()
            .await
            .map_err(|e| Error::Storage(format!("malformed response body: {e}")))
    }
}

impl StorageGateway for RemoteGateway {
    async fn create(&self, request: CreateProjectRequest) -> Result<ProjectRecord> {
        let response = self
            .http
            .post(self.url("/projects"))
            .headers(self.auth_headers())
            .json(&request)
            .send()
            .await
            .map_err(transport_err)?;

        let response = check_status(response, "").await?;
        let record: ProjectRecord = self.decode(response).await?;
        tracing::debug!(id = %record.id, "created remote project");
        Ok(record)
    }

    async fn read(&self, id: &str) -> Result<ProjectRecord> {
        let response = self
            .http
            .get(self.url(&format!("/projects/{id}")))
            .headers(self.auth_headers())
            .send()
            .await
            .map_err(transport_err)?;

        let response = check_status(response, id).await?;
        self.decode(response).await
    }

    async fn update(&self, id: &str, request: UpdateProjectRequest) -> Result<UpdateOutcome> {
        let response = self
            .http
            .put(self.url(&format!("/projects/{id}")))
            .headers(self.auth_headers())
            .json(&request)
            .send()
            .await
            .map_err(transport_err)?;

        // A stale version is a legitimate outcome, not an error.
        if response.status() == StatusCode::CONFLICT {
            let payload: ConflictPayload = self.decode(response).await?;
            tracing::info!(
                id,
                local_version = payload.local_version,
                server_version = payload.server_version,
                "save rejected as stale"
            );
            return Ok(UpdateOutcome::Conflict(payload));
        }

        let response = check_status(response, id).await?;
        Ok(UpdateOutcome::Updated(self.decode(response).await?))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let response = self
            .http
            .delete(self.url(&format!("/projects/{id}")))
            .headers(self.auth_headers())
            .send()
            .await
            .map_err(transport_err)?;

        // Deleting an already-deleted project is fine.
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        check_status(response, id).await?;
        Ok(())
    }

    async fn list(&self, limit: u32, offset: u32) -> Result<Vec<ProjectSummary>> {
        let response = self
            .http
            .get(self.url(&format!("/projects?limit={limit}&offset={offset}")))
            .headers(self.auth_headers())
            .send()
            .await
            .map_err(transport_err)?;

        let response = check_status(response, "").await?;
        self.decode(response).await
    }
}

impl RemoteAccess for RemoteGateway {
    async fn read_public(&self, id: &str) -> Result<ProjectRecord> {
        let response = self
            .http
            .get(self.url(&format!("/projects/{id}/public")))
            .send()
            .await
            .map_err(transport_err)?;

        let response = check_status(response, id).await?;
        self.decode(response).await
    }

    async fn read_shared(&self, share_id: &str) -> Result<ProjectRecord> {
        let response = self
            .http
            .get(self.url(&format!("/projects/shared/{share_id}")))
            .send()
            .await
            .map_err(transport_err)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(Error::ShareNotFound(share_id.to_string()));
        }
        let response = check_status(response, share_id).await?;
        self.decode(response).await
    }

    async fn shared_patch(
        &self,
        project_id: &str,
        request: SharedPatchRequest,
    ) -> Result<ProjectRecord> {
        let response = self
            .http
            .patch(self.url(&format!("/projects/{project_id}/shared-editor-patch")))
            .header(SHARE_ID_HEADER, &request.share_id)
            .header(EDITOR_MODE_HEADER, "true")
            .json(&request)
            .send()
            .await
            .map_err(transport_err)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(Error::ShareNotFound(request.share_id));
        }
        let response = check_status(response, project_id).await?;
        self.decode(response).await
    }
}

fn transport_err(e: reqwest::Error) -> Error {
    Error::NetworkFailure(e.to_string())
}

/// Map a non-success status to an engine error. `subject` is the id the
/// request was about, used for the not-found message.
async fn check_status(response: Response, subject: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let detail = response.text().await.unwrap_or_default();
    Err(match status {
        StatusCode::NOT_FOUND => Error::NotFound(subject.to_string()),
        StatusCode::FORBIDDEN => Error::NoEditorPermission,
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            Error::InvalidPayload(detail)
        }
        _ => Error::Storage(format!("{status}: {detail}")),
    })
}
