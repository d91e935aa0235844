//! Project endpoint routes.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, patch},
    Json, Router,
};
use serde::Deserialize;

use crate::auth::{AuthUser, OptionalAuthUser};
use crate::error::Result;
use crate::handlers::{
    handle_create, handle_delete, handle_get, handle_get_public, handle_get_share_settings,
    handle_get_shared, handle_list, handle_put_share_settings, handle_search, handle_shared_patch,
    handle_stats, handle_update, CreateProjectRequest, ProjectResponse, ProjectStatsResponse,
    ProjectSummaryResponse, ShareSettingsRequest, ShareSettingsResponse, SharedPatchRequest,
    UpdateProjectRequest, SHARE_ID_HEADER,
};
use crate::AppState;

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 200;
const DEFAULT_SEARCH_LIMIT: i64 = 20;
const MAX_SEARCH_LIMIT: i64 = 50;

/// Pagination query parameters.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Query parameters for name search.
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
    pub limit: Option<i64>,
}

/// Create project routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/projects", get(list_handler).post(create_handler))
        .route("/projects/search", get(search_handler))
        .route("/stats", get(stats_handler))
        .route(
            "/projects/{id}",
            get(get_handler).put(update_handler).delete(delete_handler),
        )
        .route("/projects/{id}/public", get(public_handler))
        .route(
            "/projects/{id}/share-settings",
            get(get_share_settings_handler).put(put_share_settings_handler),
        )
        .route("/projects/shared/{share_id}", get(shared_handler))
        .route(
            "/projects/{id}/shared-editor-patch",
            patch(shared_patch_handler),
        )
}

/// POST /projects - Create a project.
async fn create_handler(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<CreateProjectRequest>,
) -> Result<(StatusCode, Json<ProjectResponse>)> {
    let response = handle_create(&state.pool, &auth.user_id, request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /projects - List the caller's projects.
async fn list_handler(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<ProjectSummaryResponse>>> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);
    let offset = query.offset.unwrap_or(0).max(0);
    let response = handle_list(&state.pool, &auth.user_id, limit, offset).await?;
    Ok(Json(response))
}

/// GET /projects/search - Name search over the caller's projects.
async fn search_handler(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<ProjectSummaryResponse>>> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_SEARCH_LIMIT)
        .clamp(1, MAX_SEARCH_LIMIT);
    let response = handle_search(&state.pool, &auth.user_id, &query.q, limit).await?;
    Ok(Json(response))
}

/// GET /stats - Per-user project aggregates.
async fn stats_handler(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<ProjectStatsResponse>> {
    let response = handle_stats(&state.pool, &auth.user_id).await?;
    Ok(Json(response))
}

/// GET /projects/{id} - Read a project.
async fn get_handler(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<ProjectResponse>> {
    let response = handle_get(&state.pool, &auth.user_id, &id).await?;
    Ok(Json(response))
}

/// GET /projects/{id}/public - Unauthenticated read of a public project.
async fn public_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ProjectResponse>> {
    let response = handle_get_public(&state.pool, &id).await?;
    Ok(Json(response))
}

/// PUT /projects/{id} - Version-checked update.
async fn update_handler(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    Json(request): Json<UpdateProjectRequest>,
) -> Result<Json<ProjectResponse>> {
    let response = handle_update(&state.pool, &auth.user_id, &id, request).await?;
    Ok(Json(response))
}

/// DELETE /projects/{id} - Delete a project.
async fn delete_handler(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    handle_delete(&state.pool, &auth.user_id, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /projects/{id}/share-settings - Read the sharing configuration.
async fn get_share_settings_handler(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<ShareSettingsResponse>> {
    let response = handle_get_share_settings(&state.pool, &auth.user_id, &id).await?;
    Ok(Json(response))
}

/// PUT /projects/{id}/share-settings - Enable or revoke sharing.
async fn put_share_settings_handler(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    Json(request): Json<ShareSettingsRequest>,
) -> Result<Json<ShareSettingsResponse>> {
    let response = handle_put_share_settings(&state.pool, &auth.user_id, &id, request).await?;
    Ok(Json(response))
}

/// GET /projects/shared/{share_id} - Resolve a share token.
async fn shared_handler(
    State(state): State<AppState>,
    OptionalAuthUser(auth): OptionalAuthUser,
    Path(share_id): Path<String>,
) -> Result<Json<ProjectResponse>> {
    let response = handle_get_shared(&state.pool, &share_id, auth.is_some()).await?;
    Ok(Json(response))
}

/// PATCH /projects/{id}/shared-editor-patch - Collaborator write path.
/// No user auth: the share token in the header is the credential.
async fn shared_patch_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<SharedPatchRequest>,
) -> Result<Json<ProjectResponse>> {
    let header_share_id = headers
        .get(SHARE_ID_HEADER)
        .and_then(|value| value.to_str().ok());
    let response = handle_shared_patch(&state.pool, &id, header_share_id, request).await?;
    Ok(Json(response))
}
