//! Unified error handling for the server.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use folio_engine::PatchRejection;
use serde::Serialize;

/// Body of a 409 response: both sides of the disagreement, so the client
/// can offer a resolution without another round trip.
#[derive(Debug, Clone, Serialize)]
pub struct ConflictBody {
    pub local_version: u64,
    pub server_version: u64,
    pub server_data: serde_json::Value,
}

/// Application error type.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Engine error: {0}")]
    Engine(#[from] folio_engine::Error),

    #[error("Version conflict")]
    Conflict(ConflictBody),

    #[error("{0}")]
    Patch(PatchRejection),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Internal error: {0}")]
    #[allow(dead_code)]
    Internal(String),
}

/// Error response body.
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Conflict and patch rejections carry structured bodies of their own.
        match self {
            AppError::Conflict(body) => {
                return (StatusCode::CONFLICT, Json(body)).into_response();
            }
            AppError::Patch(rejection) => {
                let status = match rejection {
                    PatchRejection::NoEditorPermission => StatusCode::FORBIDDEN,
                    PatchRejection::ShareNotFound => StatusCode::NOT_FOUND,
                    _ => StatusCode::BAD_REQUEST,
                };
                return (status, Json(rejection)).into_response();
            }
            _ => {}
        }

        let (status, error_message, details) = match &self {
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error".to_string(),
                    None,
                )
            }
            AppError::Engine(e) => {
                tracing::warn!("Engine error: {:?}", e);
                let status = match e {
                    folio_engine::Error::NotFound(_) => StatusCode::NOT_FOUND,
                    folio_engine::Error::ShareNotFound(_) => StatusCode::NOT_FOUND,
                    folio_engine::Error::NoEditorPermission => StatusCode::FORBIDDEN,
                    _ => StatusCode::BAD_REQUEST,
                };
                (status, e.to_string(), None)
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone(), None),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone(), None),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string(), None),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    Some(msg.clone()),
                )
            }
            AppError::Conflict(_) | AppError::Patch(_) => unreachable!("handled above"),
        };

        let body = Json(ErrorResponse {
            error: error_message,
            details,
        });

        (status, body).into_response()
    }
}

/// Result type alias for handlers.
pub type Result<T> = std::result::Result<T, AppError>;
