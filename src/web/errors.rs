use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::{error, warn};

use crate::blob::BlobError;

/// Application-level error for HTTP handlers.
///
/// Maps onto the JSON error envelope `{status:"error", message, error?}`;
/// the `error` detail field is attached by the handler layer only in
/// development mode.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("No authorization token provided")]
    MissingToken,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("{0}")]
    NotFound(String),

    #[error("Database error")]
    Database(#[from] sqlx::Error),

    #[error("File upload failed")]
    Blob(#[from] BlobError),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::MissingToken | ApiError::InvalidToken | ApiError::InvalidCredentials => {
                StatusCode::UNAUTHORIZED
            }
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Database(_) | ApiError::Blob(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Internal detail for the development-mode `error` field. Client-safe
    /// variants carry no extra detail beyond their message.
    fn detail(&self) -> Option<String> {
        match self {
            ApiError::Database(err) => Some(err.to_string()),
            ApiError::Blob(err) => Some(err.to_string()),
            ApiError::Internal(err) => Some(format!("{err:#}")),
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        match &self {
            ApiError::Database(err) => error!(?err, "database error"),
            ApiError::Blob(err) => error!(?err, "blob storage error"),
            ApiError::Internal(err) => error!(?err, "unexpected error"),
            ApiError::MissingToken => warn!("request rejected: missing bearer token"),
            ApiError::InvalidToken => warn!("request rejected: invalid or expired token"),
            _ => {}
        }

        let mut body = json!({
            "status": "error",
            "message": self.to_string(),
        });
        if dev_mode() {
            if let Some(detail) = self.detail() {
                body["error"] = json!(detail);
            }
        }

        (status, Json(body)).into_response()
    }
}

// `IntoResponse` has no access to application state, so the dev flag is
// published once at startup instead of threaded through every handler.
static DEV_MODE: std::sync::OnceLock<bool> = std::sync::OnceLock::new();

pub fn set_dev_mode(enabled: bool) {
    let _ = DEV_MODE.set(enabled);
}

fn dev_mode() -> bool {
    *DEV_MODE.get().unwrap_or(&false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_maps_to_bad_request() {
        let err = ApiError::Validation("title is required".into());
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn auth_errors_share_unauthorized_status() {
        assert_eq!(ApiError::MissingToken.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::InvalidToken.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ApiError::InvalidCredentials.status(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn not_found_maps_to_404() {
        let err = ApiError::NotFound("Project not found".into());
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "Project not found");
    }

    #[test]
    fn database_errors_hide_detail_in_message() {
        let err = ApiError::Database(sqlx::Error::RowNotFound);
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "Database error");
    }
}
