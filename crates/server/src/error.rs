//! Unified error handling for HTTP handlers.
//!
//! Every error renders as JSON `{"error": "..."}`. Server-side failures are
//! logged, sent to Sentry, and reported to the client without details.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::pdf::PdfError;
use crate::services::{AuthError, IngestError, UploadError};

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(RepositoryError),

    /// Resource not found.
    #[error("{0}")]
    NotFound(String),

    /// User is not authenticated or sent wrong credentials.
    #[error("{0}")]
    Unauthorized(String),

    /// User lacks permission.
    #[error("{0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("{0}")]
    BadRequest(String),

    /// Uniqueness violation.
    #[error("{0}")]
    Conflict(String),

    /// Verb exists on the route but is not supported.
    #[error("{0}")]
    NotImplemented(String),

    /// The Belgrano Ahorro API failed.
    #[error("{0}")]
    Upstream(String),

    /// Server-side failure whose message is safe to show.
    #[error("{0}")]
    Failed(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Status code for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Database(_) | Self::Failed(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl From<RepositoryError> for AppError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::NotFound => Self::NotFound("No encontrado".to_string()),
            RepositoryError::Conflict(what) => Self::Conflict(what),
            other => Self::Database(other),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::InvalidCredentials | AuthError::InvalidEmail(_) => {
                Self::Unauthorized("Email o contraseña incorrectos".to_string())
            }
            AuthError::InactiveUser => Self::Forbidden("Usuario inactivo".to_string()),
            AuthError::WeakPassword(msg) => Self::BadRequest(msg),
            AuthError::PasswordMismatch => {
                Self::BadRequest("Las contraseñas no coinciden".to_string())
            }
            AuthError::Repository(e) => e.into(),
            AuthError::PasswordHash => Self::Internal("password hashing failed".to_string()),
        }
    }
}

impl From<IngestError> for AppError {
    fn from(e: IngestError) -> Self {
        match e {
            IngestError::Repository(e) => e.into(),
            other => Self::BadRequest(other.to_string()),
        }
    }
}

impl From<UploadError> for AppError {
    fn from(e: UploadError) -> Self {
        if e.is_client_error() {
            return Self::BadRequest(e.to_string());
        }
        match e {
            UploadError::Repository(e) => Self::Database(e),
            UploadError::Io(e) => Self::Internal(format!("upload storage: {e}")),
            UploadError::Task(e) => Self::Internal(format!("image processing: {e}")),
            other => Self::Failed(other.to_string()),
        }
    }
}

impl From<PdfError> for AppError {
    fn from(e: PdfError) -> Self {
        Self::Internal(e.to_string())
    }
}

impl From<tower_sessions::session::Error> for AppError {
    fn from(e: tower_sessions::session::Error) -> Self {
        Self::Internal(format!("session: {e}"))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() && !matches!(self, Self::NotImplemented(_)) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Database(_) | Self::Internal(_) => "Error interno del servidor".to_string(),
            _ => self.to_string(),
        };

        (status, Json(json!({"error": message}))).into_response()
    }
}

/// Set the Sentry user context for the logged-in user.
pub fn set_sentry_user(user_id: i64, email: &str) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: Some(email.to_string()),
            ..Default::default()
        }));
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    async fn body(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(AppError::NotFound(String::new()).status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::Conflict(String::new()).status(), StatusCode::CONFLICT);
        assert_eq!(
            AppError::NotImplemented(String::new()).status(),
            StatusCode::NOT_IMPLEMENTED
        );
        assert_eq!(AppError::Upstream(String::new()).status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_auth_error_mapping() {
        let err: AppError = AuthError::InactiveUser.into();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
        let err: AppError = AuthError::InvalidCredentials.into();
        assert_eq!(err.to_string(), "Email o contraseña incorrectos");
    }

    #[tokio::test]
    async fn test_internal_details_hidden() {
        let (status, json) = body(AppError::Internal("disk on fire".to_string())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"], "Error interno del servidor");

        let (status, json) = body(UploadError::EntityNotUpdated.into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"], "Failed to update entity with image");
    }

    #[tokio::test]
    async fn test_client_errors_keep_message() {
        let (status, json) = body(UploadError::InvalidFileType.into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Invalid file type");
    }
}
