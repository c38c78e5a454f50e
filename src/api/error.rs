use crate::auth::AuthError;
use crate::documents::DocumentError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

const INTERNAL_MESSAGE: &str = "Server error, please try again later";

/// Error type returned by every handler; renders as `{ "message": ... }`.
#[derive(Debug)]
pub enum AppError {
    /// A document operation failed.
    Documents(DocumentError),
    /// An account or token operation failed.
    Auth(AuthError),
}

impl AppError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Documents(DocumentError::Validation(message.into()))
    }

    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            Self::Documents(err) => match err {
                DocumentError::Validation(_) => (StatusCode::BAD_REQUEST, err.to_string()),
                DocumentError::Authorization => (StatusCode::UNAUTHORIZED, err.to_string()),
                DocumentError::NotFound => (StatusCode::NOT_FOUND, err.to_string()),
                DocumentError::RemoteService(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
                }
                DocumentError::Storage(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MESSAGE.to_string())
                }
            },
            Self::Auth(err) => match err {
                AuthError::Validation(_) | AuthError::UserExists => {
                    (StatusCode::BAD_REQUEST, err.to_string())
                }
                AuthError::InvalidCredentials | AuthError::Unauthorized(_) => {
                    (StatusCode::UNAUTHORIZED, err.to_string())
                }
                AuthError::Storage(_) | AuthError::Internal(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MESSAGE.to_string())
                }
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        if status.is_server_error() {
            match &self {
                Self::Documents(err) => tracing::error!(error = %err, "Request failed"),
                Self::Auth(err) => tracing::error!(error = %err, "Request failed"),
            }
        }
        (status, Json(json!({ "message": message }))).into_response()
    }
}

impl From<DocumentError> for AppError {
    fn from(inner: DocumentError) -> Self {
        Self::Documents(inner)
    }
}

impl From<AuthError> for AppError {
    fn from(inner: AuthError) -> Self {
        Self::Auth(inner)
    }
}
