use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::io;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("not a directory: {0}")]
    NotADirectory(String),

    #[error("not a file: {0}")]
    NotAFile(String),

    #[error("invalid name: {0}")]
    InvalidName(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("path escapes storage root: {0}")]
    PathEscape(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("{0}")]
    General(String),
}

impl AppError {
    /// Classifies an I/O failure against the relative path it concerns.
    pub fn from_io(err: io::Error, path: &str) -> Self {
        match err.kind() {
            // an ancestor is a plain file, so the path does not exist
            io::ErrorKind::NotFound | io::ErrorKind::NotADirectory => {
                Self::NotFound(display_path(path))
            }
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(display_path(path)),
            _ => Self::Io(err),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::NotADirectory(_)
            | Self::NotAFile(_)
            | Self::InvalidName(_)
            | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::PermissionDenied(_) | Self::PathEscape(_) => StatusCode::FORBIDDEN,
            Self::Io(_) | Self::General(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short message safe to hand to a client; carries no host paths.
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not found",
            Self::NotADirectory(_) => "not a directory",
            Self::NotAFile(_) => "not a file",
            Self::InvalidName(_) => "invalid name",
            Self::PermissionDenied(_) => "permission denied",
            Self::PathEscape(_) => "path outside storage root",
            Self::BadRequest(_) => "bad request",
            Self::Io(_) | Self::General(_) => "i/o error",
        }
    }

    /// Logs the full error and turns it into the generic client response for
    /// the endpoint named by `context`.
    pub fn respond(self, context: &'static str) -> ApiError {
        let message = match &self {
            Self::BadRequest(message) => message.clone(),
            _ => context.to_string(),
        };
        if self.status().is_server_error() {
            tracing::error!(error = %self, "{context}");
        } else {
            tracing::warn!(error = %self, "{context}");
        }
        ApiError {
            status: self.status(),
            message,
        }
    }
}

fn display_path(path: &str) -> String {
    if path.is_empty() {
        "/".to_string()
    } else {
        path.to_string()
    }
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}
