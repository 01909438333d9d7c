use crate::pagination::PaginationError;
use crate::permission::PermissionError;
use axum::{
    Json,
    http::StatusCode as HttpStatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RouteError>;

#[derive(Debug, Error)]
pub enum RouteError {
    #[error(transparent)]
    PermissionDenied(#[from] PermissionError),

    #[error("Not found: {lookup}")]
    NotFound { lookup: String },

    #[error("Missing argument: {name}")]
    MissingArgument { name: String },

    #[error("Invalid argument `{name}`: {message}")]
    InvalidArgument { name: String, message: String },

    #[error("Invalid signature for `{handler}`: {message}")]
    InvalidSignature { handler: String, message: String },

    #[error("Route already registered: {method} {path}")]
    DuplicateRoute { method: String, path: String },

    #[error("Dependency not found: {type_name}")]
    DependencyNotFound { type_name: String },

    #[error(transparent)]
    Pagination(#[from] PaginationError),

    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Handler(#[from] anyhow::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RouteError {
    pub fn status_code(&self) -> HttpStatusCode {
        match self {
            RouteError::PermissionDenied(PermissionError::Unauthorized(_)) => {
                HttpStatusCode::UNAUTHORIZED
            }
            RouteError::PermissionDenied(PermissionError::Forbidden(_)) => {
                HttpStatusCode::FORBIDDEN
            }
            RouteError::NotFound { .. } => HttpStatusCode::NOT_FOUND,
            RouteError::MissingArgument { .. } | RouteError::InvalidArgument { .. } => {
                HttpStatusCode::UNPROCESSABLE_ENTITY
            }
            RouteError::Pagination(PaginationError::EmptyPage(_)) => HttpStatusCode::NOT_FOUND,
            RouteError::Pagination(_) => HttpStatusCode::BAD_REQUEST,
            RouteError::InvalidSignature { .. }
            | RouteError::DuplicateRoute { .. }
            | RouteError::DependencyNotFound { .. }
            | RouteError::Serialization(_)
            | RouteError::Handler(_)
            | RouteError::Internal(_) => HttpStatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RouteError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let detail = if status.is_server_error() {
            tracing::error!(error = %self, "route failed");
            "Internal Server Error".to_string()
        } else {
            self.to_string()
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}
