use crate::request::RequestContext;
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum PermissionError {
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),
}

/// A permission class evaluated by the controller instance before the
/// handler runs.
///
/// `has_object_permission` is only consulted by object routes, after the
/// object has been retrieved.
pub trait Permission: Send + Sync + 'static {
    fn has_permission(&self, request: &RequestContext) -> bool;

    fn has_object_permission(&self, _request: &RequestContext, _object: &Value) -> bool {
        true
    }

    /// The error raised when this permission denies the request.
    fn denial(&self, request: &RequestContext) -> PermissionError {
        if request.is_authenticated() {
            PermissionError::Forbidden(
                "You do not have permission to perform this action.".to_string(),
            )
        } else {
            PermissionError::Unauthorized(
                "Authentication credentials were not provided.".to_string(),
            )
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAny;

impl Permission for AllowAny {
    fn has_permission(&self, _request: &RequestContext) -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IsAuthenticated;

impl Permission for IsAuthenticated {
    fn has_permission(&self, request: &RequestContext) -> bool {
        request.is_authenticated()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IsAdminUser;

impl Permission for IsAdminUser {
    fn has_permission(&self, request: &RequestContext) -> bool {
        request.identity().is_some_and(|identity| identity.is_staff)
    }
}

/// Anyone may read; writes need an identity.
#[derive(Debug, Clone, Copy, Default)]
pub struct IsAuthenticatedOrReadOnly;

impl Permission for IsAuthenticatedOrReadOnly {
    fn has_permission(&self, request: &RequestContext) -> bool {
        request.is_safe_method() || request.is_authenticated()
    }
}
