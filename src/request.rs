use axum::http::{HeaderMap, Method, Request, Uri, request::Parts};
use std::sync::Arc;

/// The authenticated caller, placed in the request extensions by whatever
/// authentication layer runs in front of the routes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub subject: String,
    pub is_staff: bool,
}

impl Identity {
    pub fn user(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            is_staff: false,
        }
    }

    pub fn staff(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            is_staff: true,
        }
    }
}

/// Request head shared by the controller instance, permissions and handlers.
///
/// The body is consumed while binding arguments, so only the head is kept.
#[derive(Debug, Clone)]
pub struct RequestContext {
    parts: Arc<Parts>,
}

impl RequestContext {
    pub fn method(&self) -> &Method {
        &self.parts.method
    }

    pub fn uri(&self) -> &Uri {
        &self.parts.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.parts.headers
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.parts.extensions.get::<Identity>()
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity().is_some()
    }

    /// GET, HEAD and OPTIONS.
    pub fn is_safe_method(&self) -> bool {
        matches!(*self.method(), Method::GET | Method::HEAD | Method::OPTIONS)
    }
}

impl From<Parts> for RequestContext {
    fn from(parts: Parts) -> Self {
        Self {
            parts: Arc::new(parts),
        }
    }
}

impl From<Request<()>> for RequestContext {
    fn from(request: Request<()>) -> Self {
        request.into_parts().0.into()
    }
}
