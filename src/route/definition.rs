use crate::controller::{ApiController, ControllerConfig, ControllerInstance, ObjectSource};
use crate::error::Result;
use crate::handler::{Args, Kwargs};
use crate::permission::Permission;
use crate::request::RequestContext;
use crate::signature::TypeRef;
use axum::http::Method;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Which execution strategy a route dispatches to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, strum_macros::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RouteKind {
    /// `run_view_func`
    #[default]
    Plain = 0,
    /// `run_object_view_func`
    Object = 1,
    /// `run_list_view_func`
    List = 2,
}

/// What a route function needs from its route at request time.
pub trait RouteDefinition: Send + Sync + 'static {
    /// Builds the controller instance bound to one request.
    fn create_view_func_instance(
        &self,
        request: RequestContext,
        args: Args,
        kwargs: Kwargs,
    ) -> Result<Arc<dyn ControllerInstance>>;

    /// The request schema documented on list routes.
    fn resolve_paginated_request_schema(&self) -> TypeRef;
}

/// One endpoint of a controller.
///
/// Permissions and the object source fall back to the controller's when the
/// route does not set its own.
pub struct Route {
    controller: Arc<ControllerConfig>,
    path: String,
    methods: Vec<Method>,
    kind: RouteKind,
    url_name: Option<String>,
    permissions: Option<Vec<Arc<dyn Permission>>>,
    objects: Option<Arc<dyn ObjectSource>>,
}

impl Route {
    pub fn new(controller: Arc<ControllerConfig>, method: Method, path: impl Into<String>) -> Self {
        Self {
            controller,
            path: path.into(),
            methods: vec![method],
            kind: RouteKind::Plain,
            url_name: None,
            permissions: None,
            objects: None,
        }
    }

    pub fn get(controller: Arc<ControllerConfig>, path: impl Into<String>) -> Self {
        Self::new(controller, Method::GET, path)
    }

    pub fn post(controller: Arc<ControllerConfig>, path: impl Into<String>) -> Self {
        Self::new(controller, Method::POST, path)
    }

    pub fn put(controller: Arc<ControllerConfig>, path: impl Into<String>) -> Self {
        Self::new(controller, Method::PUT, path)
    }

    pub fn patch(controller: Arc<ControllerConfig>, path: impl Into<String>) -> Self {
        Self::new(controller, Method::PATCH, path)
    }

    pub fn delete(controller: Arc<ControllerConfig>, path: impl Into<String>) -> Self {
        Self::new(controller, Method::DELETE, path)
    }

    /// Also answer `method` on the same path.
    #[must_use]
    pub fn method(mut self, method: Method) -> Self {
        if !self.methods.contains(&method) {
            self.methods.push(method);
        }
        self
    }

    #[must_use]
    pub fn kind(mut self, kind: RouteKind) -> Self {
        self.kind = kind;
        self
    }

    #[must_use]
    pub fn retrieve_object(self) -> Self {
        self.kind(RouteKind::Object)
    }

    #[must_use]
    pub fn paginated(self) -> Self {
        self.kind(RouteKind::List)
    }

    #[must_use]
    pub fn url_name(mut self, url_name: impl Into<String>) -> Self {
        self.url_name = Some(url_name.into());
        self
    }

    #[must_use]
    pub fn permissions(mut self, permissions: Vec<Arc<dyn Permission>>) -> Self {
        self.permissions = Some(permissions);
        self
    }

    #[must_use]
    pub fn objects(mut self, objects: impl ObjectSource) -> Self {
        self.objects = Some(Arc::new(objects));
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    pub fn route_kind(&self) -> RouteKind {
        self.kind
    }

    pub fn name(&self) -> Option<&str> {
        self.url_name.as_deref()
    }

    pub fn controller(&self) -> &Arc<ControllerConfig> {
        &self.controller
    }
}

impl RouteDefinition for Route {
    fn create_view_func_instance(
        &self,
        request: RequestContext,
        args: Args,
        kwargs: Kwargs,
    ) -> Result<Arc<dyn ControllerInstance>> {
        let mut instance = ApiController::new(Arc::clone(&self.controller), request, args, kwargs);
        if let Some(permissions) = &self.permissions {
            instance = instance.with_permissions(permissions.clone());
        }
        if let Some(objects) = &self.objects {
            instance = instance.with_objects(Arc::clone(objects));
        }
        Ok(Arc::new(instance))
    }

    fn resolve_paginated_request_schema(&self) -> TypeRef {
        self.controller.paginator().input_schema()
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("controller", &self.controller.name())
            .field("path", &self.path)
            .field("methods", &self.methods)
            .field("kind", &self.kind)
            .field("url_name", &self.url_name)
            .finish()
    }
}
