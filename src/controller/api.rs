use crate::controller::{ControllerConfig, ControllerInstance, ObjectSource};
use crate::error::{Result, RouteError};
use crate::handler::{ApiFunc, Args, HandlerContext, Kwargs, Value};
use crate::pagination::PaginationError;
use crate::permission::Permission;
use crate::request::RequestContext;
use async_trait::async_trait;
use std::sync::Arc;

/// The default controller instance: one per request, bound to the request
/// and the arguments the route function forwarded.
pub struct ApiController {
    config: Arc<ControllerConfig>,
    request: RequestContext,
    args: Args,
    kwargs: Kwargs,
    permissions: Vec<Arc<dyn Permission>>,
    objects: Option<Arc<dyn ObjectSource>>,
}

impl ApiController {
    pub fn new(
        config: Arc<ControllerConfig>,
        request: RequestContext,
        args: Args,
        kwargs: Kwargs,
    ) -> Self {
        let permissions = config.permission_classes().to_vec();
        let objects = config.object_source().cloned();
        Self {
            config,
            request,
            args,
            kwargs,
            permissions,
            objects,
        }
    }

    /// Route-level permission classes replacing the controller's.
    #[must_use]
    pub fn with_permissions(mut self, permissions: Vec<Arc<dyn Permission>>) -> Self {
        self.permissions = permissions;
        self
    }

    /// Route-level object source replacing the controller's.
    #[must_use]
    pub fn with_objects(mut self, objects: Arc<dyn ObjectSource>) -> Self {
        self.objects = Some(objects);
        self
    }

    pub fn request(&self) -> &RequestContext {
        &self.request
    }

    pub fn kwargs(&self) -> &Kwargs {
        &self.kwargs
    }

    pub fn config(&self) -> &Arc<ControllerConfig> {
        &self.config
    }

    fn context(&self) -> HandlerContext {
        HandlerContext::new(
            self.request.clone(),
            self.args.clone(),
            self.kwargs.clone(),
            Arc::clone(self.config.services()),
        )
    }

    /// Looks up the target of an object route and checks object permissions.
    pub fn get_object(&self) -> Result<Value> {
        let field = self.config.lookup_field_name();
        let lookup = self
            .kwargs
            .get(field)
            .ok_or_else(|| RouteError::MissingArgument {
                name: field.to_string(),
            })?;
        let objects = self.objects.as_ref().ok_or_else(|| {
            RouteError::Internal(format!(
                "controller `{}` has no object source",
                self.config.name()
            ))
        })?;
        let object = objects.get(lookup)?.ok_or_else(|| RouteError::NotFound {
            lookup: format!("{field}={lookup}"),
        })?;
        self.check_object_permissions(&object)?;
        Ok(object)
    }

    pub fn check_object_permissions(&self, object: &Value) -> Result<()> {
        for permission in &self.permissions {
            if !permission.has_object_permission(&self.request, object) {
                let denial = permission.denial(&self.request);
                tracing::debug!(controller = self.config.name(), error = %denial, "object permission denied");
                return Err(denial.into());
            }
        }
        Ok(())
    }

    fn paginate(&self, output: Value) -> Result<Value> {
        let items = match output {
            Value::Array(items) => items,
            other => {
                let kind = match other {
                    Value::Null => "null",
                    Value::Bool(_) => "a boolean",
                    Value::Number(_) => "a number",
                    Value::String(_) => "a string",
                    _ => "an object",
                };
                return Err(PaginationError::NotAList(kind.to_string()).into());
            }
        };
        let page = self.config.paginator().paginate(items, &self.request)?;
        Ok(serde_json::to_value(page)?)
    }
}

#[async_trait]
impl ControllerInstance for ApiController {
    fn check_permissions(&self) -> Result<()> {
        for permission in &self.permissions {
            if !permission.has_permission(&self.request) {
                let denial = permission.denial(&self.request);
                tracing::debug!(controller = self.config.name(), error = %denial, "permission denied");
                return Err(denial.into());
            }
        }
        Ok(())
    }

    fn run_view_func(&self, handler: &ApiFunc) -> Result<Value> {
        handler.call(self.context())
    }

    async fn async_run_view_func(&self, handler: &ApiFunc) -> Result<Value> {
        handler.call_async(self.context()).await
    }

    fn run_object_view_func(&self, handler: &ApiFunc) -> Result<Value> {
        let object = self.get_object()?;
        handler.call(self.context().with_object(object))
    }

    async fn async_run_object_view_func(&self, handler: &ApiFunc) -> Result<Value> {
        let object = self.get_object()?;
        handler.call_async(self.context().with_object(object)).await
    }

    fn run_list_view_func(&self, handler: &ApiFunc) -> Result<Value> {
        let output = handler.call(self.context())?;
        self.paginate(output)
    }

    async fn async_run_list_view_func(&self, handler: &ApiFunc) -> Result<Value> {
        let output = handler.call_async(self.context()).await?;
        self.paginate(output)
    }
}
