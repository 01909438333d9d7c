//! Registration of route functions and their mounting on an axum router.
//!
//! [`ApiRouter::add`] runs [`RouteFunction::from_route`] once per route and
//! keeps the resulting view. [`ApiRouter::into_router`] binds every request to
//! keyword arguments following the view's exposed signature:
//!
//! - query-marker parameters receive the whole query string as an object;
//! - other parameters are read from the path, then the query string, and
//!   values are coerced by their scalar annotation;
//! - the first parameter with a non-scalar annotation receives the JSON body;
//! - anything else falls back to its default or is reported missing.

use crate::error::{Result, RouteError};
use crate::handler::{ApiFunc, Kwargs, Value};
use crate::request::RequestContext;
use crate::route::{ContextView, Route, RouteFunction, RouteKind};
use crate::signature::{Param, ParamDefault, ParamKind, Signature, TypeRef};
use axum::extract::rejection::PathRejection;
use axum::extract::{FromRequestParts, Path, Query, Request};
use axum::http::Method;
use axum::response::{IntoResponse, Response};
use axum::routing::{MethodFilter, MethodRouter};
use axum::{Json, Router};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Largest JSON body accepted by mounted routes.
pub const DEFAULT_BODY_LIMIT: usize = 2 * 1024 * 1024;

/// A route after registration.
pub struct RegisteredRoute {
    path: String,
    methods: Vec<Method>,
    filter: MethodFilter,
    url_name: Option<String>,
    view: ContextView,
    function: Arc<RouteFunction>,
}

impl RegisteredRoute {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    pub fn view(&self) -> &ContextView {
        &self.view
    }

    pub fn function(&self) -> &Arc<RouteFunction> {
        &self.function
    }
}

/// Documentation record for one registered route.
#[derive(Debug, Clone, Serialize)]
pub struct OperationDoc {
    pub operation_id: String,
    pub path: String,
    pub methods: Vec<String>,
    pub kind: RouteKind,
    pub is_async: bool,
    pub parameters: Vec<Param>,
}

pub struct ApiRouter {
    routes: Vec<RegisteredRoute>,
    body_limit: usize,
}

impl ApiRouter {
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }

    #[must_use]
    pub fn body_limit(mut self, body_limit: usize) -> Self {
        self.body_limit = body_limit;
        self
    }

    /// Registers `api_func` under `route`, using the route's kind to pick the
    /// route function.
    pub fn add(&mut self, route: Route, api_func: ApiFunc) -> Result<&mut Self> {
        let path = route.path().to_string();
        let methods = route.methods().to_vec();
        for method in &methods {
            let taken = self
                .routes
                .iter()
                .any(|existing| existing.path == path && existing.methods.contains(method));
            if taken {
                return Err(RouteError::DuplicateRoute {
                    method: method.to_string(),
                    path,
                });
            }
        }
        let filter = method_filter(&methods)?;
        let url_name = route.name().map(str::to_string);
        let kind = route.route_kind();

        let (view, function) = RouteFunction::from_route(kind, api_func, Arc::new(route))?;
        tracing::debug!(path = %path, methods = ?methods, kind = %kind, "route added");
        self.routes.push(RegisteredRoute {
            path,
            methods,
            filter,
            url_name,
            view,
            function,
        });
        Ok(self)
    }

    pub fn routes(&self) -> &[RegisteredRoute] {
        &self.routes
    }

    pub fn operations(&self) -> Vec<OperationDoc> {
        self.routes
            .iter()
            .map(|route| OperationDoc {
                operation_id: route
                    .url_name
                    .clone()
                    .unwrap_or_else(|| route.view.name().to_string()),
                path: route.path.clone(),
                methods: route.methods.iter().map(ToString::to_string).collect(),
                kind: route.function.kind(),
                is_async: route.view.is_async(),
                parameters: route.view.signature().params().to_vec(),
            })
            .collect()
    }

    /// Mounts every registered view. Sync views run on the blocking pool.
    pub fn into_router<S>(self) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        let body_limit = self.body_limit;
        let mut by_path: BTreeMap<String, MethodRouter<S>> = BTreeMap::new();
        for route in self.routes {
            let view = route.view;
            let handler = move |request: Request| {
                let view = view.clone();
                async move { serve(view, request, body_limit).await }
            };
            let method_router = match by_path.remove(&route.path) {
                Some(existing) => existing.on(route.filter, handler),
                None => axum::routing::on(route.filter, handler),
            };
            by_path.insert(route.path, method_router);
        }
        by_path
            .into_iter()
            .fold(Router::new(), |router, (path, method_router)| {
                router.route(&path, method_router)
            })
    }
}

impl Default for ApiRouter {
    fn default() -> Self {
        Self::new()
    }
}

fn method_filter(methods: &[Method]) -> Result<MethodFilter> {
    let mut filters = methods.iter().map(|method| {
        MethodFilter::try_from(method.clone()).map_err(|e| RouteError::InvalidArgument {
            name: "method".to_string(),
            message: e.to_string(),
        })
    });
    let first = filters.next().ok_or_else(|| RouteError::InvalidArgument {
        name: "method".to_string(),
        message: "a route needs at least one method".to_string(),
    })??;
    filters.try_fold(first, |combined, filter| Ok(combined.or(filter?)))
}

async fn serve(view: ContextView, request: Request, body_limit: usize) -> Response {
    match dispatch(view, request, body_limit).await {
        Ok(value) => Json(value).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn dispatch(view: ContextView, request: Request, body_limit: usize) -> Result<Value> {
    let (mut parts, body) = request.into_parts();
    let path_params = match Path::<HashMap<String, String>>::from_request_parts(&mut parts, &()).await
    {
        Ok(Path(params)) => params,
        Err(PathRejection::MissingPathParams(_)) => HashMap::new(),
        Err(e) => {
            return Err(RouteError::InvalidArgument {
                name: "path".to_string(),
                message: e.body_text(),
            });
        }
    };
    let query = Query::<HashMap<String, String>>::try_from_uri(&parts.uri)
        .map(|Query(query)| query)
        .map_err(|e| RouteError::InvalidArgument {
            name: "query".to_string(),
            message: e.body_text(),
        })?;
    let bytes = axum::body::to_bytes(body, body_limit)
        .await
        .map_err(|e| RouteError::InvalidArgument {
            name: "body".to_string(),
            message: e.to_string(),
        })?;
    let body = if bytes.is_empty() {
        None
    } else {
        Some(
            serde_json::from_slice::<Value>(&bytes).map_err(|e| RouteError::InvalidArgument {
                name: "body".to_string(),
                message: e.to_string(),
            })?,
        )
    };

    let kwargs = bind_arguments(view.signature(), &path_params, &query, body)?;
    let request = RequestContext::from(parts);
    if view.is_async() {
        view.call_async(request, Vec::new(), kwargs).await
    } else {
        tokio::task::spawn_blocking(move || view.call(request, Vec::new(), kwargs))
            .await
            .map_err(|e| RouteError::Internal(e.to_string()))?
    }
}

fn coerce(param: &Param, raw: &str) -> Result<Value> {
    match param.annotation.scalar() {
        Some(scalar) => scalar
            .coerce(raw)
            .ok_or_else(|| RouteError::InvalidArgument {
                name: param.name.clone(),
                message: format!("expected {scalar}, got `{raw}`"),
            }),
        None => Ok(Value::String(raw.to_string())),
    }
}

/// Builds keyword arguments for a request from the exposed signature.
pub fn bind_arguments(
    signature: &Signature,
    path_params: &HashMap<String, String>,
    query: &HashMap<String, String>,
    mut body: Option<Value>,
) -> Result<Kwargs> {
    let mut kwargs = Kwargs::new();
    for param in signature.params() {
        if matches!(param.kind, ParamKind::VarPositional | ParamKind::VarKeyword) {
            continue;
        }
        let value = if param.default.is_query() {
            Some(Value::Object(
                query
                    .iter()
                    .map(|(key, value)| (key.clone(), Value::String(value.clone())))
                    .collect(),
            ))
        } else if let Some(raw) = path_params.get(&param.name) {
            Some(coerce(param, raw)?)
        } else if let Some(raw) = query.get(&param.name) {
            Some(coerce(param, raw)?)
        } else if matches!(param.annotation, TypeRef::Named(_) | TypeRef::Schema(_) | TypeRef::Any)
            && body.is_some()
        {
            body.take()
        } else {
            match &param.default {
                ParamDefault::Value(default) => Some(default.clone()),
                _ if param.is_required() => {
                    return Err(RouteError::MissingArgument {
                        name: param.name.clone(),
                    });
                }
                _ => None,
            }
        };
        if let Some(value) = value {
            kwargs.insert(param.name.clone(), value);
        }
    }
    Ok(kwargs)
}
