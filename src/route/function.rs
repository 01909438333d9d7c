use crate::controller::ControllerInstance;
use crate::error::{Result, RouteError};
use crate::handler::{ApiFunc, Args, BoxFuture, Kwargs, Value};
use crate::request::RequestContext;
use crate::route::{RouteDefinition, RouteKind};
use crate::signature::{FILTERS_PARAMETER, Param, Signature};
use std::fmt;
use std::sync::{Arc, OnceLock};

type SyncStrategy = fn(&dyn ControllerInstance, &ApiFunc) -> Result<Value>;
type AsyncStrategy =
    for<'a> fn(&'a dyn ControllerInstance, &'a ApiFunc) -> BoxFuture<'a, Result<Value>>;

fn plain(instance: &dyn ControllerInstance, handler: &ApiFunc) -> Result<Value> {
    instance.run_view_func(handler)
}

fn plain_async<'a>(
    instance: &'a dyn ControllerInstance,
    handler: &'a ApiFunc,
) -> BoxFuture<'a, Result<Value>> {
    instance.async_run_view_func(handler)
}

fn object(instance: &dyn ControllerInstance, handler: &ApiFunc) -> Result<Value> {
    instance.run_object_view_func(handler)
}

fn object_async<'a>(
    instance: &'a dyn ControllerInstance,
    handler: &'a ApiFunc,
) -> BoxFuture<'a, Result<Value>> {
    instance.async_run_object_view_func(handler)
}

fn list(instance: &dyn ControllerInstance, handler: &ApiFunc) -> Result<Value> {
    instance.run_list_view_func(handler)
}

fn list_async<'a>(
    instance: &'a dyn ControllerInstance,
    handler: &'a ApiFunc,
) -> BoxFuture<'a, Result<Value>> {
    instance.async_run_list_view_func(handler)
}

/// Execution strategies indexed by the `RouteKind` discriminant.
const STRATEGIES: [(SyncStrategy, AsyncStrategy); 3] = [
    (plain, plain_async),
    (object, object_async),
    (list, list_async),
];

impl RouteKind {
    fn strategies(self) -> (SyncStrategy, AsyncStrategy) {
        STRATEGIES[self as usize]
    }
}

pub type SyncDispatch = Arc<dyn Fn(RequestContext, Args, Kwargs) -> Result<Value> + Send + Sync>;
pub type AsyncDispatch =
    Arc<dyn Fn(RequestContext, Args, Kwargs) -> BoxFuture<'static, Result<Value>> + Send + Sync>;

#[derive(Clone)]
pub enum Dispatch {
    Sync(SyncDispatch),
    Async(AsyncDispatch),
}

/// The callable registered with the router, carrying the signature it exposes.
#[derive(Clone)]
pub struct ContextView {
    name: String,
    signature: Signature,
    dispatch: Dispatch,
}

impl ContextView {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The exposed signature used for documentation and argument binding.
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn is_async(&self) -> bool {
        matches!(self.dispatch, Dispatch::Async(_))
    }

    pub fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }

    /// Invokes a synchronous view on the current thread.
    pub fn call(&self, request: RequestContext, args: Args, kwargs: Kwargs) -> Result<Value> {
        match &self.dispatch {
            Dispatch::Sync(run) => run(request, args, kwargs),
            Dispatch::Async(_) => Err(RouteError::Internal(format!(
                "view `{}` is async and must be awaited",
                self.name
            ))),
        }
    }

    /// Invokes either kind of view; sync views run inline.
    pub async fn call_async(
        &self,
        request: RequestContext,
        args: Args,
        kwargs: Kwargs,
    ) -> Result<Value> {
        match &self.dispatch {
            Dispatch::Sync(run) => run(request, args, kwargs),
            Dispatch::Async(run) => run(request, args, kwargs).await,
        }
    }
}

impl fmt::Debug for ContextView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextView")
            .field("name", &self.name)
            .field("signature", &self.signature)
            .field("is_async", &self.is_async())
            .finish()
    }
}

/// Binds one handler to its route definition.
///
/// For list routes `registered_filter` records whether a `filters` parameter
/// was added to the exposed signature. It is written once, while the
/// signature is resolved in [`RouteFunction::from_route`].
pub struct RouteFunction {
    kind: RouteKind,
    route_definition: Arc<dyn RouteDefinition>,
    api_func: Arc<ApiFunc>,
    registered_filter: OnceLock<bool>,
}

impl RouteFunction {
    /// Builds the view the router registers and the route function behind it.
    ///
    /// The view is async exactly when the handler is.
    pub fn from_route(
        kind: RouteKind,
        api_func: ApiFunc,
        route_definition: Arc<dyn RouteDefinition>,
    ) -> Result<(ContextView, Arc<RouteFunction>)> {
        let route_function = Arc::new(Self {
            kind,
            route_definition,
            api_func: Arc::new(api_func),
            registered_filter: OnceLock::new(),
        });
        let signature = route_function.resolve_api_func_signature()?;
        let view = if route_function.api_func.is_async() {
            route_function.convert_async_api_func_to_context_view(signature)
        } else {
            route_function.convert_api_func_to_context_view(signature)
        };
        tracing::debug!(
            handler = route_function.api_func.name(),
            kind = %kind,
            is_async = view.is_async(),
            registered_filter = route_function.registered_filter(),
            "route function registered"
        );
        Ok((view, route_function))
    }

    pub fn plain(
        api_func: ApiFunc,
        route_definition: Arc<dyn RouteDefinition>,
    ) -> Result<(ContextView, Arc<RouteFunction>)> {
        Self::from_route(RouteKind::Plain, api_func, route_definition)
    }

    pub fn retrieve_object(
        api_func: ApiFunc,
        route_definition: Arc<dyn RouteDefinition>,
    ) -> Result<(ContextView, Arc<RouteFunction>)> {
        Self::from_route(RouteKind::Object, api_func, route_definition)
    }

    pub fn paginated(
        api_func: ApiFunc,
        route_definition: Arc<dyn RouteDefinition>,
    ) -> Result<(ContextView, Arc<RouteFunction>)> {
        Self::from_route(RouteKind::List, api_func, route_definition)
    }

    pub fn kind(&self) -> RouteKind {
        self.kind
    }

    pub fn api_func(&self) -> &ApiFunc {
        &self.api_func
    }

    pub fn route_definition(&self) -> &Arc<dyn RouteDefinition> {
        &self.route_definition
    }

    /// Whether a synthetic `filters` parameter was added. Always false for
    /// plain and object routes.
    pub fn registered_filter(&self) -> bool {
        self.registered_filter.get().copied().unwrap_or(false)
    }

    /// The declared signature without `context`, `self` and `request`.
    pub fn get_required_api_func_signature(signature: &Signature) -> Signature {
        signature.required()
    }

    fn resolve_api_func_signature(&self) -> Result<Signature> {
        let invalid = |message: String| RouteError::InvalidSignature {
            handler: self.api_func.name().to_string(),
            message,
        };

        let declared = self.api_func.signature();
        declared.validate().map_err(invalid)?;
        let required = Self::get_required_api_func_signature(declared);
        if self.kind != RouteKind::List {
            return Ok(required);
        }

        // Only one query parameter is allowed per route, so a handler that
        // declares its own keeps it.
        let inject = !required.has_query_param();
        self.registered_filter
            .set(inject)
            .map_err(|_| invalid("signature was already resolved".to_string()))?;
        if !inject {
            return Ok(required);
        }

        let filters = Param::keyword_only(FILTERS_PARAMETER)
            .query()
            .annotated(self.route_definition.resolve_paginated_request_schema());
        let exposed = required.with_param(filters);
        exposed.validate().map_err(invalid)?;
        Ok(exposed)
    }

    /// Drops the synthetic `filters` argument; the controller never sees it.
    pub fn filter_registered_kwargs(&self, mut kwargs: Kwargs) -> Kwargs {
        if self.registered_filter() {
            kwargs.remove(FILTERS_PARAMETER);
        }
        kwargs
    }

    pub fn get_owner_instance(
        &self,
        request: RequestContext,
        args: Args,
        kwargs: Kwargs,
    ) -> Result<Arc<dyn ControllerInstance>> {
        self.route_definition
            .create_view_func_instance(request, args, kwargs)
    }

    pub fn run_view_func(&self, instance: &dyn ControllerInstance) -> Result<Value> {
        let (run, _) = self.kind.strategies();
        run(instance, self.api_func())
    }

    pub async fn async_run_view_func(&self, instance: &dyn ControllerInstance) -> Result<Value> {
        let (_, run) = self.kind.strategies();
        run(instance, self.api_func()).await
    }

    fn convert_api_func_to_context_view(self: &Arc<Self>, signature: Signature) -> ContextView {
        let function = Arc::clone(self);
        let dispatch: SyncDispatch = Arc::new(
            move |request: RequestContext, args: Args, kwargs: Kwargs| -> Result<Value> {
                tracing::trace!(handler = function.api_func.name(), kind = %function.kind, "dispatching");
                let kwargs = function.filter_registered_kwargs(kwargs);
                let instance = function.get_owner_instance(request, args, kwargs)?;
                instance.check_permissions()?;
                function.run_view_func(instance.as_ref())
            },
        );
        ContextView {
            name: self.api_func.name().to_string(),
            signature,
            dispatch: Dispatch::Sync(dispatch),
        }
    }

    fn convert_async_api_func_to_context_view(
        self: &Arc<Self>,
        signature: Signature,
    ) -> ContextView {
        let function = Arc::clone(self);
        let dispatch: AsyncDispatch = Arc::new(
            move |request: RequestContext,
                  args: Args,
                  kwargs: Kwargs|
                  -> BoxFuture<'static, Result<Value>> {
                let function = Arc::clone(&function);
                Box::pin(async move {
                    tracing::trace!(handler = function.api_func.name(), kind = %function.kind, "dispatching");
                    let kwargs = function.filter_registered_kwargs(kwargs);
                    let instance = function.get_owner_instance(request, args, kwargs)?;
                    instance.async_check_permissions().await?;
                    function.async_run_view_func(instance.as_ref()).await
                })
            },
        );
        ContextView {
            name: self.api_func.name().to_string(),
            signature,
            dispatch: Dispatch::Async(dispatch),
        }
    }
}

impl fmt::Debug for RouteFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteFunction")
            .field("kind", &self.kind)
            .field("api_func", &self.api_func)
            .field("registered_filter", &self.registered_filter.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permission::PermissionError;
    use crate::signature::{ParamDefault, ParamKind, QueryMarker, TypeRef};
    use async_trait::async_trait;
    use axum::http::Request;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<&'static str>>,
        forwarded: Mutex<Vec<Kwargs>>,
    }

    impl Recorder {
        fn record(&self, call: &'static str) {
            self.calls.lock().unwrap().push(call);
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }

        fn last_forwarded(&self) -> Kwargs {
            self.forwarded.lock().unwrap().last().cloned().unwrap_or_default()
        }
    }

    struct RecordingController {
        recorder: Arc<Recorder>,
        deny: bool,
    }

    #[async_trait]
    impl ControllerInstance for RecordingController {
        fn check_permissions(&self) -> Result<()> {
            self.recorder.record("check_permissions");
            if self.deny {
                return Err(PermissionError::Forbidden("denied".to_string()).into());
            }
            Ok(())
        }

        fn run_view_func(&self, _handler: &ApiFunc) -> Result<Value> {
            self.recorder.record("run_view_func");
            Ok(json!("view"))
        }

        async fn async_run_view_func(&self, _handler: &ApiFunc) -> Result<Value> {
            self.recorder.record("async_run_view_func");
            Ok(json!("view"))
        }

        fn run_object_view_func(&self, _handler: &ApiFunc) -> Result<Value> {
            self.recorder.record("run_object_view_func");
            Ok(json!("object"))
        }

        async fn async_run_object_view_func(&self, _handler: &ApiFunc) -> Result<Value> {
            self.recorder.record("async_run_object_view_func");
            Ok(json!("object"))
        }

        fn run_list_view_func(&self, _handler: &ApiFunc) -> Result<Value> {
            self.recorder.record("run_list_view_func");
            Ok(json!("list"))
        }

        async fn async_run_list_view_func(&self, _handler: &ApiFunc) -> Result<Value> {
            self.recorder.record("async_run_list_view_func");
            Ok(json!("list"))
        }
    }

    struct RecordingRoute {
        recorder: Arc<Recorder>,
        deny: bool,
    }

    impl RouteDefinition for RecordingRoute {
        fn create_view_func_instance(
            &self,
            _request: RequestContext,
            _args: Args,
            kwargs: Kwargs,
        ) -> Result<Arc<dyn ControllerInstance>> {
            self.recorder.forwarded.lock().unwrap().push(kwargs);
            Ok(Arc::new(RecordingController {
                recorder: Arc::clone(&self.recorder),
                deny: self.deny,
            }))
        }

        fn resolve_paginated_request_schema(&self) -> TypeRef {
            TypeRef::Named("PageInput".to_string())
        }
    }

    fn recording_route(deny: bool) -> (Arc<Recorder>, Arc<dyn RouteDefinition>) {
        let recorder = Arc::new(Recorder::default());
        let route = RecordingRoute {
            recorder: Arc::clone(&recorder),
            deny,
        };
        (recorder, Arc::new(route))
    }

    fn request() -> RequestContext {
        Request::get("/items").body(()).unwrap().into()
    }

    fn kwargs(value: Value) -> Kwargs {
        value.as_object().cloned().unwrap_or_default()
    }

    fn declared() -> Signature {
        Signature::new(vec![
            Param::positional("self"),
            Param::positional("request"),
            Param::positional("id").annotated(TypeRef::from_type_name("u32")),
            Param::keyword_only("context"),
            Param::keyword_only("verbose").with_default(json!(false)),
        ])
    }

    fn sync_handler(signature: Signature) -> ApiFunc {
        ApiFunc::sync("handler", signature, |_ctx| Ok(Value::Null))
    }

    fn async_handler(signature: Signature) -> ApiFunc {
        ApiFunc::asynchronous("handler", signature, |_ctx| async { Ok(Value::Null) })
    }

    #[test]
    fn test_view_preserves_sync_ness() {
        let (_, route) = recording_route(false);
        let (view, _) = RouteFunction::plain(sync_handler(declared()), Arc::clone(&route)).unwrap();
        assert!(!view.is_async());
        let (view, _) = RouteFunction::plain(async_handler(declared()), route).unwrap();
        assert!(view.is_async());
    }

    #[test]
    fn test_exposed_signature_never_has_context_parameters() {
        for kind in [RouteKind::Plain, RouteKind::Object, RouteKind::List] {
            let (_, route) = recording_route(false);
            let (view, _) = RouteFunction::from_route(kind, sync_handler(declared()), route).unwrap();
            for name in ["context", "self", "request"] {
                assert!(!view.signature().contains(name), "{kind} exposes {name}");
            }
            assert_eq!(view.signature().params()[0].name, "id");
            assert_eq!(view.signature().params()[1].name, "verbose");
        }
    }

    #[test]
    fn test_paginated_injects_filters_when_no_query_param() {
        let (_, route) = recording_route(false);
        let (view, function) = RouteFunction::paginated(sync_handler(declared()), route).unwrap();
        assert!(function.registered_filter());
        assert_eq!(view.signature().len(), 3);

        let filters = view.signature().get("filters").unwrap();
        assert_eq!(filters.kind, ParamKind::KeywordOnly);
        assert_eq!(filters.default, ParamDefault::Query(QueryMarker::required()));
        assert_eq!(filters.annotation, TypeRef::Named("PageInput".to_string()));
    }

    #[test]
    fn test_paginated_keeps_handler_query_param() {
        let signature = Signature::new(vec![
            Param::positional("request"),
            Param::positional("search").query(),
        ]);
        let (_, route) = recording_route(false);
        let (view, function) = RouteFunction::paginated(sync_handler(signature), route).unwrap();
        assert!(!function.registered_filter());
        assert_eq!(view.signature().names().collect::<Vec<_>>(), vec!["search"]);
    }

    #[test]
    fn test_plain_and_object_never_register_filter() {
        let (_, route) = recording_route(false);
        let (view, function) =
            RouteFunction::retrieve_object(sync_handler(declared()), route).unwrap();
        assert!(!function.registered_filter());
        assert!(!view.signature().contains("filters"));
    }

    #[test]
    fn test_synthetic_filters_not_forwarded() {
        let (recorder, route) = recording_route(false);
        let (view, _) = RouteFunction::paginated(sync_handler(declared()), route).unwrap();
        view.call(request(), Vec::new(), kwargs(json!({ "id": 1, "filters": { "page": "2" } })))
            .unwrap();
        assert_eq!(recorder.last_forwarded(), kwargs(json!({ "id": 1 })));
    }

    #[test]
    fn test_kwargs_forwarded_unchanged_without_synthetic_filter() {
        let signature = Signature::new(vec![Param::keyword_only("filters").query()]);
        let (recorder, route) = recording_route(false);
        let (view, _) = RouteFunction::paginated(sync_handler(signature), route).unwrap();
        let sent = kwargs(json!({ "id": 1, "filters": { "page": "2" } }));
        view.call(request(), Vec::new(), sent.clone()).unwrap();
        assert_eq!(recorder.last_forwarded(), sent);

        let (recorder, route) = recording_route(false);
        let (view, _) = RouteFunction::plain(sync_handler(declared()), route).unwrap();
        view.call(request(), Vec::new(), sent.clone()).unwrap();
        assert_eq!(recorder.last_forwarded(), sent);
    }

    #[tokio::test]
    async fn test_each_kind_selects_its_strategy() {
        let cases = [
            (RouteKind::Plain, "run_view_func", "async_run_view_func", "view"),
            (RouteKind::Object, "run_object_view_func", "async_run_object_view_func", "object"),
            (RouteKind::List, "run_list_view_func", "async_run_list_view_func", "list"),
        ];
        for (kind, sync_call, async_call, output) in cases {
            let (recorder, route) = recording_route(false);
            let (view, _) =
                RouteFunction::from_route(kind, sync_handler(declared()), route).unwrap();
            let result = view.call(request(), Vec::new(), Kwargs::new()).unwrap();
            assert_eq!(result, json!(output));
            assert_eq!(recorder.calls(), vec!["check_permissions", sync_call]);

            let (recorder, route) = recording_route(false);
            let (view, _) =
                RouteFunction::from_route(kind, async_handler(declared()), route).unwrap();
            let result = view
                .call_async(request(), Vec::new(), Kwargs::new())
                .await
                .unwrap();
            assert_eq!(result, json!(output));
            assert_eq!(recorder.calls(), vec!["check_permissions", async_call]);
        }
    }

    #[tokio::test]
    async fn test_permission_denial_stops_dispatch() {
        let (recorder, route) = recording_route(true);
        let (view, _) = RouteFunction::paginated(sync_handler(declared()), route).unwrap();
        let err = view.call(request(), Vec::new(), Kwargs::new()).unwrap_err();
        assert!(matches!(
            err,
            RouteError::PermissionDenied(PermissionError::Forbidden(ref message)) if message == "denied"
        ));
        assert_eq!(recorder.calls(), vec!["check_permissions"]);

        let (recorder, route) = recording_route(true);
        let (view, _) = RouteFunction::retrieve_object(async_handler(declared()), route).unwrap();
        let err = view
            .call_async(request(), Vec::new(), Kwargs::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RouteError::PermissionDenied(_)));
        assert_eq!(recorder.calls(), vec!["check_permissions"]);
    }

    #[test]
    fn test_async_view_refuses_blocking_call() {
        let (_, route) = recording_route(false);
        let (view, _) = RouteFunction::plain(async_handler(declared()), route).unwrap();
        assert!(view.call(request(), Vec::new(), Kwargs::new()).is_err());
    }

    #[test]
    fn test_malformed_signature_rejected_at_registration() {
        let signature = Signature::new(vec![Param::keyword_only("a"), Param::positional("b")]);
        let (_, route) = recording_route(false);
        let err = RouteFunction::plain(sync_handler(signature), route).unwrap_err();
        assert!(matches!(err, RouteError::InvalidSignature { .. }));
    }

    #[test]
    fn test_plain_filters_parameter_clashes_with_injection() {
        let signature = Signature::new(vec![Param::positional("filters")]);
        let (_, route) = recording_route(false);
        let err = RouteFunction::paginated(sync_handler(signature), route).unwrap_err();
        assert!(matches!(err, RouteError::InvalidSignature { .. }));
    }

    #[test]
    fn test_list_route_rejects_two_query_params() {
        let signature = Signature::new(vec![
            Param::keyword_only("a").query(),
            Param::keyword_only("b").query(),
        ]);
        let (_, route) = recording_route(false);
        let err = RouteFunction::paginated(sync_handler(signature), route).unwrap_err();
        assert!(matches!(err, RouteError::InvalidSignature { .. }));
    }

    #[test]
    fn test_filters_inserted_before_var_keyword() {
        let signature = Signature::new(vec![
            Param::positional("q"),
            Param::new("extra", ParamKind::VarKeyword),
        ]);
        let (_, route) = recording_route(false);
        let (view, _) = RouteFunction::paginated(sync_handler(signature), route).unwrap();
        assert_eq!(
            view.signature().names().collect::<Vec<_>>(),
            vec!["q", "filters", "extra"]
        );
    }
}
