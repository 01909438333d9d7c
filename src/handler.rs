use crate::di::Container;
use crate::error::{Result, RouteError};
use crate::request::RequestContext;
use crate::signature::Signature;
use axum::extract::Query;
use serde::{Serialize, de::DeserializeOwned};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub use serde_json::{Map, Value};

/// Positional arguments forwarded to the controller factory.
pub type Args = Vec<Value>;

/// Keyword arguments bound from the request.
pub type Kwargs = Map<String, Value>;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub type SyncBody = Arc<dyn Fn(HandlerContext) -> Result<Value> + Send + Sync>;
pub type AsyncBody = Arc<dyn Fn(HandlerContext) -> BoxFuture<'static, Result<Value>> + Send + Sync>;

/// Everything a handler body can see while it runs.
#[derive(Clone)]
pub struct HandlerContext {
    pub request: RequestContext,
    pub args: Args,
    pub kwargs: Kwargs,
    pub object: Option<Value>,
    container: Arc<Container>,
}

impl HandlerContext {
    pub fn new(request: RequestContext, args: Args, kwargs: Kwargs, container: Arc<Container>) -> Self {
        Self {
            request,
            args,
            kwargs,
            object: None,
            container,
        }
    }

    #[must_use]
    pub fn with_object(mut self, object: Value) -> Self {
        self.object = Some(object);
        self
    }

    /// Deserializes a keyword argument. A missing key reads as `null`, so
    /// `Option<T>` arguments may be omitted.
    pub fn arg<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        match self.kwargs.get(name) {
            Some(value) => {
                serde_json::from_value(value.clone()).map_err(|e| RouteError::InvalidArgument {
                    name: name.to_string(),
                    message: e.to_string(),
                })
            }
            None => serde_json::from_value(Value::Null).map_err(|_| RouteError::MissingArgument {
                name: name.to_string(),
            }),
        }
    }

    /// Deserializes the request query string into a query-marker argument.
    pub fn query_arg<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        Query::<T>::try_from_uri(self.request.uri())
            .map(|Query(value)| value)
            .map_err(|e| RouteError::InvalidArgument {
                name: name.to_string(),
                message: e.body_text(),
            })
    }

    pub fn object(&self) -> Result<&Value> {
        self.object.as_ref().ok_or_else(|| RouteError::Internal(
            "no object was retrieved for this route".to_string(),
        ))
    }

    pub fn resolve<T: Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        self.container.resolve::<T>()
    }

    pub fn container(&self) -> &Arc<Container> {
        &self.container
    }
}

#[derive(Clone)]
pub enum HandlerBody {
    Sync(SyncBody),
    Async(AsyncBody),
}

/// A user-written handler: its declared signature and its body.
#[derive(Clone)]
pub struct ApiFunc {
    name: String,
    signature: Signature,
    body: HandlerBody,
}

impl ApiFunc {
    pub fn sync<F>(name: impl Into<String>, signature: Signature, body: F) -> Self
    where
        F: Fn(HandlerContext) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            signature,
            body: HandlerBody::Sync(Arc::new(body)),
        }
    }

    pub fn asynchronous<F, Fut>(name: impl Into<String>, signature: Signature, body: F) -> Self
    where
        F: Fn(HandlerContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        Self {
            name: name.into(),
            signature,
            body: HandlerBody::Async(Arc::new(move |ctx| Box::pin(body(ctx)))),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn is_async(&self) -> bool {
        matches!(self.body, HandlerBody::Async(_))
    }

    /// Runs a synchronous body. Async bodies cannot run here.
    pub fn call(&self, ctx: HandlerContext) -> Result<Value> {
        match &self.body {
            HandlerBody::Sync(body) => body(ctx),
            HandlerBody::Async(_) => Err(RouteError::Internal(format!(
                "async handler `{}` called from a synchronous view",
                self.name
            ))),
        }
    }

    /// Runs either kind of body; sync bodies run inline.
    pub async fn call_async(&self, ctx: HandlerContext) -> Result<Value> {
        match &self.body {
            HandlerBody::Sync(body) => body(ctx),
            HandlerBody::Async(body) => body(ctx).await,
        }
    }
}

impl fmt::Debug for ApiFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiFunc")
            .field("name", &self.name)
            .field("signature", &self.signature)
            .field("is_async", &self.is_async())
            .finish()
    }
}

/// Converts a handler's return value into the JSON handed back to the router.
pub fn to_output<T: Serialize>(output: T) -> Result<Value> {
    Ok(serde_json::to_value(output)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use serde::Deserialize;
    use serde_json::json;

    fn context(uri: &str, kwargs: Value) -> HandlerContext {
        let request = Request::get(uri).body(()).unwrap();
        let kwargs = match kwargs {
            Value::Object(map) => map,
            _ => Kwargs::new(),
        };
        HandlerContext::new(request.into(), Vec::new(), kwargs, Arc::new(Container::new()))
    }

    #[test]
    fn test_arg_reads_kwargs() {
        let ctx = context("/", json!({ "id": 7, "name": "dune" }));
        assert_eq!(ctx.arg::<u32>("id").unwrap(), 7);
        assert_eq!(ctx.arg::<String>("name").unwrap(), "dune");
    }

    #[test]
    fn test_missing_optional_arg_is_none() {
        let ctx = context("/", json!({}));
        assert_eq!(ctx.arg::<Option<u32>>("limit").unwrap(), None);
        assert!(matches!(
            ctx.arg::<u32>("limit"),
            Err(RouteError::MissingArgument { name }) if name == "limit"
        ));
    }

    #[test]
    fn test_invalid_arg_type() {
        let ctx = context("/", json!({ "id": "seven" }));
        assert!(matches!(ctx.arg::<u32>("id"), Err(RouteError::InvalidArgument { .. })));
    }

    #[test]
    fn test_query_arg_reads_uri() {
        #[derive(Deserialize)]
        struct Filter {
            author: String,
            year: Option<u16>,
        }

        let ctx = context("/books?author=herbert&year=1965", json!({}));
        let filter: Filter = ctx.query_arg("filters").unwrap();
        assert_eq!(filter.author, "herbert");
        assert_eq!(filter.year, Some(1965));
    }

    #[test]
    fn test_sync_body_refuses_async_call_path() {
        let func = ApiFunc::asynchronous("later", Signature::default(), |_ctx| async {
            Ok(Value::Null)
        });
        assert!(func.is_async());
        assert!(func.call(context("/", json!({}))).is_err());
    }

    #[tokio::test]
    async fn test_call_async_runs_both_bodies() {
        let sync = ApiFunc::sync("now", Signature::default(), |_ctx| Ok(json!("sync")));
        let asynchronous =
            ApiFunc::asynchronous("later", Signature::default(), |_ctx| async { Ok(json!("async")) });
        assert_eq!(sync.call_async(context("/", json!({}))).await.unwrap(), json!("sync"));
        assert_eq!(
            asynchronous.call_async(context("/", json!({}))).await.unwrap(),
            json!("async")
        );
    }
}
