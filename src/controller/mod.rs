//! Per-request controller instances and the controller-level configuration
//! they are built from.
//!
//! Route functions only see [`ControllerInstance`]. [`ApiController`] is the
//! default instance created by [`Route`](crate::route::Route); anything else
//! implementing the trait can be returned from a custom
//! [`RouteDefinition`](crate::route::RouteDefinition).

mod api;
mod config;
mod objects;

pub use api::ApiController;
pub use config::ControllerConfig;
pub use objects::{ObjectList, ObjectSource};

use crate::error::Result;
use crate::handler::{ApiFunc, Value};
use async_trait::async_trait;

/// The permission check and the three execution strategies, each in a sync
/// and an async flavour.
#[async_trait]
pub trait ControllerInstance: Send + Sync {
    fn check_permissions(&self) -> Result<()>;

    async fn async_check_permissions(&self) -> Result<()> {
        self.check_permissions()
    }

    fn run_view_func(&self, handler: &ApiFunc) -> Result<Value>;

    async fn async_run_view_func(&self, handler: &ApiFunc) -> Result<Value>;

    /// Retrieves the target object, then runs the handler with it.
    fn run_object_view_func(&self, handler: &ApiFunc) -> Result<Value>;

    async fn async_run_object_view_func(&self, handler: &ApiFunc) -> Result<Value>;

    /// Runs the handler, then paginates the array it returns.
    fn run_list_view_func(&self, handler: &ApiFunc) -> Result<Value>;

    async fn async_run_list_view_func(&self, handler: &ApiFunc) -> Result<Value>;
}
