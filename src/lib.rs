//! # Controller Routes
//!
//! Route functions for controller-based APIs on top of axum.
//!
//! A handler is written as a plain function and turned into an [`ApiFunc`]
//! with `#[api_func]`. Registering it on an [`ApiRouter`] wraps it in a
//! [`RouteFunction`] of one of three kinds:
//!
//! - [`RouteKind::Plain`] runs the handler and returns its output;
//! - [`RouteKind::Object`] retrieves the target object first and checks
//!   object permissions;
//! - [`RouteKind::List`] paginates the returned array and documents a
//!   `filters` query parameter for the paginator input.
//!
//! Every request builds a fresh controller instance, checks its permissions
//! and dispatches to the strategy for the route kind, synchronously or
//! asynchronously depending on the handler.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use controller_routes::prelude::*;
//! use controller_routes::controller::ObjectList;
//! use serde_json::json;
//!
//! #[api_func]
//! fn list_books(context: &HandlerContext) -> Result<Vec<Value>> {
//!     Ok(vec![json!({ "id": 1, "title": "Dune" })])
//! }
//!
//! #[api_func]
//! async fn get_book(context: &HandlerContext, id: u32) -> Result<Value> {
//!     Ok(context.object()?.clone())
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let books = ControllerConfig::new("BookController")
//!         .objects(ObjectList::new("id", vec![json!({ "id": 1, "title": "Dune" })]))
//!         .build();
//!
//!     let mut api = ApiRouter::new();
//!     api.add(Route::get(books.clone(), "/books").paginated(), list_books_api())?
//!         .add(Route::get(books, "/books/{id}").retrieve_object(), get_book_api())?;
//!
//!     let app: Router = api.into_router();
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```

extern crate self as controller_routes;

pub mod config;
pub mod controller;
pub mod di;
pub mod error;
pub mod handler;
pub mod pagination;
pub mod permission;
pub mod request;
pub mod route;
pub mod router;
pub mod signature;

// Re-export core types
pub use controller::{ApiController, ControllerConfig, ControllerInstance};
pub use di::{Container, ContainerBuilder};
pub use error::{Result, RouteError};
pub use handler::{ApiFunc, HandlerContext};
pub use route::{ContextView, Route, RouteFunction, RouteKind};
pub use router::ApiRouter;

pub use controller_routes_macro::api_func;

// Re-export commonly used types from dependencies
pub use async_trait::async_trait;
pub use axum;
pub use serde_json;

/// Prelude module for convenient imports
///
/// ```
/// use controller_routes::prelude::*;
/// ```
pub mod prelude {
    pub use crate::api_func;
    pub use crate::config::Settings;
    pub use crate::controller::{ControllerConfig, ControllerInstance, ObjectSource};
    pub use crate::di::{Container, ContainerBuilder};
    pub use crate::error::{Result, RouteError};
    pub use crate::handler::{ApiFunc, HandlerContext, Value};
    pub use crate::pagination::{LimitOffsetPagination, PageNumberPagination, Pagination};
    pub use crate::permission::{
        AllowAny, IsAdminUser, IsAuthenticated, IsAuthenticatedOrReadOnly, Permission,
    };
    pub use crate::request::{Identity, RequestContext};
    pub use crate::route::{Route, RouteFunction, RouteKind};
    pub use crate::router::ApiRouter;
    pub use async_trait::async_trait;
    pub use axum::Router;
    pub use std::sync::Arc;
}
