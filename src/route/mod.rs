//! Route definitions and the route functions built from them.

mod definition;
mod function;

pub use definition::{Route, RouteDefinition, RouteKind};
pub use function::{ContextView, Dispatch, RouteFunction};
