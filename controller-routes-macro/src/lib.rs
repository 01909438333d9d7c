use proc_macro::TokenStream;

mod api_func;

/// Turns a free function into a route handler.
///
/// The function is kept as written and a `<name>_api()` constructor is
/// generated next to it, returning a `controller_routes::handler::ApiFunc`
/// whose signature is derived from the parameter list.
///
/// - parameters named `context` or `request` receive `&HandlerContext`;
/// - `#[query]` marks a parameter as query input, deserialized from the
///   request query string;
/// - `#[keyword]` makes a parameter keyword-only;
/// - `Option<T>` parameters default to `null`.
///
/// The function returns `Result<T, E>` with `T: Serialize` and `E`
/// convertible into `RouteError`.
///
/// # Example
/// ```ignore
/// use controller_routes::prelude::*;
///
/// #[api_func]
/// async fn get_book(context: &HandlerContext, id: u32) -> Result<Value> {
///     Ok(context.object()?.clone())
/// }
///
/// let handler: ApiFunc = get_book_api();
/// ```
#[proc_macro_attribute]
pub fn api_func(attr: TokenStream, item: TokenStream) -> TokenStream {
    api_func::api_func_attribute(attr, item)
}
