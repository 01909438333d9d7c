//! Paginators applied by list routes to the array a handler returns.
//!
//! Paginator input is read from the request query string, which is why list
//! routes expose a `filters` query parameter when the handler declares none.

use crate::request::RequestContext;
use crate::signature::{Scalar, SchemaField, SchemaRef, TypeRef};
use axum::extract::Query;
use axum::http::Uri;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum PaginationError {
    #[error("Invalid pagination input: {0}")]
    InvalidInput(String),

    #[error("Invalid page: {0}")]
    InvalidPage(String),

    #[error("Page {0} contains no results")]
    EmptyPage(usize),

    #[error("List routes must return an array, got {0}")]
    NotAList(String),
}

/// Body returned by every list route.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaginatedResponse {
    pub count: usize,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<Value>,
}

pub trait Pagination: Send + Sync + 'static {
    /// The request schema documented on list routes.
    fn input_schema(&self) -> TypeRef;

    fn paginate(
        &self,
        items: Vec<Value>,
        request: &RequestContext,
    ) -> Result<PaginatedResponse, PaginationError>;
}

/// Which paginator a controller uses when none is set explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum_macros::Display, strum_macros::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum PaginationClass {
    #[default]
    PageNumber,
    LimitOffset,
}

impl PaginationClass {
    pub fn build(self, per_page: usize, max_page_size: usize) -> Arc<dyn Pagination> {
        match self {
            PaginationClass::PageNumber => Arc::new(PageNumberPagination::new(per_page, max_page_size)),
            PaginationClass::LimitOffset => Arc::new(LimitOffsetPagination::new(per_page, max_page_size)),
        }
    }
}

fn parse_input<T: DeserializeOwned>(request: &RequestContext) -> Result<T, PaginationError> {
    Query::<T>::try_from_uri(request.uri())
        .map(|Query(input)| input)
        .map_err(|e| PaginationError::InvalidInput(e.body_text()))
}

/// Rebuilds `uri` with the given query parameters replaced.
fn link(uri: &Uri, replacements: &[(&str, usize)]) -> String {
    let mut pairs: Vec<String> = uri
        .query()
        .unwrap_or_default()
        .split('&')
        .filter(|pair| {
            let key = pair.split('=').next().unwrap_or_default();
            !pair.is_empty() && !replacements.iter().any(|(name, _)| *name == key)
        })
        .map(str::to_string)
        .collect();
    pairs.extend(
        replacements
            .iter()
            .map(|(name, value)| format!("{name}={value}")),
    );
    format!("{}?{}", uri.path(), pairs.join("&"))
}

fn optional_integer(name: &str) -> SchemaField {
    SchemaField {
        name: name.to_string(),
        ty: Scalar::Integer,
        required: false,
    }
}

#[derive(Debug, Deserialize)]
struct PageNumberInput {
    page: Option<usize>,
    page_size: Option<usize>,
}

/// `?page=N&page_size=M`, pages numbered from 1.
#[derive(Debug, Clone)]
pub struct PageNumberPagination {
    page_size: usize,
    max_page_size: usize,
}

impl PageNumberPagination {
    pub fn new(page_size: usize, max_page_size: usize) -> Self {
        let max_page_size = max_page_size.max(1);
        Self {
            page_size: page_size.clamp(1, max_page_size),
            max_page_size,
        }
    }
}

impl Default for PageNumberPagination {
    fn default() -> Self {
        Self::new(100, 1000)
    }
}

impl Pagination for PageNumberPagination {
    fn input_schema(&self) -> TypeRef {
        TypeRef::Schema(SchemaRef {
            name: "PageNumberPaginationInput".to_string(),
            fields: vec![optional_integer("page"), optional_integer("page_size")],
        })
    }

    fn paginate(
        &self,
        items: Vec<Value>,
        request: &RequestContext,
    ) -> Result<PaginatedResponse, PaginationError> {
        let input: PageNumberInput = parse_input(request)?;
        let page = input.page.unwrap_or(1);
        if page == 0 {
            return Err(PaginationError::InvalidPage(
                "page numbers start at 1".to_string(),
            ));
        }
        let page_size = input
            .page_size
            .unwrap_or(self.page_size)
            .clamp(1, self.max_page_size);

        let count = items.len();
        let num_pages = count.div_ceil(page_size).max(1);
        if page > num_pages {
            return Err(PaginationError::EmptyPage(page));
        }

        let uri = request.uri();
        Ok(PaginatedResponse {
            count,
            next: (page < num_pages).then(|| link(uri, &[("page", page + 1)])),
            previous: (page > 1).then(|| link(uri, &[("page", page - 1)])),
            results: items
                .into_iter()
                .skip((page - 1) * page_size)
                .take(page_size)
                .collect(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct LimitOffsetInput {
    limit: Option<usize>,
    offset: Option<usize>,
}

/// `?limit=N&offset=M`.
#[derive(Debug, Clone)]
pub struct LimitOffsetPagination {
    default_limit: usize,
    max_limit: usize,
}

impl LimitOffsetPagination {
    pub fn new(default_limit: usize, max_limit: usize) -> Self {
        let max_limit = max_limit.max(1);
        Self {
            default_limit: default_limit.clamp(1, max_limit),
            max_limit,
        }
    }
}

impl Default for LimitOffsetPagination {
    fn default() -> Self {
        Self::new(100, 1000)
    }
}

impl Pagination for LimitOffsetPagination {
    fn input_schema(&self) -> TypeRef {
        TypeRef::Schema(SchemaRef {
            name: "LimitOffsetPaginationInput".to_string(),
            fields: vec![optional_integer("limit"), optional_integer("offset")],
        })
    }

    fn paginate(
        &self,
        items: Vec<Value>,
        request: &RequestContext,
    ) -> Result<PaginatedResponse, PaginationError> {
        let input: LimitOffsetInput = parse_input(request)?;
        let limit = input
            .limit
            .unwrap_or(self.default_limit)
            .clamp(1, self.max_limit);
        let offset = input.offset.unwrap_or(0);

        let count = items.len();
        let uri = request.uri();
        let next_offset = offset.saturating_add(limit);
        Ok(PaginatedResponse {
            count,
            next: (next_offset < count)
                .then(|| link(uri, &[("limit", limit), ("offset", next_offset)])),
            previous: (offset > 0).then(|| {
                link(
                    uri,
                    &[("limit", limit), ("offset", offset.saturating_sub(limit))],
                )
            }),
            results: items.into_iter().skip(offset).take(limit).collect(),
        })
    }
}
