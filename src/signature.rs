//! Explicit call-signature metadata for handlers.
//!
//! A [`Signature`] is an ordered list of [`Param`] descriptors. It is never used
//! to bind arguments; it describes what a route exposes to documentation and
//! request binding. The transformations here are pure: they take a signature
//! and return a new one.

use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;

/// Parameters that carry request context and are never exposed.
pub const CONTEXT_PARAMETERS: [&str; 3] = ["context", "self", "request"];

/// Name of the filter parameter injected into list routes.
pub const FILTERS_PARAMETER: &str = "filters";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, strum_macros::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ParamKind {
    PositionalOnly,
    PositionalOrKeyword,
    VarPositional,
    KeywordOnly,
    VarKeyword,
}

/// Marks a parameter as framework-managed query input.
///
/// `default: None` is the required marker (no fallback value).
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct QueryMarker {
    pub default: Option<Value>,
}

impl QueryMarker {
    pub fn required() -> Self {
        Self { default: None }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ParamDefault {
    #[default]
    Empty,
    Value(Value),
    Query(QueryMarker),
}

impl ParamDefault {
    pub fn is_empty(&self) -> bool {
        matches!(self, ParamDefault::Empty)
    }

    pub fn is_query(&self) -> bool {
        matches!(self, ParamDefault::Query(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum_macros::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Scalar {
    String,
    Integer,
    Number,
    Boolean,
}

impl Scalar {
    /// Parses a raw path or query value into the JSON value of this scalar.
    pub fn coerce(self, raw: &str) -> Option<Value> {
        match self {
            Scalar::String => Some(Value::String(raw.to_string())),
            Scalar::Integer => raw.parse::<i64>().ok().map(Value::from),
            Scalar::Number => raw.parse::<f64>().ok().map(Value::from),
            Scalar::Boolean => match raw {
                "true" | "1" | "on" | "yes" => Some(Value::Bool(true)),
                "false" | "0" | "off" | "no" => Some(Value::Bool(false)),
                _ => None,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaField {
    pub name: String,
    pub ty: Scalar,
    pub required: bool,
}

/// A named object schema, such as a pagination request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaRef {
    pub name: String,
    pub fields: Vec<SchemaField>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(tag = "kind", content = "of", rename_all = "snake_case")]
pub enum TypeRef {
    #[default]
    Any,
    Scalar(Scalar),
    Named(String),
    Schema(SchemaRef),
}

impl TypeRef {
    /// Maps a Rust type as written in source to its annotation.
    ///
    /// `Option<T>` maps to the annotation of `T`.
    pub fn from_type_name(name: &str) -> Self {
        let name: String = name.chars().filter(|c| !c.is_whitespace()).collect();
        let inner = name
            .strip_prefix("Option<")
            .and_then(|rest| rest.strip_suffix('>'))
            .unwrap_or(&name);
        match inner {
            "String" | "&str" | "str" => TypeRef::Scalar(Scalar::String),
            "i8" | "i16" | "i32" | "i64" | "i128" | "isize" | "u8" | "u16" | "u32" | "u64"
            | "u128" | "usize" => TypeRef::Scalar(Scalar::Integer),
            "f32" | "f64" => TypeRef::Scalar(Scalar::Number),
            "bool" => TypeRef::Scalar(Scalar::Boolean),
            "Value" | "serde_json::Value" => TypeRef::Any,
            other => TypeRef::Named(other.to_string()),
        }
    }

    pub fn scalar(&self) -> Option<Scalar> {
        match self {
            TypeRef::Scalar(scalar) => Some(*scalar),
            _ => None,
        }
    }
}

/// One declared parameter: name, kind, default and annotation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Param {
    pub name: String,
    pub kind: ParamKind,
    pub default: ParamDefault,
    pub annotation: TypeRef,
}

impl Param {
    pub fn new(name: impl Into<String>, kind: ParamKind) -> Self {
        Self {
            name: name.into(),
            kind,
            default: ParamDefault::Empty,
            annotation: TypeRef::Any,
        }
    }

    pub fn positional(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::PositionalOrKeyword)
    }

    pub fn keyword_only(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::KeywordOnly)
    }

    #[must_use]
    pub fn annotated(mut self, annotation: TypeRef) -> Self {
        self.annotation = annotation;
        self
    }

    #[must_use]
    pub fn with_default(mut self, default: Value) -> Self {
        self.default = ParamDefault::Value(default);
        self
    }

    /// Marks the parameter as required query input.
    #[must_use]
    pub fn query(mut self) -> Self {
        self.default = ParamDefault::Query(QueryMarker::required());
        self
    }

    pub fn is_context(&self) -> bool {
        CONTEXT_PARAMETERS.contains(&self.name.as_str())
    }

    pub fn is_required(&self) -> bool {
        match &self.default {
            ParamDefault::Empty => !matches!(
                self.kind,
                ParamKind::VarPositional | ParamKind::VarKeyword
            ),
            ParamDefault::Query(marker) => marker.default.is_none(),
            ParamDefault::Value(_) => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Signature {
    params: Vec<Param>,
}

impl Signature {
    pub fn new(params: Vec<Param>) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Param> {
        self.params.iter().find(|param| param.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.params.iter().map(|param| param.name.as_str())
    }

    /// Checks the ordering rules a well-formed parameter list obeys.
    pub fn validate(&self) -> std::result::Result<(), String> {
        let mut seen = HashSet::new();
        let mut last_kind = ParamKind::PositionalOnly;
        let mut positional_default_seen = false;
        let mut query_param: Option<&str> = None;

        for param in &self.params {
            if !seen.insert(param.name.as_str()) {
                return Err(format!("duplicate parameter `{}`", param.name));
            }
            if param.default.is_query() {
                if let Some(first) = query_param {
                    return Err(format!(
                        "query parameter `{}` follows query parameter `{first}`; only one is allowed",
                        param.name
                    ));
                }
                query_param = Some(param.name.as_str());
            }
            if param.kind < last_kind {
                return Err(format!(
                    "{} parameter `{}` cannot follow a {} parameter",
                    param.kind, param.name, last_kind
                ));
            }
            if param.kind == last_kind
                && matches!(param.kind, ParamKind::VarPositional | ParamKind::VarKeyword)
            {
                return Err(format!("more than one {} parameter", param.kind));
            }
            if matches!(
                param.kind,
                ParamKind::PositionalOnly | ParamKind::PositionalOrKeyword
            ) {
                if param.default.is_empty() && positional_default_seen {
                    return Err(format!(
                        "non-default parameter `{}` follows a default parameter",
                        param.name
                    ));
                }
                positional_default_seen |= !param.default.is_empty();
            }
            last_kind = param.kind;
        }
        Ok(())
    }

    /// The signature without its request-context parameters.
    ///
    /// Order, kinds, defaults and annotations are preserved.
    #[must_use]
    pub fn required(&self) -> Signature {
        Signature::new(
            self.params
                .iter()
                .filter(|param| !param.is_context())
                .cloned()
                .collect(),
        )
    }

    pub fn has_query_param(&self) -> bool {
        self.params.iter().any(|param| param.default.is_query())
    }

    /// Appends a parameter, keeping a trailing variadic keyword parameter last.
    #[must_use]
    pub fn with_param(mut self, param: Param) -> Signature {
        let position = self
            .params
            .iter()
            .position(|existing| existing.kind == ParamKind::VarKeyword)
            .unwrap_or(self.params.len());
        self.params.insert(position, param);
        self
    }
}
