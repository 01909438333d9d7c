use crate::pagination::{Pagination, PaginationClass};
use dashmap::DashMap;
use std::env;
use std::str::FromStr;
use std::sync::Arc;

/// Prefix of the environment variables read by [`Settings::from_env`].
pub const ENV_PREFIX: &str = "CONTROLLER_ROUTES_";

pub const PAGINATION_PER_PAGE: &str = "PAGINATION_PER_PAGE";
pub const PAGINATION_MAX_PAGE_SIZE: &str = "PAGINATION_MAX_PAGE_SIZE";
pub const PAGINATION_CLASS: &str = "PAGINATION_CLASS";

/// Route settings, keyed without the environment prefix.
#[derive(Clone, Default)]
pub struct Settings {
    values: Arc<DashMap<String, String>>,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads every `CONTROLLER_ROUTES_*` variable.
    pub fn from_env() -> Self {
        Self::from_vars(env::vars())
    }

    pub fn from_vars(vars: impl IntoIterator<Item = (String, String)>) -> Self {
        let settings = Self::default();
        for (key, value) in vars {
            if let Some(name) = key.strip_prefix(ENV_PREFIX) {
                settings.set(name, &value);
            }
        }
        settings
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).map(|v| v.clone())
    }

    pub fn set(&self, key: &str, value: &str) {
        self.values.insert(key.to_string(), value.to_string());
    }

    /// Parses a setting, falling back to `default` when it is unset or malformed.
    pub fn get_or<T: FromStr>(&self, key: &str, default: T) -> T {
        match self.get(key) {
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                tracing::warn!(setting = key, value = %raw, "ignoring malformed setting");
                default
            }),
            None => default,
        }
    }

    pub fn pagination_per_page(&self) -> usize {
        self.get_or(PAGINATION_PER_PAGE, 100)
    }

    pub fn pagination_max_page_size(&self) -> usize {
        self.get_or(PAGINATION_MAX_PAGE_SIZE, 1000)
    }

    pub fn pagination_class(&self) -> PaginationClass {
        self.get_or(PAGINATION_CLASS, PaginationClass::default())
    }

    pub fn pagination(&self) -> Arc<dyn Pagination> {
        self.pagination_class()
            .build(self.pagination_per_page(), self.pagination_max_page_size())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::TypeRef;

    #[test]
    fn test_defaults() {
        let settings = Settings::new();
        assert_eq!(settings.pagination_per_page(), 100);
        assert_eq!(settings.pagination_max_page_size(), 1000);
        assert_eq!(settings.pagination_class(), PaginationClass::PageNumber);
    }

    #[test]
    fn test_from_vars_strips_prefix() {
        let settings = Settings::from_vars(vec![
            ("CONTROLLER_ROUTES_PAGINATION_PER_PAGE".to_string(), "25".to_string()),
            ("CONTROLLER_ROUTES_PAGINATION_CLASS".to_string(), "limit_offset".to_string()),
            ("PATH".to_string(), "/usr/bin".to_string()),
        ]);
        assert_eq!(settings.pagination_per_page(), 25);
        assert_eq!(settings.pagination_class(), PaginationClass::LimitOffset);
        assert_eq!(settings.get("PATH"), None);
    }

    #[test]
    fn test_malformed_value_falls_back() {
        let settings = Settings::new();
        settings.set(PAGINATION_PER_PAGE, "many");
        assert_eq!(settings.pagination_per_page(), 100);
    }

    #[test]
    fn test_pagination_uses_configured_class() {
        let settings = Settings::new();
        settings.set(PAGINATION_CLASS, "limit_offset");
        match settings.pagination().input_schema() {
            TypeRef::Schema(schema) => assert_eq!(schema.name, "LimitOffsetPaginationInput"),
            other => panic!("unexpected schema {other:?}"),
        }
    }
}
