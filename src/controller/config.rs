use crate::config::Settings;
use crate::controller::ObjectSource;
use crate::di::Container;
use crate::pagination::{PageNumberPagination, Pagination};
use crate::permission::{AllowAny, Permission};
use std::fmt;
use std::sync::Arc;

/// Controller-level defaults shared by every route of one controller:
/// permission classes, object source, lookup field, paginator and services.
///
/// # Example
/// ```
/// use controller_routes::controller::{ControllerConfig, ObjectList};
/// use controller_routes::permission::IsAuthenticated;
///
/// let books = ControllerConfig::new("BookController")
///     .permission(IsAuthenticated)
///     .objects(ObjectList::new("id", vec![]))
///     .lookup_field("id")
///     .build();
/// assert_eq!(books.name(), "BookController");
/// ```
pub struct ControllerConfig {
    name: String,
    permissions: Vec<Arc<dyn Permission>>,
    default_permissions: bool,
    objects: Option<Arc<dyn ObjectSource>>,
    lookup_field: String,
    pagination: Arc<dyn Pagination>,
    container: Arc<Container>,
}

impl ControllerConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            permissions: vec![Arc::new(AllowAny)],
            default_permissions: true,
            objects: None,
            lookup_field: "id".to_string(),
            pagination: Arc::new(PageNumberPagination::default()),
            container: Arc::new(Container::new()),
        }
    }

    /// Replaces the permission classes.
    #[must_use]
    pub fn permissions(mut self, permissions: Vec<Arc<dyn Permission>>) -> Self {
        self.permissions = permissions;
        self.default_permissions = false;
        self
    }

    /// Adds one permission class, dropping the default `AllowAny`.
    #[must_use]
    pub fn permission(mut self, permission: impl Permission) -> Self {
        if self.default_permissions {
            self.permissions.clear();
            self.default_permissions = false;
        }
        self.permissions.push(Arc::new(permission));
        self
    }

    #[must_use]
    pub fn objects(mut self, objects: impl ObjectSource) -> Self {
        self.objects = Some(Arc::new(objects));
        self
    }

    #[must_use]
    pub fn lookup_field(mut self, lookup_field: impl Into<String>) -> Self {
        self.lookup_field = lookup_field.into();
        self
    }

    #[must_use]
    pub fn pagination(mut self, pagination: impl Pagination) -> Self {
        self.pagination = Arc::new(pagination);
        self
    }

    #[must_use]
    pub fn container(mut self, container: Arc<Container>) -> Self {
        self.container = container;
        self
    }

    /// Takes the paginator from settings.
    #[must_use]
    pub fn with_settings(mut self, settings: &Settings) -> Self {
        self.pagination = settings.pagination();
        self
    }

    pub fn build(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn permission_classes(&self) -> &[Arc<dyn Permission>] {
        &self.permissions
    }

    pub fn object_source(&self) -> Option<&Arc<dyn ObjectSource>> {
        self.objects.as_ref()
    }

    pub fn lookup_field_name(&self) -> &str {
        &self.lookup_field
    }

    pub fn paginator(&self) -> &Arc<dyn Pagination> {
        &self.pagination
    }

    pub fn services(&self) -> &Arc<Container> {
        &self.container
    }
}

impl fmt::Debug for ControllerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerConfig")
            .field("name", &self.name)
            .field("permissions", &self.permissions.len())
            .field("has_objects", &self.objects.is_some())
            .field("lookup_field", &self.lookup_field)
            .finish()
    }
}
