use crate::di::Container;
use std::sync::Arc;

/// Builder for the service container shared by a controller's routes.
///
/// # Example
/// ```
/// use controller_routes::di::ContainerBuilder;
///
/// struct Clock;
///
/// let container = ContainerBuilder::new().register(Clock).build();
/// assert!(container.contains::<Clock>());
/// ```
#[derive(Default)]
pub struct ContainerBuilder {
    container: Container,
}

impl ContainerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a service instance
    pub fn register<T: 'static + Send + Sync>(mut self, instance: T) -> Self {
        self.container.register(instance);
        self
    }

    /// Register an already shared service
    pub fn register_arc<T: 'static + Send + Sync>(mut self, instance: Arc<T>) -> Self {
        self.container.register_arc(instance);
        self
    }

    pub fn build(self) -> Arc<Container> {
        Arc::new(self.container)
    }
}
