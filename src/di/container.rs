use crate::error::{Result, RouteError};
use dashmap::DashMap;
use std::any::{Any, TypeId};
use std::sync::Arc;

/// Thread-safe registry of services that handlers resolve by type.
///
/// Every controller instance receives the container of its controller, so a
/// service registered once is shared by all requests.
#[derive(Clone, Default)]
pub struct Container {
    services: DashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl Container {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: 'static + Send + Sync>(&mut self, instance: T) -> &mut Self {
        self.register_arc(Arc::new(instance))
    }

    pub fn register_arc<T: 'static + Send + Sync>(&mut self, instance: Arc<T>) -> &mut Self {
        self.services.insert(TypeId::of::<T>(), instance);
        self
    }

    pub fn resolve<T: 'static + Send + Sync>(&self) -> Result<Arc<T>> {
        self.try_resolve::<T>()
            .ok_or_else(|| RouteError::DependencyNotFound {
                type_name: std::any::type_name::<T>().to_string(),
            })
    }

    pub fn try_resolve<T: 'static + Send + Sync>(&self) -> Option<Arc<T>> {
        let entry = self.services.get(&TypeId::of::<T>())?;
        entry.value().clone().downcast::<T>().ok()
    }

    pub fn contains<T: 'static>(&self) -> bool {
        self.services.contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}
