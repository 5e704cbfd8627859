//! Repository lookup by entity type.
//!
//! Relationship loading needs the repository of the *target* type. A
//! [`RepositoryRegistry`] is the owned table that answers that question; it
//! implements [`RepositoryResolver`] and is handed to every repository it
//! creates.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, Weak};

use sqlentity_core::error::RepositoryNotFoundError;
use sqlentity_core::{Entity, EntityLoader, EntityType, Error, RepositoryResolver, Result};

use crate::repository::Repository;
use crate::transaction::TransactionManager;

/// Entity type to loader table.
#[derive(Default)]
pub struct RepositoryRegistry {
    loaders: RwLock<HashMap<EntityType, Arc<dyn EntityLoader>>>,
}

/// Resolver handed to repositories; does not keep the registry alive.
struct WeakResolver(Weak<RepositoryRegistry>);

impl RepositoryResolver for WeakResolver {
    fn loader_for(&self, target: EntityType) -> Option<Arc<dyn EntityLoader>> {
        self.0.upgrade()?.loader_for(target)
    }
}

impl RepositoryRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Build a repository for `E` that resolves relationships through this
    /// registry, and register it.
    pub fn repository<E: Entity>(
        self: &Arc<Self>,
        manager: &TransactionManager,
    ) -> Result<Arc<Repository<E>>> {
        let resolver: Arc<dyn RepositoryResolver> = Arc::new(WeakResolver(Arc::downgrade(self)));
        let repository = Arc::new(Repository::<E>::new(manager.clone(), resolver)?);
        self.register(Arc::clone(&repository));
        Ok(repository)
    }

    /// Register an existing repository, replacing any earlier one for `E`.
    pub fn register<E: Entity>(&self, repository: Arc<Repository<E>>) {
        self.register_loader(EntityType::of::<E>(), repository);
    }

    pub fn register_loader(&self, entity: EntityType, loader: Arc<dyn EntityLoader>) {
        tracing::debug!(entity = entity.name(), "Registered repository");
        self.loaders
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(entity, loader);
    }

    pub fn contains(&self, entity: EntityType) -> bool {
        self.loaders
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&entity)
    }

    /// The loader for `entity`, or `RepositoryNotFound`.
    pub fn require(&self, entity: EntityType) -> Result<Arc<dyn EntityLoader>> {
        self.loader_for(entity).ok_or_else(|| {
            Error::RepositoryNotFound(RepositoryNotFoundError {
                entity: entity.name().to_string(),
            })
        })
    }

    pub fn len(&self) -> usize {
        self.loaders
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RepositoryResolver for RepositoryRegistry {
    fn loader_for(&self, target: EntityType) -> Option<Arc<dyn EntityLoader>> {
        self.loaders
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&target)
            .cloned()
    }
}

impl fmt::Debug for RepositoryRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let loaders = self.loaders.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("RepositoryRegistry")
            .field("entities", &loaders.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlentity_core::{Lookup, Value};
    use std::any::Any;

    struct Fixed;

    impl EntityLoader for Fixed {
        fn load(&self, _lookup: &Lookup) -> Result<Vec<Box<dyn Any + Send>>> {
            Ok(vec![Box::new(42_i64) as Box<dyn Any + Send>])
        }
    }

    struct Marker;

    #[test]
    fn resolves_registered_loaders() {
        let registry = RepositoryRegistry::new();
        assert!(registry.is_empty());
        let entity = EntityType::of::<Marker>();
        registry.register_loader(entity, Arc::new(Fixed));

        assert!(registry.contains(entity));
        assert_eq!(registry.len(), 1);
        let loaded = registry
            .require(entity)
            .unwrap()
            .load(&Lookup::ById(Value::Int(1)))
            .unwrap();
        assert_eq!(loaded[0].downcast_ref::<i64>(), Some(&42));
    }

    #[test]
    fn missing_loader_is_repository_not_found() {
        let registry = RepositoryRegistry::new();
        let err = registry.require(EntityType::of::<Marker>()).err().unwrap();
        assert!(matches!(err, Error::RepositoryNotFound(ref e) if e.entity == "Marker"));
        assert!(registry.loader_for(EntityType::of::<Marker>()).is_none());
    }

    #[test]
    fn weak_resolver_does_not_keep_registry_alive() {
        let registry = RepositoryRegistry::new();
        registry.register_loader(EntityType::of::<Marker>(), Arc::new(Fixed));
        let resolver = WeakResolver(Arc::downgrade(&registry));
        assert!(resolver.loader_for(EntityType::of::<Marker>()).is_some());
        drop(registry);
        assert!(resolver.loader_for(EntityType::of::<Marker>()).is_none());
    }
}
