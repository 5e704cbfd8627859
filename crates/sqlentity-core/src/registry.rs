//! Entity metadata registry.
//!
//! [`Registry::global`] is the process-wide table consulted by repositories
//! and the schema generator. Independent registries can be created with
//! [`Registry::new`] for tests and embedded use. Cloning a registry shares
//! its table.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use crate::entity::{Entity, EntityMetadata, EntityType};
use crate::error::{Error, MetadataErrorKind, Result};

#[derive(Default)]
struct RegistryState {
    order: Vec<EntityType>,
    entries: HashMap<EntityType, Arc<EntityMetadata>>,
}

/// Memoized metadata keyed by entity type, in registration order.
#[derive(Clone, Default)]
pub struct Registry {
    state: Arc<Mutex<RegistryState>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry.
    pub fn global() -> &'static Registry {
        static GLOBAL: OnceLock<Registry> = OnceLock::new();
        GLOBAL.get_or_init(Registry::new)
    }

    /// Register `E`, scanning its descriptor on first registration.
    ///
    /// Registering again returns the stored metadata. Scanning happens under
    /// the registry lock, so concurrent callers build the metadata once.
    pub fn register<E: Entity>(&self) -> Result<Arc<EntityMetadata>> {
        let entity_type = EntityType::of::<E>();
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = state.entries.get(&entity_type) {
            return Ok(Arc::clone(existing));
        }

        let metadata = Arc::new(E::descriptor().scan()?);
        tracing::debug!(
            entity = entity_type.name(),
            table = metadata.table_name(),
            "Registered entity"
        );
        state.order.push(entity_type);
        state.entries.insert(entity_type, Arc::clone(&metadata));
        Ok(metadata)
    }

    /// Metadata of a registered `E`.
    pub fn get<E: Entity>(&self) -> Result<Arc<EntityMetadata>> {
        let entity_type = EntityType::of::<E>();
        self.get_by_type(entity_type).ok_or_else(|| {
            Error::metadata(
                MetadataErrorKind::NotRegistered,
                entity_type.name(),
                "entity type is not registered",
            )
        })
    }

    pub fn get_by_type(&self, entity_type: EntityType) -> Option<Arc<EntityMetadata>> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.entries.get(&entity_type).cloned()
    }

    pub fn contains(&self, entity_type: EntityType) -> bool {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.entries.contains_key(&entity_type)
    }

    /// Every registered entity, in registration order.
    pub fn all_registered(&self) -> Vec<Arc<EntityMetadata>> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state
            .order
            .iter()
            .filter_map(|t| state.entries.get(t).cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .order
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("Registry")
            .field("entities", &state.order)
            .finish()
    }
}

/// Register `E` in the global registry.
pub fn register<E: Entity>() -> Result<Arc<EntityMetadata>> {
    Registry::global().register::<E>()
}

/// Look up `E` in the global registry.
pub fn get<E: Entity>() -> Result<Arc<EntityMetadata>> {
    Registry::global().get::<E>()
}

/// Every entity in the global registry, in registration order.
pub fn all_registered() -> Vec<Arc<EntityMetadata>> {
    Registry::global().all_registered()
}
