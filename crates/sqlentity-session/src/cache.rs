//! Transaction-scoped entity cache.
//!
//! Every outermost transaction gets its own [`EntityCache`]. Entries are
//! keyed by entity type and key value and stored type-erased, so one cache
//! holds instances of every entity type the transaction touches.
//!
//! Eviction is simple: any insertion into a cache already holding
//! `max_size` entries clears the whole cache first.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::time::{Duration, Instant};

use sqlentity_core::{EntityType, Value};

/// Cache key: entity type plus key value.
#[derive(Debug, Clone)]
pub struct EntityKey {
    entity: EntityType,
    id: Value,
}

impl EntityKey {
    pub fn new(entity: EntityType, id: Value) -> Self {
        Self { entity, id }
    }

    /// Key for an instance of `E`.
    pub fn of<E: 'static>(id: Value) -> Self {
        Self::new(EntityType::of::<E>(), id)
    }

    pub fn entity(&self) -> EntityType {
        self.entity
    }

    pub fn id(&self) -> &Value {
        &self.id
    }
}

impl PartialEq for EntityKey {
    fn eq(&self, other: &Self) -> bool {
        self.entity == other.entity && self.id.key_eq(&other.id)
    }
}

impl Eq for EntityKey {}

impl Hash for EntityKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.entity.hash(state);
        self.id.hash_into(state);
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.entity, self.id)
    }
}

/// Cache sizing and expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Entry count at which the next insertion clears the cache.
    pub max_size: usize,
    /// Age after which an entry is treated as absent. `None` never expires.
    pub expire_after: Option<Duration>,
}

impl CacheConfig {
    pub const DEFAULT_MAX_SIZE: usize = 1000;
    pub const DEFAULT_EXPIRY: Duration = Duration::from_secs(10 * 60);
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: Self::DEFAULT_MAX_SIZE,
            expire_after: Some(Self::DEFAULT_EXPIRY),
        }
    }
}

/// Builder for [`EntityCache`].
#[derive(Debug, Clone, Default)]
pub struct CacheBuilder {
    config: CacheConfig,
}

impl CacheBuilder {
    pub fn max_size(mut self, max_size: usize) -> Self {
        self.config.max_size = max_size;
        self
    }

    pub fn expire_after(mut self, ttl: Duration) -> Self {
        self.config.expire_after = Some(ttl);
        self
    }

    pub fn never_expire(mut self) -> Self {
        self.config.expire_after = None;
        self
    }

    pub fn config(&self) -> CacheConfig {
        self.config
    }

    pub fn build(self) -> EntityCache {
        EntityCache::new(self.config)
    }
}

struct CacheEntry {
    value: Box<dyn Any + Send>,
    stored_at: Instant,
}

/// Bounded map from [`EntityKey`] to a materialized entity.
pub struct EntityCache {
    config: CacheConfig,
    entries: HashMap<EntityKey, CacheEntry>,
}

impl EntityCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            entries: HashMap::new(),
        }
    }

    pub fn builder() -> CacheBuilder {
        CacheBuilder::default()
    }

    pub fn config(&self) -> CacheConfig {
        self.config
    }

    fn is_expired(&self, entry: &CacheEntry) -> bool {
        self.config
            .expire_after
            .is_some_and(|ttl| entry.stored_at.elapsed() >= ttl)
    }

    /// A clone of the cached `E` under `id`, if present and fresh.
    ///
    /// Expired entries are dropped on lookup.
    pub fn get<E: Clone + 'static>(&mut self, id: &Value) -> Option<E> {
        let key = EntityKey::of::<E>(id.clone());
        let expired = match self.entries.get(&key) {
            None => {
                tracing::trace!(key = %key, "Entity cache miss");
                return None;
            }
            Some(entry) => self.is_expired(entry),
        };
        if expired {
            tracing::trace!(key = %key, "Entity cache entry expired");
            self.entries.remove(&key);
            return None;
        }

        let hit = self
            .entries
            .get(&key)
            .and_then(|entry| entry.value.downcast_ref::<E>())
            .cloned();
        tracing::trace!(key = %key, hit = hit.is_some(), "Entity cache lookup");
        hit
    }

    /// Store `entity` under `id`.
    ///
    /// If the cache already holds `max_size` entries it is cleared first,
    /// even when `id` replaces an entry already stored.
    pub fn put<E: Send + 'static>(&mut self, id: Value, entity: E) {
        let key = EntityKey::of::<E>(id);
        if self.entries.len() >= self.config.max_size {
            tracing::debug!(
                entries = self.entries.len(),
                max_size = self.config.max_size,
                "Entity cache full, clearing"
            );
            self.entries.clear();
        }
        self.entries.insert(
            key,
            CacheEntry {
                value: Box::new(entity),
                stored_at: Instant::now(),
            },
        );
    }

    /// Store every `(id, entity)` pair in order.
    pub fn put_all<E, I>(&mut self, entities: I)
    where
        E: Send + 'static,
        I: IntoIterator<Item = (Value, E)>,
    {
        for (id, entity) in entities {
            self.put(id, entity);
        }
    }

    /// Whether a fresh `E` is cached under `id`.
    pub fn contains<E: 'static>(&self, id: &Value) -> bool {
        self.entries
            .get(&EntityKey::of::<E>(id.clone()))
            .is_some_and(|entry| !self.is_expired(entry))
    }

    /// Drop the `E` cached under `id`. Returns whether one was present.
    pub fn remove<E: 'static>(&mut self, id: &Value) -> bool {
        self.entries.remove(&EntityKey::of::<E>(id.clone())).is_some()
    }

    /// Drop every cached instance of `E`.
    pub fn clear_type<E: 'static>(&mut self) {
        let entity = EntityType::of::<E>();
        self.entries.retain(|key, _| key.entity != entity);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for EntityCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl fmt::Debug for EntityCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityCache")
            .field("config", &self.config)
            .field("len", &self.entries.len())
            .finish()
    }
}
