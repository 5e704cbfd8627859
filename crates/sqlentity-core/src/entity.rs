//! Entity descriptors, accessor tables and scanned metadata.
//!
//! An entity type describes itself once through [`Entity::descriptor`]: a
//! table declaration plus, per attribute, a column or relationship marker and
//! the accessor that reads and writes the attribute. Scanning a descriptor
//! yields an immutable [`EntityMetadata`], which the [`Registry`] memoizes.
//!
//! ```
//! use sqlentity_core::{Accessor, ColumnDef, Entity, EntityDescriptor};
//!
//! #[derive(Debug, Default, Clone)]
//! struct Genre {
//!     id: i64,
//!     name: String,
//! }
//!
//! impl Entity for Genre {
//!     fn descriptor() -> EntityDescriptor<Self> {
//!         EntityDescriptor::entity()
//!             .column(
//!                 "id",
//!                 ColumnDef::new().sql_type("BIGINT").key(),
//!                 Accessor::new(|g: &Genre| g.id, |g, v| g.id = v),
//!             )
//!             .column(
//!                 "name",
//!                 ColumnDef::new().length(80),
//!                 Accessor::new(|g: &Genre| g.name.clone(), |g, v| g.name = v),
//!             )
//!     }
//! }
//!
//! let meta = Genre::descriptor().scan().unwrap();
//! assert_eq!(meta.table_name(), "genres");
//! assert_eq!(meta.key_column().map(|c| c.name()), Some("id"));
//! ```
//!
//! [`Registry`]: crate::registry::Registry

use std::any::{Any, TypeId};
use std::collections::HashSet;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::column::{ColumnDef, ColumnDescriptor};
use crate::convert::AttributeConverter;
use crate::error::{Error, MetadataErrorKind, RepositoryNotFoundError, Result, TypeError};
use crate::identifiers::check_identifier;
use crate::lazy::{LazyCollection, LazyReference};
use crate::registry::Registry;
use crate::relationship::{
    EntityLoader, FetchMode, Lookup, RelationshipDef, RelationshipDescriptor, RelationshipKind,
    RepositoryResolver,
};
use crate::value::Value;

/// Runtime identity of an entity type.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityType {
    id: TypeId,
    name: &'static str,
}

/// Placeholder target for collections whose element type is unknown.
struct Untyped;

impl EntityType {
    /// Identity of `T`, named by its unqualified type name.
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: short_type_name(std::any::type_name::<T>()),
        }
    }

    /// The untyped placeholder.
    pub fn untyped() -> Self {
        Self {
            id: TypeId::of::<Untyped>(),
            name: "Object",
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_untyped(&self) -> bool {
        self.id == TypeId::of::<Untyped>()
    }
}

impl fmt::Debug for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityType({})", self.name)
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// `my_crate::models::Book<T>` -> `Book`
pub(crate) fn short_type_name(full: &'static str) -> &'static str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// A type mapped to a table.
///
/// Materialization starts from `Default::default()` and fills attributes
/// through the accessors in the descriptor.
pub trait Entity: Default + Clone + Send + Sync + 'static {
    /// Declare the table, columns and relationships of this type.
    fn descriptor() -> EntityDescriptor<Self>;
}

/// Scan an entity type's descriptor without registering it.
pub fn scan_entity<E: Entity>() -> Result<EntityMetadata> {
    E::descriptor().scan()
}

type Getter<E> = Box<dyn Fn(&E) -> Value + Send + Sync>;
type Setter<E> = Box<dyn Fn(&mut E, Value) -> Result<()> + Send + Sync>;

/// Getter/setter pair for one scalar attribute.
pub struct Accessor<E> {
    get: Getter<E>,
    set: Setter<E>,
    converter: Option<&'static str>,
}

/// Convert a column value; a NULL the attribute cannot hold leaves the
/// attribute at its default.
fn decode<T>(value: Value) -> Result<Option<T>>
where
    T: TryFrom<Value, Error = Error>,
{
    let was_null = value.is_null();
    match T::try_from(value) {
        Ok(v) => Ok(Some(v)),
        Err(_) if was_null => Ok(None),
        Err(e) => Err(e),
    }
}

impl<E: 'static> Accessor<E> {
    /// Accessor for an attribute stored as-is.
    pub fn new<T, G, S>(get: G, set: S) -> Self
    where
        T: Into<Value> + TryFrom<Value, Error = Error> + 'static,
        G: Fn(&E) -> T + Send + Sync + 'static,
        S: Fn(&mut E, T) + Send + Sync + 'static,
    {
        Self {
            get: Box::new(move |entity| get(entity).into()),
            set: Box::new(move |entity, value| {
                if let Some(v) = decode::<T>(value)? {
                    set(entity, v);
                }
                Ok(())
            }),
            converter: None,
        }
    }

    /// Accessor for an attribute stored through a converter.
    pub fn converted<A, C, K, G, S>(converter: K, get: G, set: S) -> Self
    where
        K: AttributeConverter<A, C> + 'static,
        C: Into<Value> + TryFrom<Value, Error = Error> + 'static,
        A: 'static,
        G: Fn(&E) -> A + Send + Sync + 'static,
        S: Fn(&mut E, A) + Send + Sync + 'static,
    {
        let converter = Arc::new(converter);
        let reader = Arc::clone(&converter);
        Self {
            get: Box::new(move |entity| reader.to_database_column(&get(entity)).into()),
            set: Box::new(move |entity, value| {
                if let Some(stored) = decode::<C>(value)? {
                    set(entity, converter.to_entity_attribute(stored)?);
                }
                Ok(())
            }),
            converter: Some(short_type_name(std::any::type_name::<K>())),
        }
    }

    /// Read the attribute as a bindable value.
    pub fn read(&self, entity: &E) -> Value {
        (self.get)(entity)
    }

    /// Assign a column value to the attribute.
    pub fn write(&self, entity: &mut E, value: Value) -> Result<()> {
        (self.set)(entity, value)
    }

    pub fn converter(&self) -> Option<&'static str> {
        self.converter
    }
}

impl<E> fmt::Debug for Accessor<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Accessor")
            .field("converter", &self.converter)
            .finish_non_exhaustive()
    }
}

/// Everything a binding needs to wire one relationship attribute.
pub struct BindRequest {
    pub fetch: FetchMode,
    /// `None` when there is nothing to load (NULL foreign key).
    pub lookup: Option<Lookup>,
    pub resolver: Arc<dyn RepositoryResolver>,
}

trait RelationBinder<E>: Send + Sync {
    fn target(&self) -> EntityType;
    fn is_collection(&self) -> bool;
    fn is_direct(&self) -> bool {
        false
    }
    fn target_metadata(&self, registry: &Registry) -> Result<Option<Arc<EntityMetadata>>>;
    fn bind(&self, entity: &mut E, request: BindRequest) -> Result<()>;
}

/// Setter for one relationship attribute, typed by its target entity.
pub struct Binding<E> {
    binder: Box<dyn RelationBinder<E>>,
}

impl<E: 'static> Binding<E> {
    /// Attribute holding the target directly (`Option<T>`).
    ///
    /// The target is resolved while the row is mapped, so the relationship
    /// must be declared eager.
    pub fn direct<T, S>(set: S) -> Self
    where
        T: Entity,
        S: Fn(&mut E, Option<T>) + Send + Sync + 'static,
    {
        Self {
            binder: Box::new(DirectBinder {
                set,
                target: PhantomData,
            }),
        }
    }

    /// Attribute holding a [`LazyReference<T>`].
    pub fn lazy<T, S>(set: S) -> Self
    where
        T: Entity,
        S: Fn(&mut E, LazyReference<T>) + Send + Sync + 'static,
    {
        Self {
            binder: Box::new(LazyBinder {
                set,
                target: PhantomData,
            }),
        }
    }

    /// Attribute holding a [`LazyCollection<T>`].
    pub fn collection<T, S>(set: S) -> Self
    where
        T: Entity,
        S: Fn(&mut E, LazyCollection<T>) + Send + Sync + 'static,
    {
        Self {
            binder: Box::new(CollectionBinder {
                set,
                target: PhantomData,
            }),
        }
    }

    /// Collection attribute whose element type is not an entity.
    ///
    /// Its target is the untyped placeholder and mapping leaves it untouched.
    pub fn unbound_collection() -> Self {
        Self {
            binder: Box::new(UnboundBinder),
        }
    }
}

impl<E> Binding<E> {
    pub fn target(&self) -> EntityType {
        self.binder.target()
    }

    pub fn is_collection(&self) -> bool {
        self.binder.is_collection()
    }

    /// Whether the attribute holds its target by value rather than behind a
    /// lazy handle.
    pub fn is_direct(&self) -> bool {
        self.binder.is_direct()
    }

    /// Metadata of the target type in `registry`, registering it if needed.
    pub fn target_metadata(&self, registry: &Registry) -> Result<Option<Arc<EntityMetadata>>> {
        self.binder.target_metadata(registry)
    }

    /// Wire the attribute on `entity`.
    pub fn bind(&self, entity: &mut E, request: BindRequest) -> Result<()> {
        self.binder.bind(entity, request)
    }
}

impl<E> fmt::Debug for Binding<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("target", &self.target())
            .field("collection", &self.is_collection())
            .finish()
    }
}

fn loader_for<T: Entity>(resolver: &dyn RepositoryResolver) -> Result<Arc<dyn EntityLoader>> {
    let target = EntityType::of::<T>();
    resolver.loader_for(target).ok_or_else(|| {
        Error::RepositoryNotFound(RepositoryNotFoundError {
            entity: target.name().to_string(),
        })
    })
}

fn downcast<T: Entity>(item: Box<dyn Any + Send>) -> Result<T> {
    item.downcast::<T>().map(|boxed| *boxed).map_err(|_| {
        Error::Type(TypeError {
            expected: std::any::type_name::<T>(),
            actual: "entity of another type".to_string(),
            column: None,
        })
    })
}

fn load_one<T: Entity>(resolver: &dyn RepositoryResolver, lookup: &Lookup) -> Result<Option<T>> {
    let loader = loader_for::<T>(resolver)?;
    loader
        .load(lookup)?
        .into_iter()
        .next()
        .map(downcast::<T>)
        .transpose()
}

fn load_all<T: Entity>(resolver: &dyn RepositoryResolver, lookup: &Lookup) -> Result<Vec<T>> {
    let loader = loader_for::<T>(resolver)?;
    loader.load(lookup)?.into_iter().map(downcast::<T>).collect()
}

fn register_target<T: Entity>(registry: &Registry) -> Result<Option<Arc<EntityMetadata>>> {
    registry.register::<T>().map(Some)
}

struct DirectBinder<T, S> {
    set: S,
    target: PhantomData<fn() -> T>,
}

impl<E, T, S> RelationBinder<E> for DirectBinder<T, S>
where
    T: Entity,
    S: Fn(&mut E, Option<T>) + Send + Sync,
{
    fn target(&self) -> EntityType {
        EntityType::of::<T>()
    }

    fn is_collection(&self) -> bool {
        false
    }

    fn is_direct(&self) -> bool {
        true
    }

    fn target_metadata(&self, registry: &Registry) -> Result<Option<Arc<EntityMetadata>>> {
        register_target::<T>(registry)
    }

    fn bind(&self, entity: &mut E, request: BindRequest) -> Result<()> {
        let value = match &request.lookup {
            Some(lookup) => load_one::<T>(request.resolver.as_ref(), lookup)?,
            None => None,
        };
        (self.set)(entity, value);
        Ok(())
    }
}

struct LazyBinder<T, S> {
    set: S,
    target: PhantomData<fn() -> T>,
}

impl<E, T, S> RelationBinder<E> for LazyBinder<T, S>
where
    T: Entity,
    S: Fn(&mut E, LazyReference<T>) + Send + Sync,
{
    fn target(&self) -> EntityType {
        EntityType::of::<T>()
    }

    fn is_collection(&self) -> bool {
        false
    }

    fn target_metadata(&self, registry: &Registry) -> Result<Option<Arc<EntityMetadata>>> {
        register_target::<T>(registry)
    }

    fn bind(&self, entity: &mut E, request: BindRequest) -> Result<()> {
        let reference = match (request.lookup, request.fetch) {
            (None, _) => LazyReference::empty(),
            (Some(lookup), FetchMode::Eager) => {
                LazyReference::loaded(load_one::<T>(request.resolver.as_ref(), &lookup)?)
            }
            (Some(lookup), FetchMode::Lazy) => {
                let resolver = request.resolver;
                LazyReference::new(move || load_one::<T>(resolver.as_ref(), &lookup))
            }
        };
        (self.set)(entity, reference);
        Ok(())
    }
}

struct CollectionBinder<T, S> {
    set: S,
    target: PhantomData<fn() -> T>,
}

impl<E, T, S> RelationBinder<E> for CollectionBinder<T, S>
where
    T: Entity,
    S: Fn(&mut E, LazyCollection<T>) + Send + Sync,
{
    fn target(&self) -> EntityType {
        EntityType::of::<T>()
    }

    fn is_collection(&self) -> bool {
        true
    }

    fn target_metadata(&self, registry: &Registry) -> Result<Option<Arc<EntityMetadata>>> {
        register_target::<T>(registry)
    }

    fn bind(&self, entity: &mut E, request: BindRequest) -> Result<()> {
        let collection = match request.lookup {
            None => LazyCollection::loaded(Vec::new()),
            Some(lookup) => {
                let resolver = request.resolver;
                LazyCollection::new(move || load_all::<T>(resolver.as_ref(), &lookup))
            }
        };
        (self.set)(entity, collection);
        Ok(())
    }
}

struct UnboundBinder;

impl<E> RelationBinder<E> for UnboundBinder {
    fn target(&self) -> EntityType {
        EntityType::untyped()
    }

    fn is_collection(&self) -> bool {
        true
    }

    fn target_metadata(&self, _registry: &Registry) -> Result<Option<Arc<EntityMetadata>>> {
        Ok(None)
    }

    fn bind(&self, _entity: &mut E, _request: BindRequest) -> Result<()> {
        Ok(())
    }
}

struct ColumnEntry<E> {
    attribute: String,
    def: ColumnDef,
    accessor: Accessor<E>,
}

struct RelationshipEntry<E> {
    attribute: String,
    def: RelationshipDef,
    binding: Binding<E>,
}

/// Declaration of an entity type: table, columns, relationships.
pub struct EntityDescriptor<E> {
    marked: bool,
    table: Option<String>,
    columns: Vec<ColumnEntry<E>>,
    relationships: Vec<RelationshipEntry<E>>,
}

impl<E: 'static> EntityDescriptor<E> {
    /// A descriptor carrying the entity marker.
    pub fn entity() -> Self {
        Self {
            marked: true,
            table: None,
            columns: Vec::new(),
            relationships: Vec::new(),
        }
    }

    /// A descriptor without the entity marker. Scanning it fails.
    pub fn unmarked() -> Self {
        Self {
            marked: false,
            ..Self::entity()
        }
    }

    /// Explicit table name. Blank names fall back to the default.
    pub fn table(mut self, name: impl Into<String>) -> Self {
        self.table = Some(name.into());
        self
    }

    /// Declare a scalar column.
    pub fn column(mut self, attribute: impl Into<String>, def: ColumnDef, accessor: Accessor<E>) -> Self {
        self.columns.push(ColumnEntry {
            attribute: attribute.into(),
            def,
            accessor,
        });
        self
    }

    /// Declare a relationship attribute.
    pub fn relationship(
        mut self,
        attribute: impl Into<String>,
        def: RelationshipDef,
        binding: Binding<E>,
    ) -> Self {
        self.relationships.push(RelationshipEntry {
            attribute: attribute.into(),
            def,
            binding,
        });
        self
    }

    pub fn accessor(&self, attribute: &str) -> Option<&Accessor<E>> {
        self.columns
            .iter()
            .find(|c| c.attribute == attribute)
            .map(|c| &c.accessor)
    }

    pub fn binding(&self, attribute: &str) -> Option<&Binding<E>> {
        self.relationships
            .iter()
            .find(|r| r.attribute == attribute)
            .map(|r| &r.binding)
    }

    /// Default table name: the lower-cased type name plus `s`.
    fn default_table_name() -> String {
        format!("{}s", EntityType::of::<E>().name().to_lowercase())
    }

    /// Build the immutable metadata for `E`.
    pub fn scan(&self) -> Result<EntityMetadata> {
        let entity_type = EntityType::of::<E>();
        let entity = entity_type.name();
        if !self.marked {
            return Err(Error::metadata(
                MetadataErrorKind::InvalidEntity,
                entity,
                format!("type {} carries no entity marker", entity),
            ));
        }

        let table_name = self
            .table
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map_or_else(Self::default_table_name, str::to_string);
        check_identifier(entity, "table", &table_name)?;

        let mut seen = HashSet::new();
        let mut key_index = None;
        let mut columns = Vec::with_capacity(self.columns.len());
        for entry in &self.columns {
            let name = entry
                .def
                .name
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .unwrap_or(&entry.attribute)
                .to_string();
            check_identifier(entity, "column", &name)?;
            if !seen.insert(name.to_lowercase()) {
                return Err(Error::metadata(
                    MetadataErrorKind::DuplicateColumn,
                    entity,
                    format!("column '{}' is mapped more than once", name),
                ));
            }
            if entry.def.key {
                if key_index.is_some() {
                    return Err(Error::metadata(
                        MetadataErrorKind::DuplicateKey,
                        entity,
                        format!("attribute '{}' is a second key", entry.attribute),
                    ));
                }
                key_index = Some(columns.len());
            }
            columns.push(ColumnDescriptor {
                attribute: entry.attribute.clone(),
                name,
                sql_type: entry.def.sql_type.clone(),
                length: entry.def.length,
                nullable: entry.def.nullable,
                unique: entry.def.unique,
                key: entry.def.key,
                converter: entry.accessor.converter(),
            });
        }

        let mut relationships = Vec::with_capacity(self.relationships.len());
        for entry in &self.relationships {
            let collection = entry.binding.is_collection();
            let contradiction = match entry.def.kind {
                RelationshipKind::ManyToOne if collection => Some("is collection-valued"),
                RelationshipKind::OneToMany if !collection => Some("is not collection-valued"),
                _ if entry.binding.is_direct() && entry.def.fetch == FetchMode::Lazy => {
                    Some("holds its target directly and must be fetched eagerly")
                }
                _ => None,
            };
            if let Some(problem) = contradiction {
                return Err(Error::metadata(
                    MetadataErrorKind::InvalidRelationship,
                    entity,
                    format!(
                        "{} attribute '{}' {}",
                        entry.def.kind, entry.attribute, problem
                    ),
                ));
            }
            if let Some(join_column) = &entry.def.join_column {
                check_identifier(entity, "join column", join_column)?;
            }
            relationships.push(RelationshipDescriptor {
                kind: entry.def.kind,
                attribute: entry.attribute.clone(),
                target: entry.binding.target(),
                join_column: entry.def.join_column.clone(),
                mapped_by: entry.def.mapped_by.clone(),
                collection,
                fetch: entry.def.fetch,
            });
        }

        Ok(EntityMetadata {
            entity_type,
            table_name,
            columns,
            key_index,
            relationships,
        })
    }
}

impl<E> fmt::Debug for EntityDescriptor<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityDescriptor")
            .field("marked", &self.marked)
            .field("table", &self.table)
            .field("columns", &self.columns.len())
            .field("relationships", &self.relationships.len())
            .finish()
    }
}

/// Scanned, immutable mapping of one entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityMetadata {
    entity_type: EntityType,
    table_name: String,
    columns: Vec<ColumnDescriptor>,
    key_index: Option<usize>,
    relationships: Vec<RelationshipDescriptor>,
}

impl EntityMetadata {
    pub fn entity_type(&self) -> EntityType {
        self.entity_type
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Scalar columns in declaration order.
    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    pub fn key_column(&self) -> Option<&ColumnDescriptor> {
        self.key_index.and_then(|i| self.columns.get(i))
    }

    /// The key column, or a `MissingKey` error.
    pub fn require_key(&self) -> Result<&ColumnDescriptor> {
        self.key_column().ok_or_else(|| {
            Error::metadata(
                MetadataErrorKind::MissingKey,
                self.entity_type.name(),
                format!("table {} has no key column", self.table_name),
            )
        })
    }

    pub fn column_for_attribute(&self, attribute: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.attribute == attribute)
    }

    /// Column by physical name, ignoring case.
    pub fn column_by_name(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn relationships(&self) -> &[RelationshipDescriptor] {
        &self.relationships
    }

    pub fn relationship(&self, attribute: &str) -> Option<&RelationshipDescriptor> {
        self.relationships.iter().find(|r| r.attribute == attribute)
    }

    /// Physical column names in declaration order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}
