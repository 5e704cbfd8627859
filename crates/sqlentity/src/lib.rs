//! SQLEntity - a lightweight, metadata-driven ORM kernel.
//!
//! SQLEntity maps plain structs to tables through explicit descriptors and
//! provides:
//!
//! - Entity metadata scanned once and memoized in a process-wide registry
//! - Parameterized SELECT/INSERT/UPDATE/DELETE builders and a clause builder
//! - Schema generation with dependency-ordered CREATE TABLE and foreign keys
//! - Reentrant, thread-bound transactions with a per-transaction entity cache
//! - Generic repositories with paging and lazy or eager relationships
//!
//! # Quick Start
//!
//! ```ignore
//! use sqlentity::prelude::*;
//!
//! #[derive(Debug, Default, Clone)]
//! struct Hero {
//!     id: i64,
//!     name: String,
//!     age: Option<i32>,
//! }
//!
//! impl Entity for Hero {
//!     fn descriptor() -> EntityDescriptor<Self> {
//!         EntityDescriptor::entity()
//!             .table("heroes")
//!             .column("id", ColumnDef::new().sql_type("BIGINT").key(),
//!                 Accessor::new(|h: &Hero| h.id, |h, v| h.id = v))
//!             .column("name", ColumnDef::new().length(80).nullable(false),
//!                 Accessor::new(|h: &Hero| h.name.clone(), |h, v| h.name = v))
//!             .column("age", ColumnDef::new().sql_type("INT"),
//!                 Accessor::new(|h: &Hero| h.age, |h, v| h.age = v))
//!     }
//! }
//!
//! fn run(factory: impl ConnectionFactory + 'static) -> Result<()> {
//!     let tx = TransactionManager::new(factory);
//!     let repositories = RepositoryRegistry::new();
//!     let heroes = repositories.repository::<Hero>(&tx)?;
//!
//!     tx.in_transaction(|| {
//!         tx.with_connection(|conn| SchemaGenerator::with_defaults().generate(conn))?;
//!         heroes.save(Hero { id: 1, name: "Deadpond".into(), age: None })
//!     })?;
//!
//!     let adults = heroes.find_with_condition(ClauseBuilder::new().greater("age", 18))?;
//!     let first_page = heroes.find_all_paged(&PageRequest::of(1, 20)?)?;
//!     Ok(())
//! }
//! ```

pub use sqlentity_core::{
    Accessor, AttributeConverter, BindRequest, Binding, ColumnDef, ColumnDescriptor, ColumnInfo,
    Connection, ConnectionFactory, Entity, EntityDescriptor, EntityLoader, EntityMetadata,
    EntityType, EnumConverter, Error, FetchMode, LazyCollection, LazyReference, Lookup,
    ReferentialAction, Registry, RelationshipDef, RelationshipDescriptor, RelationshipKind,
    RepositoryResolver, Result, Row, Value, lazy_collection, lazy_reference, scan_entity,
};
pub use sqlentity_core::{echo, error, registry};

pub use sqlentity_query::{
    Clause, ClauseBuilder, ClauseExpression, Conjunction, DeleteBuilder, InsertBuilder,
    IntoClause, Order, OrderDirection, Page, PageRequest, SelectBuilder, Sort, UpdateBuilder,
};

pub use sqlentity_schema::{ForeignKey, SchemaGenerator, SchemaOptions, SchemaPlan, generate_all};

pub use sqlentity_session::{
    CacheBuilder, CacheConfig, EntityCache, EntityKey, Repository, RepositoryRegistry,
    TransactionManager,
};

/// Prelude module for convenient imports.
///
/// ```ignore
/// use sqlentity::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        // Entity declaration
        Accessor,
        Binding,
        // Query building
        ClauseBuilder,
        ColumnDef,
        // Connections
        Connection,
        ConnectionFactory,
        Entity,
        EntityDescriptor,
        EnumConverter,
        Error,
        FetchMode,
        LazyCollection,
        LazyReference,
        Order,
        Page,
        PageRequest,
        RelationshipDef,
        // Repositories
        Repository,
        RepositoryRegistry,
        Result,
        Row,
        // Schema
        SchemaGenerator,
        SchemaOptions,
        Sort,
        TransactionManager,
        Value,
    };
}
