//! Core types and traits for sqlentity.
//!
//! This crate provides the foundations the other crates build on:
//!
//! - `Value`/`Row` for bound parameters and result rows
//! - `Connection`/`ConnectionFactory`, the seam to a database driver
//! - `Entity` descriptors, accessor tables and scanned `EntityMetadata`
//! - the process-wide metadata `Registry`
//! - `LazyReference`/`LazyCollection` deferred relationship loaders
//! - attribute converters and the SQL echo toggle

pub mod column;
pub mod connection;
pub mod convert;
pub mod echo;
pub mod entity;
pub mod error;
pub mod identifiers;
pub mod lazy;
pub mod registry;
pub mod relationship;
pub mod row;
pub mod value;

pub use column::{ColumnDef, ColumnDescriptor, ReferentialAction};
pub use connection::{Connection, ConnectionFactory};
pub use convert::{AttributeConverter, EnumConverter};
pub use entity::{
    Accessor, BindRequest, Binding, Entity, EntityDescriptor, EntityMetadata, EntityType,
    scan_entity,
};
pub use error::{Error, Result};
pub use lazy::{LazyCollection, LazyReference, lazy_collection, lazy_reference};
pub use registry::Registry;
pub use relationship::{
    EntityLoader, FetchMode, Lookup, RelationshipDef, RelationshipDescriptor, RelationshipKind,
    RepositoryResolver,
};
pub use row::{ColumnInfo, Row};
pub use value::Value;
