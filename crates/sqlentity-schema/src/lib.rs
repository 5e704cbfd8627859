//! Schema generation for sqlentity.
//!
//! This crate turns every registered entity into DDL:
//! - creation order from the many-to-one dependency graph (Kahn's algorithm)
//! - `CREATE TABLE` with inline foreign keys when the graph is acyclic
//! - a create-then-`ALTER TABLE` fallback when relationships form a cycle
//! - an optional drop pass, bracketed by `SET FOREIGN_KEY_CHECKS`
//!
//! Only fresh creation is supported; there is no migration diffing.

pub mod create;
pub mod generator;
mod order;

pub use create::ForeignKey;
pub use generator::{SchemaGenerator, SchemaOptions, SchemaPlan};

use sqlentity_core::{Connection, Result};

/// Generate the schema for the global registry with default options.
pub fn generate_all(conn: &mut dyn Connection) -> Result<SchemaPlan> {
    SchemaGenerator::with_defaults().generate(conn)
}
