//! Transactions, caching and repositories for SQLEntity.
//!
//! `sqlentity-session` is the **runtime layer**: it turns registered entity
//! metadata into working CRUD repositories on top of a
//! [`ConnectionFactory`](sqlentity_core::ConnectionFactory).
//!
//! # Role In The Architecture
//!
//! - **Transaction manager**: one thread-bound connection per outermost
//!   `begin`, with reentrant nesting.
//! - **Entity cache**: a bounded per-transaction map from (type, key) to
//!   materialized instance.
//! - **Repositories**: CRUD, conditional and paged queries, and row mapping
//!   with lazy or eager relationships.
//! - **Repository registry**: resolves relationship targets to the
//!   repository of their type.
//!
//! # Example
//!
//! ```ignore
//! let tx = TransactionManager::new(factory);
//! let repositories = RepositoryRegistry::new();
//! let heroes = repositories.repository::<Hero>(&tx)?;
//!
//! tx.in_transaction(|| heroes.save(hero))?;
//! let page = heroes.find_all_paged(&PageRequest::of(1, 20)?)?;
//! ```

pub mod cache;
pub mod registry;
pub mod repository;
pub mod transaction;

pub use cache::{CacheBuilder, CacheConfig, EntityCache, EntityKey};
pub use registry::RepositoryRegistry;
pub use repository::Repository;
pub use transaction::TransactionManager;
