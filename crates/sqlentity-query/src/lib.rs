//! Predicate and SQL statement builders for sqlentity.
//!
//! `sqlentity-query` is the **query construction layer**. It turns entity
//! metadata and caller-supplied predicates into SQL text plus an ordered
//! parameter list bound to `?` placeholders.
//!
//! # Role In The Architecture
//!
//! - **Predicates**: `ClauseBuilder` accumulates conditions imperatively,
//!   `ClauseExpression` composes them as a tree; both render a `Clause`.
//! - **Statements**: `SelectBuilder`, `InsertBuilder`, `UpdateBuilder` and
//!   `DeleteBuilder` render one statement each.
//! - **Paging**: `Order`, `Sort`, `PageRequest` and `Page` describe sorted,
//!   1-indexed pages of results.
//!
//! Only identifiers are spliced into SQL text; every value is a parameter.
//! Repositories in `sqlentity-session` drive these builders.

pub mod builder;
pub mod clause;
pub mod page;
pub mod select;

pub use builder::{DeleteBuilder, InsertBuilder, UpdateBuilder};
pub use clause::{Clause, ClauseBuilder, ClauseExpression, Conjunction, IntoClause};
pub use page::{Order, OrderDirection, Page, PageRequest, Sort};
pub use select::SelectBuilder;
