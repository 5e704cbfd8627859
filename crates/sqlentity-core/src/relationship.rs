//! Relationship metadata and the repository-resolution hook.
//!
//! A relationship is declared on the owning entity with a [`RelationshipDef`]
//! and scanned into an immutable [`RelationshipDescriptor`]. At row-mapping
//! time the target side is loaded through a [`RepositoryResolver`], which maps
//! a target [`EntityType`] to an [`EntityLoader`] (in practice, that type's
//! repository).

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::entity::EntityType;
use crate::error::Result;
use crate::value::Value;

/// Cardinality and direction of a relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationshipKind {
    /// Many `Book`s belong to one `Author`; the join column lives on `Book`.
    ManyToOne,
    /// One `Author` has many `Book`s; always collection-valued.
    OneToMany,
    /// One `User` has one `Profile`.
    OneToOne,
}

impl RelationshipKind {
    /// Lower-case, hyphenated name used in diagnostics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            RelationshipKind::ManyToOne => "many-to-one",
            RelationshipKind::OneToMany => "one-to-many",
            RelationshipKind::OneToOne => "one-to-one",
        }
    }
}

impl fmt::Display for RelationshipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// When the target side of a relationship is loaded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum FetchMode {
    /// Resolve while the owning row is mapped.
    Eager,
    /// Resolve on first access.
    #[default]
    Lazy,
}

/// Declarative relationship marker for one entity attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipDef {
    pub(crate) kind: RelationshipKind,
    pub(crate) join_column: Option<String>,
    pub(crate) mapped_by: Option<String>,
    pub(crate) fetch: FetchMode,
}

impl RelationshipDef {
    fn of_kind(kind: RelationshipKind) -> Self {
        Self {
            kind,
            join_column: None,
            mapped_by: None,
            fetch: FetchMode::Lazy,
        }
    }

    /// Owning side of a many-to-one association, keyed by `join_column` on
    /// this entity's table.
    pub fn many_to_one(join_column: impl Into<String>) -> Self {
        Self::of_kind(RelationshipKind::ManyToOne).join_column(join_column)
    }

    /// Collection side of an association. Pair with
    /// [`mapped_by`](Self::mapped_by) or [`join_column`](Self::join_column)
    /// naming the foreign key on the target table.
    pub fn one_to_many() -> Self {
        Self::of_kind(RelationshipKind::OneToMany)
    }

    pub fn one_to_one() -> Self {
        Self::of_kind(RelationshipKind::OneToOne)
    }

    /// Set the foreign-key column.
    pub fn join_column(mut self, column: impl Into<String>) -> Self {
        self.join_column = Some(column.into()).filter(|c: &String| !c.trim().is_empty());
        self
    }

    /// Name the attribute on the target entity that owns this association.
    pub fn mapped_by(mut self, attribute: impl Into<String>) -> Self {
        self.mapped_by = Some(attribute.into()).filter(|a: &String| !a.trim().is_empty());
        self
    }

    pub fn fetch(mut self, fetch: FetchMode) -> Self {
        self.fetch = fetch;
        self
    }

    /// Shorthand for `fetch(FetchMode::Eager)`.
    pub fn eager(self) -> Self {
        self.fetch(FetchMode::Eager)
    }
}

/// Immutable description of one relationship attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipDescriptor {
    pub(crate) kind: RelationshipKind,
    pub(crate) attribute: String,
    pub(crate) target: EntityType,
    pub(crate) join_column: Option<String>,
    pub(crate) mapped_by: Option<String>,
    pub(crate) collection: bool,
    pub(crate) fetch: FetchMode,
}

impl RelationshipDescriptor {
    pub fn kind(&self) -> RelationshipKind {
        self.kind
    }

    /// The attribute on the owning entity.
    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// Target entity type, with any lazy wrapper unwrapped.
    ///
    /// Untyped when the element type of a collection could not be resolved.
    pub fn target(&self) -> EntityType {
        self.target
    }

    pub fn join_column(&self) -> Option<&str> {
        self.join_column.as_deref()
    }

    pub fn mapped_by(&self) -> Option<&str> {
        self.mapped_by.as_deref()
    }

    pub fn is_collection(&self) -> bool {
        self.collection
    }

    pub fn fetch(&self) -> FetchMode {
        self.fetch
    }

    /// Whether this side holds the foreign key column.
    pub fn is_owning_side(&self) -> bool {
        self.join_column.is_some() && self.mapped_by.is_none() && !self.collection
    }
}

/// How to find the target rows of a relationship.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    /// The target row whose key equals the value (single-valued owning side).
    ById(Value),
    /// Every target row whose `column` equals `value` (inverse side).
    ByColumn { column: String, value: Value },
}

/// Loads materialized entities of one type.
///
/// Returned items are boxed instances of the loader's entity type; callers
/// downcast them to the target type they expect.
pub trait EntityLoader: Send + Sync {
    fn load(&self, lookup: &Lookup) -> Result<Vec<Box<dyn Any + Send>>>;
}

/// Pluggable hook mapping an entity type to its loader.
pub trait RepositoryResolver: Send + Sync {
    fn loader_for(&self, target: EntityType) -> Option<Arc<dyn EntityLoader>>;
}
