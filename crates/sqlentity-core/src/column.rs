//! Column declarations and descriptors.

/// Referential action for foreign key constraints (ON DELETE / ON UPDATE).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReferentialAction {
    /// No action - raise error if any references exist.
    NoAction,
    /// Restrict - same as NO ACTION on most databases.
    Restrict,
    /// Cascade - automatically delete/update referencing rows.
    #[default]
    Cascade,
    /// Set null - set referencing columns to NULL.
    SetNull,
    /// Set default - set referencing columns to their default values.
    SetDefault,
}

impl ReferentialAction {
    /// Get the SQL representation of this action.
    #[must_use]
    pub const fn as_sql(&self) -> &'static str {
        match self {
            ReferentialAction::NoAction => "NO ACTION",
            ReferentialAction::Restrict => "RESTRICT",
            ReferentialAction::Cascade => "CASCADE",
            ReferentialAction::SetNull => "SET NULL",
            ReferentialAction::SetDefault => "SET DEFAULT",
        }
    }
}

/// Declarative column marker for one entity attribute.
///
/// Defaults mirror an unadorned column: `VARCHAR` of length 255, nullable,
/// not unique, named after the attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub(crate) name: Option<String>,
    pub(crate) sql_type: String,
    pub(crate) length: u32,
    pub(crate) nullable: bool,
    pub(crate) unique: bool,
    pub(crate) key: bool,
}

impl ColumnDef {
    /// A column with default settings.
    pub fn new() -> Self {
        Self {
            name: None,
            sql_type: "VARCHAR".to_string(),
            length: 255,
            nullable: true,
            unique: false,
            key: false,
        }
    }

    /// Use a physical name different from the attribute name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the declared SQL type keyword.
    pub fn sql_type(mut self, sql_type: impl Into<String>) -> Self {
        self.sql_type = sql_type.into();
        self
    }

    /// Set the length used by variable-width types.
    pub fn length(mut self, length: u32) -> Self {
        self.length = length;
        self
    }

    /// Set nullability.
    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Mark the column `UNIQUE`.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Mark the column as the entity key.
    pub fn key(mut self) -> Self {
        self.key = true;
        self
    }
}

impl Default for ColumnDef {
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable description of one mapped column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub(crate) attribute: String,
    pub(crate) name: String,
    pub(crate) sql_type: String,
    pub(crate) length: u32,
    pub(crate) nullable: bool,
    pub(crate) unique: bool,
    pub(crate) key: bool,
    pub(crate) converter: Option<&'static str>,
}

impl ColumnDescriptor {
    /// The entity attribute this column maps.
    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// Physical column name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared SQL type keyword, as written.
    pub fn sql_type(&self) -> &str {
        &self.sql_type
    }

    pub fn length(&self) -> u32 {
        self.length
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    pub fn is_key(&self) -> bool {
        self.key
    }

    /// Name of the attribute converter applied to this column, if any.
    pub fn converter(&self) -> Option<&'static str> {
        self.converter
    }

    /// SQL type as emitted in DDL.
    ///
    /// Any `VARCHAR*` spelling becomes `VARCHAR(<length>)`; every other type
    /// is upper-cased and passed through.
    pub fn ddl_type(&self) -> String {
        let upper = self.sql_type.trim().to_uppercase();
        if upper.starts_with("VARCHAR") {
            format!("VARCHAR({})", self.length)
        } else {
            upper
        }
    }
}
