//! Query builders for INSERT, UPDATE, DELETE operations.

use sqlentity_core::error::BuilderErrorKind;
use sqlentity_core::identifiers::is_valid_identifier;
use sqlentity_core::{EntityMetadata, Error, Result, Value, echo};

use crate::clause::Clause;

/// The bound table, or `MissingTable`.
pub(crate) fn require_table<'a>(table: Option<&'a str>, statement: &str) -> Result<&'a str> {
    let table = table.map(str::trim).filter(|t| !t.is_empty()).ok_or_else(|| {
        Error::builder(
            BuilderErrorKind::MissingTable,
            format!("table name is required for {} query", statement),
        )
    })?;
    if !is_valid_identifier(table) {
        return Err(Error::builder(
            BuilderErrorKind::InvalidArgument,
            format!("'{}' is not a valid table name", table),
        ));
    }
    Ok(table)
}

pub(crate) fn check_column(column: &str) -> Result<()> {
    if is_valid_identifier(column) {
        Ok(())
    } else {
        Err(Error::builder(
            BuilderErrorKind::InvalidArgument,
            format!("'{}' is not a valid column name", column),
        ))
    }
}

/// INSERT query builder.
///
/// Values are laid out row-major: with columns `[a, b]`, the values
/// `[1, "x", 2, "y"]` insert two rows.
#[derive(Debug, Clone, Default)]
pub struct InsertBuilder {
    table: Option<String>,
    columns: Vec<String>,
    values: Vec<Value>,
}

impl InsertBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Insert into an entity's table, across all of its columns.
    pub fn for_entity(metadata: &EntityMetadata) -> Self {
        Self::new()
            .table(metadata.table_name())
            .columns(metadata.column_names())
    }

    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Append values, row-major.
    pub fn values<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.values.extend(values.into_iter().map(Into::into));
        self
    }

    /// Build the INSERT SQL and parameters.
    pub fn build(&self) -> Result<(String, Vec<Value>)> {
        let table = require_table(self.table.as_deref(), "INSERT")?;
        if self.columns.is_empty() {
            return Err(Error::builder(
                BuilderErrorKind::MissingColumns,
                "columns are required for INSERT query",
            ));
        }
        for column in &self.columns {
            check_column(column)?;
        }
        let width = self.columns.len();
        if self.values.is_empty() || self.values.len() % width != 0 {
            return Err(Error::builder(
                BuilderErrorKind::ValueCountMismatch,
                format!(
                    "{} values do not fill whole rows of {} columns",
                    self.values.len(),
                    width
                ),
            ));
        }

        let group = format!("({})", vec!["?"; width].join(", "));
        let groups = vec![group.as_str(); self.values.len() / width].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES {}",
            table,
            self.columns.join(", "),
            groups
        );
        Ok((sql, self.values.clone()))
    }

    /// Build, echoing the SQL if echo is enabled.
    pub fn build_with_echo(&self) -> Result<(String, Vec<Value>)> {
        let (sql, params) = self.build()?;
        echo::echo(&sql, &params);
        Ok((sql, params))
    }
}

/// UPDATE query builder.
#[derive(Debug, Clone, Default)]
pub struct UpdateBuilder {
    table: Option<String>,
    assignments: Vec<(String, Value)>,
    filter: Clause,
}

impl UpdateBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn for_entity(metadata: &EntityMetadata) -> Self {
        Self::new().table(metadata.table_name())
    }

    /// Add a `column = ?` assignment.
    pub fn set(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.assignments.push((column.into(), value.into()));
        self
    }

    /// Add a WHERE predicate, AND-ed with any earlier one.
    pub fn filter(mut self, clause: Clause) -> Self {
        self.filter = std::mem::take(&mut self.filter).and(clause);
        self
    }

    /// Build the UPDATE SQL and parameters: SET values, then WHERE values.
    pub fn build(&self) -> Result<(String, Vec<Value>)> {
        let table = require_table(self.table.as_deref(), "UPDATE")?;
        if self.assignments.is_empty() {
            return Err(Error::builder(
                BuilderErrorKind::NoSetClause,
                "at least one SET assignment is required for UPDATE query",
            ));
        }

        let mut set_clauses = Vec::with_capacity(self.assignments.len());
        let mut params = Vec::with_capacity(self.assignments.len() + self.filter.params().len());
        for (column, value) in &self.assignments {
            check_column(column)?;
            set_clauses.push(format!("{} = ?", column));
            params.push(value.clone());
        }

        let mut sql = format!("UPDATE {} SET {}", table, set_clauses.join(", "));
        if !self.filter.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(self.filter.sql());
            params.extend(self.filter.params().iter().cloned());
        }
        Ok((sql, params))
    }

    /// Build, echoing the SQL if echo is enabled.
    pub fn build_with_echo(&self) -> Result<(String, Vec<Value>)> {
        let (sql, params) = self.build()?;
        echo::echo(&sql, &params);
        Ok((sql, params))
    }
}

/// DELETE query builder.
#[derive(Debug, Clone, Default)]
pub struct DeleteBuilder {
    table: Option<String>,
    filter: Clause,
}

impl DeleteBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn for_entity(metadata: &EntityMetadata) -> Self {
        Self::new().table(metadata.table_name())
    }

    /// Add a WHERE predicate, AND-ed with any earlier one.
    pub fn filter(mut self, clause: Clause) -> Self {
        self.filter = std::mem::take(&mut self.filter).and(clause);
        self
    }

    /// Build the DELETE SQL and parameters.
    pub fn build(&self) -> Result<(String, Vec<Value>)> {
        let table = require_table(self.table.as_deref(), "DELETE")?;
        let mut sql = format!("DELETE FROM {}", table);
        if !self.filter.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(self.filter.sql());
        }
        Ok((sql, self.filter.params().to_vec()))
    }

    /// Build, echoing the SQL if echo is enabled.
    pub fn build_with_echo(&self) -> Result<(String, Vec<Value>)> {
        let (sql, params) = self.build()?;
        echo::echo(&sql, &params);
        Ok((sql, params))
    }
}
