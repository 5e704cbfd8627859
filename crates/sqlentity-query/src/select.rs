//! SELECT query builder.

use sqlentity_core::error::BuilderErrorKind;
use sqlentity_core::identifiers::is_valid_identifier;
use sqlentity_core::{EntityMetadata, Error, Result, Value, echo};

use crate::builder::{check_column, require_table};
use crate::clause::Clause;
use crate::page::{Order, PageRequest, Sort};

/// A SELECT query builder.
///
/// The table is emitted without an alias unless a join is present or
/// column qualification was requested; then the alias (defaulting to the
/// table name) is applied to the table and every projected column.
#[derive(Debug, Clone, Default)]
pub struct SelectBuilder {
    table: Option<String>,
    alias: Option<String>,
    columns: Vec<String>,
    distinct: bool,
    qualify: bool,
    joins: Vec<String>,
    filter: Clause,
    order_by: Vec<Order>,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl SelectBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select from an explicit table.
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Select from an entity's table.
    pub fn for_entity(metadata: &EntityMetadata) -> Self {
        Self::new().table(metadata.table_name())
    }

    /// Project specific columns (default `*`).
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Alias used when the query needs one.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Qualify projected columns with the alias even without joins.
    pub fn qualify_columns(mut self) -> Self {
        self.qualify = true;
        self
    }

    /// Append a raw JOIN fragment, e.g. `JOIN teams t ON t.id = h.team_id`.
    pub fn join(mut self, fragment: impl Into<String>) -> Self {
        self.joins.push(fragment.into());
        self
    }

    /// Add a WHERE predicate, AND-ed with any earlier one.
    pub fn filter(mut self, clause: Clause) -> Self {
        self.filter = std::mem::take(&mut self.filter).and(clause);
        self
    }

    pub fn order_by(mut self, order: Order) -> Self {
        self.order_by.push(order);
        self
    }

    /// Append every term of `sort`.
    pub fn sort(mut self, sort: &Sort) -> Self {
        self.order_by.extend(sort.orders().iter().cloned());
        self
    }

    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn offset(mut self, n: u64) -> Self {
        self.offset = Some(n);
        self
    }

    /// Apply a page request: its sort, `LIMIT size` and `OFFSET (page-1)*size`.
    pub fn page(self, request: &PageRequest) -> Self {
        self.sort(request.sort())
            .limit(request.size())
            .offset(request.offset())
    }

    fn alias_in_use(&self) -> bool {
        self.qualify || !self.joins.is_empty()
    }

    /// `SELECT ... FROM ... [JOIN ...] [WHERE ...]` without ordering or paging.
    fn render_base(&self) -> Result<String> {
        let table = require_table(self.table.as_deref(), "SELECT")?;
        let alias = self
            .alias_in_use()
            .then(|| self.alias.as_deref().unwrap_or(table));

        let mut sql = String::from("SELECT ");
        if self.distinct {
            sql.push_str("DISTINCT ");
        }
        if self.columns.is_empty() {
            sql.push('*');
        } else {
            // Expressions such as `1` or `COUNT(*)` are projected verbatim.
            let projected: Vec<String> = self
                .columns
                .iter()
                .map(|column| match alias {
                    Some(a) if is_valid_identifier(column) && !column.contains('.') => {
                        format!("{}.{}", a, column)
                    }
                    _ => column.clone(),
                })
                .collect();
            sql.push_str(&projected.join(", "));
        }

        sql.push_str(" FROM ");
        sql.push_str(table);
        if let Some(a) = alias {
            check_column(a)?;
            sql.push_str(" AS ");
            sql.push_str(a);
        }
        for join in &self.joins {
            sql.push(' ');
            sql.push_str(join.trim());
        }
        if !self.filter.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(self.filter.sql());
        }
        Ok(sql)
    }

    /// Build the SELECT SQL and parameters.
    #[tracing::instrument(level = "trace", skip(self))]
    pub fn build(&self) -> Result<(String, Vec<Value>)> {
        let mut sql = self.render_base()?;

        if !self.order_by.is_empty() {
            let mut terms = Vec::with_capacity(self.order_by.len());
            for order in &self.order_by {
                if order.column().trim().is_empty() {
                    return Err(Error::builder(
                        BuilderErrorKind::InvalidArgument,
                        "order by column must not be empty",
                    ));
                }
                check_column(order.column())?;
                terms.push(order.to_sql());
            }
            sql.push_str(" ORDER BY ");
            sql.push_str(&terms.join(", "));
        }
        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }
        if let Some(offset) = self.offset {
            sql.push_str(&format!(" OFFSET {}", offset));
        }

        Ok((sql, self.filter.params().to_vec()))
    }

    /// Build, echoing the SQL if echo is enabled.
    pub fn build_with_echo(&self) -> Result<(String, Vec<Value>)> {
        let (sql, params) = self.build()?;
        echo::echo(&sql, &params);
        Ok((sql, params))
    }

    /// Row count of the base query:
    /// `SELECT COUNT(1) AS total FROM (<base>) AS count_table`.
    ///
    /// Ordering, LIMIT and OFFSET are left out of the wrapped query.
    pub fn count_wrapped(&self) -> Result<(String, Vec<Value>)> {
        let base = self.render_base()?;
        let sql = format!("SELECT COUNT(1) AS total FROM ({}) AS count_table", base);
        tracing::trace!(sql = %sql, "Count query");
        echo::echo(&sql, self.filter.params());
        Ok((sql, self.filter.params().to_vec()))
    }
}
