//! WHERE predicates: the imperative [`ClauseBuilder`], the declarative
//! [`ClauseExpression`] tree, and the rendered [`Clause`] both produce.

use sqlentity_core::error::BuilderErrorKind;
use sqlentity_core::identifiers::is_valid_identifier;
use sqlentity_core::{Error, Result, Value};

/// A rendered predicate and its parameters, in placeholder order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Clause {
    sql: String,
    params: Vec<Value>,
}

impl Clause {
    /// Wrap raw predicate text. `params` must match its `?` placeholders.
    pub fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// The always-true clause: renders nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    pub fn is_empty(&self) -> bool {
        self.sql.trim().is_empty()
    }

    pub fn into_parts(self) -> (String, Vec<Value>) {
        (self.sql, self.params)
    }

    /// `(self) AND (other)`, skipping whichever side is empty.
    pub fn and(self, other: Clause) -> Clause {
        match (self.is_empty(), other.is_empty()) {
            (_, true) => self,
            (true, false) => other,
            (false, false) => {
                let mut params = self.params;
                params.extend(other.params);
                Clause {
                    sql: format!("({}) AND ({})", self.sql, other.sql),
                    params,
                }
            }
        }
    }
}

/// Anything that renders to a [`Clause`].
pub trait IntoClause {
    fn into_clause(self) -> Result<Clause>;
}

impl IntoClause for Clause {
    fn into_clause(self) -> Result<Clause> {
        Ok(self)
    }
}

impl IntoClause for ClauseBuilder {
    fn into_clause(self) -> Result<Clause> {
        self.build()
    }
}

impl IntoClause for ClauseExpression {
    fn into_clause(self) -> Result<Clause> {
        Ok(self.to_clause())
    }
}

/// Logical connective between two conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conjunction {
    And,
    Or,
}

impl Conjunction {
    pub const fn as_sql(&self) -> &'static str {
        match self {
            Conjunction::And => "AND",
            Conjunction::Or => "OR",
        }
    }
}

/// Accumulates WHERE conditions left to right.
///
/// Consecutive conditions are joined with `AND` unless [`or`](Self::or) (or
/// an explicit [`and`](Self::and)) comes between them. A scalar comparison
/// against NULL is skipped entirely, as is `IN` over an empty set, which
/// makes optional filters easy to express:
///
/// ```
/// use sqlentity_query::ClauseBuilder;
///
/// let min_age: Option<i32> = None;
/// let clause = ClauseBuilder::new()
///     .equal("status", "active")
///     .greater_or_equal("age", min_age)
///     .or()
///     .unwrap()
///     .is_null("deleted_at")
///     .build()
///     .unwrap();
/// assert_eq!(clause.sql(), "status = ? OR deleted_at IS NULL");
/// assert_eq!(clause.params().len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct ClauseBuilder {
    sql: String,
    params: Vec<Value>,
    has_condition: bool,
    pending: Option<Conjunction>,
    invalid_column: Option<String>,
}

impl ClauseBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn equal(self, column: &str, value: impl Into<Value>) -> Self {
        self.compare(column, "=", value.into())
    }

    pub fn not_equal(self, column: &str, value: impl Into<Value>) -> Self {
        self.compare(column, "<>", value.into())
    }

    pub fn greater(self, column: &str, value: impl Into<Value>) -> Self {
        self.compare(column, ">", value.into())
    }

    pub fn less(self, column: &str, value: impl Into<Value>) -> Self {
        self.compare(column, "<", value.into())
    }

    pub fn greater_or_equal(self, column: &str, value: impl Into<Value>) -> Self {
        self.compare(column, ">=", value.into())
    }

    pub fn less_or_equal(self, column: &str, value: impl Into<Value>) -> Self {
        self.compare(column, "<=", value.into())
    }

    pub fn like(self, column: &str, pattern: impl Into<Value>) -> Self {
        self.compare(column, "LIKE", pattern.into())
    }

    /// `column IN (?,?,...)`; skipped when `values` is empty.
    pub fn in_list<I, V>(self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.membership(column, "IN", values.into_iter().map(Into::into).collect())
    }

    /// `column NOT IN (?,?,...)`; skipped when `values` is empty.
    pub fn not_in<I, V>(self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.membership(column, "NOT IN", values.into_iter().map(Into::into).collect())
    }

    pub fn is_null(mut self, column: &str) -> Self {
        if self.check_column(column) {
            self.push_condition(&format!("{} IS NULL", column), Vec::new());
        }
        self
    }

    /// Join the next condition with `AND`.
    pub fn and(self) -> Result<Self> {
        self.conjunction(Conjunction::And)
    }

    /// Join the next condition with `OR`.
    pub fn or(self) -> Result<Self> {
        self.conjunction(Conjunction::Or)
    }

    /// Add a parenthesized sub-predicate built by `f`.
    ///
    /// An empty group adds nothing.
    pub fn group<F>(mut self, f: F) -> Result<Self>
    where
        F: FnOnce(ClauseBuilder) -> Result<ClauseBuilder>,
    {
        let nested = f(ClauseBuilder::new())?.build()?;
        if !nested.is_empty() {
            let (sql, params) = nested.into_parts();
            self.push_condition(&format!("({})", sql), params);
        }
        Ok(self)
    }

    /// Render the accumulated predicate.
    ///
    /// An empty builder renders an empty clause.
    pub fn build(&self) -> Result<Clause> {
        if let Some(column) = &self.invalid_column {
            return Err(Error::builder(
                BuilderErrorKind::InvalidArgument,
                format!("'{}' is not a valid column name", column),
            ));
        }
        if let Some(op) = self.pending {
            return Err(Error::builder(
                BuilderErrorKind::IllegalSequence,
                format!("missing condition after {}", op.as_sql()),
            ));
        }
        Ok(Clause::new(self.sql.clone(), self.params.clone()))
    }

    /// Parameters collected so far.
    pub fn params(&self) -> &[Value] {
        &self.params
    }

    fn compare(mut self, column: &str, op: &str, value: Value) -> Self {
        if value.is_null() || !self.check_column(column) {
            return self;
        }
        self.push_condition(&format!("{} {} ?", column, op), vec![value]);
        self
    }

    fn membership(mut self, column: &str, op: &str, values: Vec<Value>) -> Self {
        if values.is_empty() || !self.check_column(column) {
            return self;
        }
        let placeholders = vec!["?"; values.len()].join(",");
        self.push_condition(&format!("{} {} ({})", column, op, placeholders), values);
        self
    }

    fn conjunction(mut self, op: Conjunction) -> Result<Self> {
        if !self.has_condition {
            return Err(Error::builder(
                BuilderErrorKind::IllegalSequence,
                format!("cannot use {} without a preceding condition", op.as_sql()),
            ));
        }
        self.pending = Some(op);
        Ok(self)
    }

    fn push_condition(&mut self, sql: &str, params: Vec<Value>) {
        if self.has_condition {
            let op = self.pending.take().unwrap_or(Conjunction::And);
            self.sql.push(' ');
            self.sql.push_str(op.as_sql());
            self.sql.push(' ');
        }
        self.sql.push_str(sql);
        self.params.extend(params);
        self.has_condition = true;
    }

    /// Column names are spliced into SQL, so only plain identifiers pass.
    /// The first bad name is reported by `build`.
    fn check_column(&mut self, column: &str) -> bool {
        if is_valid_identifier(column) {
            return true;
        }
        if self.invalid_column.is_none() {
            self.invalid_column = Some(column.to_string());
        }
        false
    }
}

/// Declarative predicate tree.
///
/// Rendering walks the tree in order (left, node, right): leaves render
/// parenthesized, inner nodes as their connective, and parameters follow the
/// same order as the placeholders they bind to.
#[derive(Debug, Clone, PartialEq)]
pub enum ClauseExpression {
    Leaf {
        text: String,
        params: Vec<Value>,
    },
    Node {
        op: Conjunction,
        left: Box<ClauseExpression>,
        right: Box<ClauseExpression>,
    },
}

impl ClauseExpression {
    /// A predicate fragment with its parameters.
    pub fn leaf(text: impl Into<String>, params: Vec<Value>) -> Self {
        ClauseExpression::Leaf {
            text: text.into(),
            params,
        }
    }

    /// A fragment without parameters.
    pub fn raw(text: impl Into<String>) -> Self {
        Self::leaf(text, Vec::new())
    }

    pub fn and(left: ClauseExpression, right: ClauseExpression) -> Self {
        ClauseExpression::Node {
            op: Conjunction::And,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn or(left: ClauseExpression, right: ClauseExpression) -> Self {
        ClauseExpression::Node {
            op: Conjunction::Or,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn to_clause(&self) -> Clause {
        let mut sql = String::new();
        let mut params = Vec::new();
        self.render(None, &mut sql, &mut params);
        Clause::new(sql, params)
    }

    fn render(&self, parent: Option<Conjunction>, sql: &mut String, params: &mut Vec<Value>) {
        match self {
            ClauseExpression::Leaf { text, params: own } => {
                sql.push('(');
                sql.push_str(text);
                sql.push(')');
                params.extend(own.iter().cloned());
            }
            ClauseExpression::Node { op, left, right } => {
                // Mixed connectives need explicit grouping to keep their shape.
                let wrap = parent.is_some_and(|p| p != *op);
                if wrap {
                    sql.push('(');
                }
                left.render(Some(*op), sql, params);
                sql.push(' ');
                sql.push_str(op.as_sql());
                sql.push(' ');
                right.render(Some(*op), sql, params);
                if wrap {
                    sql.push(')');
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_scalar_is_skipped() {
        let clause = ClauseBuilder::new().equal("age", Value::Null).build().unwrap();
        assert!(clause.is_empty());
        assert!(clause.params().is_empty());

        let none: Option<i32> = None;
        let clause = ClauseBuilder::new().equal("age", none).build().unwrap();
        assert_eq!(clause.sql(), "");
    }

    #[test]
    fn single_equality() {
        let clause = ClauseBuilder::new().equal("age", 18).build().unwrap();
        assert_eq!(clause.sql(), "age = ?");
        assert_eq!(clause.params(), &[Value::Int(18)]);
    }

    #[test]
    fn operators_and_default_and() {
        let clause = ClauseBuilder::new()
            .not_equal("a", 1)
            .greater("b", 2)
            .less("c", 3)
            .greater_or_equal("d", 4)
            .less_or_equal("e", 5)
            .like("f", "x%")
            .build()
            .unwrap();
        assert_eq!(
            clause.sql(),
            "a <> ? AND b > ? AND c < ? AND d >= ? AND e <= ? AND f LIKE ?"
        );
        assert_eq!(clause.params().len(), 6);
        assert_eq!(clause.params()[5], Value::from("x%"));
    }

    #[test]
    fn membership_lists() {
        let clause = ClauseBuilder::new()
            .in_list("id", [1, 2, 3])
            .not_in("status", Vec::<String>::new())
            .not_in("kind", ["a", "b"])
            .build()
            .unwrap();
        assert_eq!(clause.sql(), "id IN (?,?,?) AND kind NOT IN (?,?)");
        assert_eq!(
            clause.params(),
            &[
                Value::Int(1),
                Value::Int(2),
                Value::Int(3),
                Value::from("a"),
                Value::from("b")
            ]
        );
    }

    #[test]
    fn explicit_connectives() {
        let clause = ClauseBuilder::new()
            .equal("a", 1)
            .or()
            .unwrap()
            .equal("b", 2)
            .and()
            .unwrap()
            .is_null("c")
            .build()
            .unwrap();
        assert_eq!(clause.sql(), "a = ? OR b = ? AND c IS NULL");
    }

    #[test]
    fn connective_sequence_errors() {
        let err = ClauseBuilder::new().and().unwrap_err();
        assert_eq!(err.builder_kind(), Some(BuilderErrorKind::IllegalSequence));

        let err = ClauseBuilder::new().equal("a", 1).or().unwrap().build().unwrap_err();
        assert_eq!(err.builder_kind(), Some(BuilderErrorKind::IllegalSequence));

        // A skipped NULL condition does not count as a preceding condition.
        let err = ClauseBuilder::new().equal("a", Value::Null).or().unwrap_err();
        assert_eq!(err.builder_kind(), Some(BuilderErrorKind::IllegalSequence));
    }

    #[test]
    fn groups() {
        let clause = ClauseBuilder::new()
            .equal("team_id", 4)
            .or()
            .unwrap()
            .group(|g| Ok(g.greater("age", 30).or()?.like("name", "A%")))
            .unwrap()
            .group(|g| Ok(g.equal("x", Value::Null)))
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(clause.sql(), "team_id = ? OR (age > ? OR name LIKE ?)");
        assert_eq!(
            clause.params(),
            &[Value::Int(4), Value::Int(30), Value::from("A%")]
        );
    }

    #[test]
    fn bad_column_names_fail_at_build() {
        let err = ClauseBuilder::new()
            .equal("name; DROP TABLE heroes", "x")
            .equal("age", 3)
            .build()
            .unwrap_err();
        assert_eq!(err.builder_kind(), Some(BuilderErrorKind::InvalidArgument));
    }

    #[test]
    fn expression_tree_renders_in_order() {
        let expr = ClauseExpression::or(
            ClauseExpression::and(
                ClauseExpression::leaf("age > ?", vec![Value::Int(18)]),
                ClauseExpression::leaf("name LIKE ?", vec![Value::from("J%")]),
            ),
            ClauseExpression::raw("deleted_at IS NULL"),
        );
        let clause = expr.to_clause();
        assert_eq!(
            clause.sql(),
            "((age > ?) AND (name LIKE ?)) OR (deleted_at IS NULL)"
        );
        assert_eq!(clause.params(), &[Value::Int(18), Value::from("J%")]);
        assert_eq!(clause.sql().matches('?').count(), clause.params().len());
    }

    #[test]
    fn same_connective_chains_stay_flat() {
        let expr = ClauseExpression::and(
            ClauseExpression::and(
                ClauseExpression::leaf("a = ?", vec![Value::Int(1)]),
                ClauseExpression::leaf("b = ?", vec![Value::Int(2)]),
            ),
            ClauseExpression::leaf("c = ?", vec![Value::Int(3)]),
        );
        assert_eq!(expr.to_clause().sql(), "(a = ?) AND (b = ?) AND (c = ?)");
    }

    #[test]
    fn clause_and_skips_empty_sides() {
        let a = Clause::new("a = ?", vec![Value::Int(1)]);
        assert_eq!(a.clone().and(Clause::empty()), a);
        assert_eq!(Clause::empty().and(a.clone()), a);
        let both = a.and(Clause::new("b = ?", vec![Value::Int(2)]));
        assert_eq!(both.sql(), "(a = ?) AND (b = ?)");
        assert_eq!(both.params().len(), 2);
    }
}
