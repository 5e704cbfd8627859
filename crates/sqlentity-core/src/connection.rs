//! Database connection traits.
//!
//! This module defines the seam between the engine and a concrete driver:
//!
//! - [`Connection`] - executes parameterized statements and controls commit mode
//! - [`ConnectionFactory`] - opens connections on demand
//!
//! Every call is synchronous and blocks the calling thread; any statement
//! timeout is the driver's business and surfaces as a [`QueryError`].
//!
//! [`QueryError`]: crate::error::QueryError

use crate::error::Result;
use crate::row::Row;
use crate::value::Value;

/// A database connection capable of executing parameterized statements.
///
/// Parameters are bound positionally to `?` placeholders in the order they
/// appear in `params`.
pub trait Connection: Send {
    /// Execute a statement that returns rows.
    fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>>;

    /// Execute a statement and return the number of affected rows.
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64>;

    /// Execute a query and return the first row, if any.
    fn query_one(&mut self, sql: &str, params: &[Value]) -> Result<Option<Row>> {
        Ok(self.query(sql, params)?.into_iter().next())
    }

    /// Enable or disable auto-commit.
    fn set_auto_commit(&mut self, enabled: bool) -> Result<()>;

    /// Commit the current physical transaction.
    fn commit(&mut self) -> Result<()>;

    /// Roll back the current physical transaction.
    fn rollback(&mut self) -> Result<()>;

    /// Release the connection. Further use is undefined.
    fn close(&mut self) -> Result<()>;
}

/// Opens database connections.
///
/// The transaction manager asks for one connection per outermost `begin`;
/// read-only repository calls outside a transaction open one per call.
pub trait ConnectionFactory: Send + Sync {
    /// Open a new connection.
    fn connect(&self) -> Result<Box<dyn Connection>>;
}

impl<F> ConnectionFactory for F
where
    F: Fn() -> Result<Box<dyn Connection>> + Send + Sync,
{
    fn connect(&self) -> Result<Box<dyn Connection>> {
        self()
    }
}
