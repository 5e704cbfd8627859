//! Error types for SQLEntity operations.

use std::fmt;

/// The primary error type for all SQLEntity operations.
#[derive(Debug)]
pub enum Error {
    /// Connection-related errors (acquire, configure, close)
    Connection(ConnectionError),
    /// Statement execution errors
    Query(QueryError),
    /// Type conversion errors
    Type(TypeError),
    /// Entity metadata errors (missing marker, duplicate key or column)
    Metadata(MetadataError),
    /// Builder misuse (missing table, dangling AND/OR, ...)
    Builder(BuilderError),
    /// Schema generation errors
    Schema(SchemaError),
    /// Transaction discipline errors
    Transaction(TransactionError),
    /// An update expected to touch one row touched none
    StaleEntity(StaleEntityError),
    /// No repository is available for a relationship target
    RepositoryNotFound(RepositoryNotFoundError),
    /// Custom error with message
    Custom(String),
}

#[derive(Debug)]
pub struct ConnectionError {
    pub kind: ConnectionErrorKind,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionErrorKind {
    /// Failed to open a connection
    Connect,
    /// Failed to switch auto-commit mode
    Configure,
    /// Failed to close a connection
    Close,
    /// Connection lost during operation
    Disconnected,
}

#[derive(Debug)]
pub struct QueryError {
    pub kind: QueryErrorKind,
    pub sql: Option<String>,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorKind {
    /// Syntax error in SQL
    Syntax,
    /// Constraint violation (unique, foreign key, etc.)
    Constraint,
    /// Table or column not found
    NotFound,
    /// Statement timeout enforced by the driver
    Timeout,
    /// Other database error
    Database,
}

#[derive(Debug)]
pub struct TypeError {
    pub expected: &'static str,
    pub actual: String,
    pub column: Option<String>,
}

#[derive(Debug)]
pub struct MetadataError {
    pub kind: MetadataErrorKind,
    pub entity: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataErrorKind {
    /// The type carries no entity marker
    InvalidEntity,
    /// More than one attribute is marked as key
    DuplicateKey,
    /// Two attributes resolve to the same physical column
    DuplicateColumn,
    /// No key attribute where one is required
    MissingKey,
    /// The type was never registered
    NotRegistered,
    /// A relationship declaration contradicts its attribute binding
    InvalidRelationship,
    /// A table or column name is not a plain SQL identifier
    InvalidIdentifier,
}

#[derive(Debug)]
pub struct BuilderError {
    pub kind: BuilderErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuilderErrorKind {
    /// No table or entity bound to the builder
    MissingTable,
    /// INSERT without columns
    MissingColumns,
    /// INSERT values are not a whole number of rows
    ValueCountMismatch,
    /// UPDATE without any SET assignment
    NoSetClause,
    /// AND/OR without a preceding or following condition
    IllegalSequence,
    /// Argument outside its allowed range
    InvalidArgument,
}

#[derive(Debug)]
pub struct SchemaError {
    pub kind: SchemaErrorKind,
    pub message: String,
    pub source: Option<Box<Error>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaErrorKind {
    /// The registry holds no entities
    NoEntitiesRegistered,
    /// A DDL statement failed
    Execution,
}

#[derive(Debug)]
pub struct TransactionError {
    pub kind: TransactionErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionErrorKind {
    /// commit/rollback/connection access outside any begin
    NoActiveTransaction,
    /// The transaction context is in an unusable state
    IllegalState,
}

#[derive(Debug)]
pub struct StaleEntityError {
    pub table: String,
    pub key: String,
}

#[derive(Debug)]
pub struct RepositoryNotFoundError {
    pub entity: String,
}

impl Error {
    /// Shorthand for a builder error.
    pub fn builder(kind: BuilderErrorKind, message: impl Into<String>) -> Self {
        Error::Builder(BuilderError {
            kind,
            message: message.into(),
        })
    }

    /// Shorthand for a metadata error.
    pub fn metadata(
        kind: MetadataErrorKind,
        entity: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Error::Metadata(MetadataError {
            kind,
            entity: entity.into(),
            message: message.into(),
        })
    }

    /// Shorthand for a transaction error.
    pub fn transaction(kind: TransactionErrorKind, message: impl Into<String>) -> Self {
        Error::Transaction(TransactionError {
            kind,
            message: message.into(),
        })
    }

    /// Is this a configuration error (entity metadata or schema setup)?
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::Metadata(_)
                | Error::Schema(SchemaError {
                    kind: SchemaErrorKind::NoEntitiesRegistered,
                    ..
                })
        )
    }

    /// Is this a builder-state error?
    pub fn is_builder(&self) -> bool {
        matches!(self, Error::Builder(_))
    }

    /// Get the builder error kind, if this is a builder error.
    pub fn builder_kind(&self) -> Option<BuilderErrorKind> {
        match self {
            Error::Builder(e) => Some(e.kind),
            _ => None,
        }
    }

    /// Get the metadata error kind, if this is a metadata error.
    pub fn metadata_kind(&self) -> Option<MetadataErrorKind> {
        match self {
            Error::Metadata(e) => Some(e.kind),
            _ => None,
        }
    }

    /// Get the transaction error kind, if this is a transaction error.
    pub fn transaction_kind(&self) -> Option<TransactionErrorKind> {
        match self {
            Error::Transaction(e) => Some(e.kind),
            _ => None,
        }
    }

    /// Is this a stale-update error (zero rows affected)?
    pub fn is_stale(&self) -> bool {
        matches!(self, Error::StaleEntity(_))
    }

    /// Get the SQL that caused this error, if available
    pub fn sql(&self) -> Option<&str> {
        match self {
            Error::Query(q) => q.sql.as_deref(),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Connection(e) => write!(f, "Connection error: {}", e.message),
            Error::Query(e) => write!(f, "Query error: {}", e.message),
            Error::Type(e) => write!(f, "Type error: {}", e),
            Error::Metadata(e) => write!(f, "Metadata error: {}", e),
            Error::Builder(e) => write!(f, "Builder error: {}", e.message),
            Error::Schema(e) => write!(f, "Schema error: {}", e.message),
            Error::Transaction(e) => write!(f, "Transaction error: {}", e.message),
            Error::StaleEntity(e) => write!(f, "{}", e),
            Error::RepositoryNotFound(e) => write!(f, "{}", e),
            Error::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Connection(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Query(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Schema(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            _ => None,
        }
    }
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(sql) = &self.sql {
            write!(f, "{} (while executing: {})", self.message, sql)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(col) = &self.column {
            write!(
                f,
                "expected {} for column '{}', found {}",
                self.expected, col, self.actual
            )
        } else {
            write!(f, "expected {}, found {}", self.expected, self.actual)
        }
    }
}

impl fmt::Display for MetadataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.entity)
    }
}

impl fmt::Display for BuilderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for TransactionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for StaleEntityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "no rows updated in '{}' for key {}; entity may not exist",
            self.table, self.key
        )
    }
}

impl fmt::Display for RepositoryNotFoundError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no repository registered for entity {}", self.entity)
    }
}

impl From<ConnectionError> for Error {
    fn from(err: ConnectionError) -> Self {
        Error::Connection(err)
    }
}

impl From<QueryError> for Error {
    fn from(err: QueryError) -> Self {
        Error::Query(err)
    }
}

impl From<TypeError> for Error {
    fn from(err: TypeError) -> Self {
        Error::Type(err)
    }
}

impl From<MetadataError> for Error {
    fn from(err: MetadataError) -> Self {
        Error::Metadata(err)
    }
}

impl From<BuilderError> for Error {
    fn from(err: BuilderError) -> Self {
        Error::Builder(err)
    }
}

impl From<SchemaError> for Error {
    fn from(err: SchemaError) -> Self {
        Error::Schema(err)
    }
}

impl From<TransactionError> for Error {
    fn from(err: TransactionError) -> Self {
        Error::Transaction(err)
    }
}

impl From<StaleEntityError> for Error {
    fn from(err: StaleEntityError) -> Self {
        Error::StaleEntity(err)
    }
}

impl From<RepositoryNotFoundError> for Error {
    fn from(err: RepositoryNotFoundError) -> Self {
        Error::RepositoryNotFound(err)
    }
}

/// Result type alias for SQLEntity operations.
pub type Result<T> = std::result::Result<T, Error>;
