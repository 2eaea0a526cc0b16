//! Error types for VectorBase operations.
//!
//! Each operation family has its own error enum so callers can match on the
//! failures that operation can actually produce. [`Error`] wraps all of them
//! for code that does not care which family failed.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Result type alias using VectorBase's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Result type alias for storage-layer operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Any error produced by VectorBase.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Ident(#[from] IdentError),

    #[error(transparent)]
    FieldType(#[from] FieldTypeError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Write(#[from] WriteError),

    #[error(transparent)]
    Delete(#[from] DeleteError),

    #[error(transparent)]
    Search(#[from] SearchError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Details(#[from] DetailsError),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// An async operation exceeded the configured operation timeout.
    #[error("operation timed out after {0:?}")]
    TimedOut(Duration),

    /// The blocking task running an operation panicked or was cancelled.
    #[error("runtime error: {0}")]
    Runtime(String),
}

impl Error {
    /// Returns the storage error underneath, if there is one.
    pub fn storage(&self) -> Option<&StorageError> {
        match self {
            Error::Storage(e)
            | Error::Schema(SchemaError::Storage(e))
            | Error::Write(WriteError::Storage(e))
            | Error::Delete(DeleteError::Storage(e))
            | Error::Search(SearchError::Storage(e))
            | Error::Catalog(CatalogError::Storage(e)) => Some(e),
            _ => None,
        }
    }
}

/// A collection or field name that cannot be used as a storage identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentError {
    #[error("identifier is empty")]
    Empty,

    #[error("identifier `{0}` is longer than {max} bytes", max = crate::ident::MAX_IDENT_LEN)]
    TooLong(String),

    #[error("identifier `{name}` contains invalid character {ch:?}")]
    InvalidChar { name: String, ch: char },

    #[error("identifier `{0}` starts with a digit")]
    LeadingDigit(String),

    #[error("identifier `{0}` is a reserved word")]
    Reserved(String),
}

/// A field declaration whose type cannot be mapped to a storage type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldTypeError {
    #[error("unknown field type `{0}`")]
    UnknownFieldType(String),

    #[error("vector fields require a positive dimension")]
    MissingDimension,

    #[error("vector dimension {got} exceeds the maximum of {max}")]
    DimensionTooLarge { got: u32, max: u32 },

    #[error("dimension is only allowed on vector fields, not `{0}`")]
    UnexpectedDimension(String),

    #[error("only vector fields can be embeddable, not `{0}`")]
    NotEmbeddable(String),
}

/// What is wrong with one field of a collection definition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldProblem {
    #[error(transparent)]
    Name(#[from] IdentError),

    #[error(transparent)]
    Type(#[from] FieldTypeError),

    #[error("duplicate field name")]
    Duplicate,

    #[error("vector fields cannot be primary keys")]
    VectorPrimaryKey,
}

/// A problem attached to the field it was found on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldIssue {
    pub field: String,
    pub problem: FieldProblem,
}

impl fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}`: {}", self.field, self.problem)
    }
}

/// Errors from creating, dropping, or describing collections.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("invalid collection name: {0}")]
    InvalidName(#[from] IdentError),

    #[error("collection name `{0}` is reserved")]
    ReservedName(String),

    #[error("collection `{0}` declares no fields")]
    NoFields(String),

    #[error("invalid fields: {}", join_issues(.0))]
    InvalidFields(Vec<FieldIssue>),

    #[error("{0} fields are marked primary, at most one is allowed")]
    MultiplePrimaryKeys(usize),

    #[error("collection `{0}` already exists with a different shape")]
    SchemaConflict(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl SchemaError {
    /// Returns every field type error contained in this error.
    pub fn field_type_errors(&self) -> Vec<&FieldTypeError> {
        match self {
            SchemaError::InvalidFields(issues) => issues
                .iter()
                .filter_map(|issue| match &issue.problem {
                    FieldProblem::Type(err) => Some(err),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

fn join_issues(issues: &[FieldIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Why a single value or row was rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RowError {
    #[error("field `{field}` expects {expected}, got {got}")]
    TypeMismatch {
        field: String,
        expected: String,
        got: String,
    },

    #[error("field `{field}` expects {expected} dimensions, got {got}")]
    DimensionMismatch {
        field: String,
        expected: usize,
        got: usize,
    },

    #[error("field `{0}` holds a non-finite number")]
    NonFinite(String),

    #[error("primary key `{0}` must not be null")]
    NullPrimaryKey(String),

    #[error("duplicate value for primary key `{0}`")]
    DuplicateKey(String),

    #[error("field `{0}` is given more than once")]
    DuplicateColumn(String),
}

/// Errors from the embedding provider.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EmbeddingError {
    #[error("provider failed: {0}")]
    Provider(String),

    #[error("embedding has {got} dimensions, expected {expected}")]
    WrongDimension { expected: usize, got: usize },

    #[error("embedding contains non-finite values")]
    NonFinite,

    #[error("embedding took {elapsed:?}, limit is {limit:?}")]
    TimedOut { elapsed: Duration, limit: Duration },
}

/// Errors from inserting records.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("invalid collection name: {0}")]
    InvalidName(#[from] IdentError),

    #[error("collection `{0}` does not exist")]
    UnknownCollection(String),

    #[error("row {row_index}: unknown field `{field}`")]
    UnknownField { row_index: usize, field: String },

    #[error("row {row_index}: embedding for `{field}` failed: {reason}")]
    Embedding {
        row_index: usize,
        field: String,
        reason: EmbeddingError,
    },

    #[error("row {row_index}: {cause}")]
    Row { row_index: usize, cause: RowError },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl WriteError {
    /// Returns the index of the offending record, if the error is tied to one.
    pub fn row_index(&self) -> Option<usize> {
        match self {
            WriteError::UnknownField { row_index, .. }
            | WriteError::Embedding { row_index, .. }
            | WriteError::Row { row_index, .. } => Some(*row_index),
            _ => None,
        }
    }
}

/// Errors from deleting records.
#[derive(Debug, Error)]
pub enum DeleteError {
    #[error("refusing to delete every row: no conditions given")]
    UnsafeDeleteAll,

    #[error("invalid collection name: {0}")]
    InvalidName(#[from] IdentError),

    #[error("collection `{0}` does not exist")]
    UnknownCollection(String),

    #[error("unknown field `{0}` in conditions")]
    UnknownField(String),

    #[error("invalid condition: {0}")]
    InvalidCondition(RowError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors from similarity search and other read queries.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("invalid name: {0}")]
    InvalidName(#[from] IdentError),

    #[error("collection `{0}` does not exist")]
    UnknownCollection(String),

    #[error("`{0}` is not a vector field")]
    NotAVectorField(String),

    #[error("query vector has {got} dimensions, field expects {expected}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("query vector contains non-finite values")]
    NonFiniteQuery,

    #[error("limit must be positive")]
    InvalidLimit,

    #[error("unknown field `{0}` in filter")]
    UnknownFilterField(String),

    #[error("invalid filter: {0}")]
    InvalidFilter(RowError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors from the resource catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("no resource with id {id} and address `{address}`")]
    NotFound { id: i64, address: String },

    #[error("resource table is malformed: {0}")]
    Malformed(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors from the content store.
#[derive(Debug, Error)]
pub enum DetailsError {
    #[error("invalid content identifier `{0}`")]
    InvalidCid(String),

    #[error("no content for: {}", .0.join(", "))]
    NotFound(Vec<String>),

    #[error("failed to read content `{cid}`: {message}")]
    Io { cid: String, message: String },
}

/// Errors from the storage layer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StorageError {
    #[error("table `{0}` does not exist")]
    NoSuchTable(String),

    #[error("table `{0}` already exists")]
    TableExists(String),

    #[error("column `{column}` does not exist in `{table}`")]
    NoSuchColumn { table: String, column: String },

    #[error("column `{0}` is not a vector column")]
    NotAVectorColumn(String),

    #[error("command {index} rejected: {cause}")]
    Rejected { index: usize, cause: RowError },

    #[error("malformed command: {0}")]
    MalformedCommand(String),

    #[error("unexpected outcome: expected {0}")]
    UnexpectedOutcome(&'static str),

    #[error("timed out waiting for the store lock")]
    LockTimeout,

    #[error("store is closed")]
    Closed,

    /// The operation's deadline passed before it could commit. Nothing was
    /// written.
    #[error("deadline passed before commit")]
    DeadlineExceeded,

    #[error("io error: {0}")]
    Io(String),

    #[error("WAL corrupted: {0}")]
    WalCorrupted(String),

    #[error("snapshot error: {0}")]
    Snapshot(String),
}

/// Errors from loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("failed to read config: {0}")]
    Io(String),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("invalid identifier in config: {0}")]
    Ident(#[from] IdentError),
}
