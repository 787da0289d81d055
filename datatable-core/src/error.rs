//! Error types for DataTable operations

use thiserror::Error;

/// Storage layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Insert failed for table {table}: {reason}")]
    InsertFailed { table: String, reason: String },

    #[error("Delete failed for page {page}: {reason}")]
    DeleteFailed { page: String, reason: String },

    #[error("Transaction failed: {reason}")]
    TransactionFailed { reason: String },

    #[error("Invalid query: {reason}")]
    InvalidQuery { reason: String },

    #[error("Corrupt entry in {database}: {reason}")]
    Corrupt { database: String, reason: String },

    #[error("Schema version {found} is newer than supported version {supported}")]
    SchemaVersion { found: u32, supported: u32 },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Errors raised while extracting directives from page content.
///
/// Both variants are page-local: the offending directive is skipped and the
/// rest of the page is still processed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error("Invalid table name '{name}': {reason}")]
    InvalidTableName { name: String, reason: String },

    #[error("Malformed directive at line {line}, column {column}: {reason}")]
    MalformedDirective {
        line: usize,
        column: usize,
        reason: String,
    },
}

/// Errors raised while validating a structured filter or order fragment.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("Unknown field '{field}'")]
    UnknownField { field: String },

    #[error("Field '{field}' is not sortable")]
    UnsortableField { field: String },

    #[error("Unknown operator '{operator}' at position {position}")]
    UnknownOperator { operator: String, position: usize },

    #[error("Unterminated literal starting at position {position}")]
    UnterminatedLiteral { position: usize },

    #[error("Unexpected input at position {position}: {found}")]
    UnexpectedInput { position: usize, found: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Failed to read configuration from {path}: {reason}")]
    Unreadable { path: String, reason: String },
}

/// Master error type for all DataTable errors.
#[derive(Debug, Clone, Error)]
pub enum DataError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Extract error: {0}")]
    Extract(#[from] ExtractError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Query errors reach callers through the storage boundary.
impl From<QueryError> for DataError {
    fn from(e: QueryError) -> Self {
        DataError::Storage(StorageError::InvalidQuery {
            reason: e.to_string(),
        })
    }
}

/// Result type alias for DataTable operations.
pub type DataResult<T> = Result<T, DataError>;

// =============================================================================
// TESTS
// =============================================================================
