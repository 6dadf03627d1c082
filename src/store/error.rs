//! Error types for the persistence collaborator.
//!
//! `StoreError` is what every [`CatalogStore`](super::CatalogStore) and
//! [`SqlExecutor`](crate::executor::SqlExecutor) implementation returns. The
//! engine treats it as opaque except for the structural variants
//! (`HasChildren`, `UniqueViolation`, `NotFound`) that a database can raise
//! on its own.

use may_postgres::Error as PostgresError;
use std::fmt;
use uuid::Uuid;

/// SQLSTATE raised by a unique index violation.
const UNIQUE_VIOLATION: &str = "23505";
/// SQLSTATE raised by a restricting foreign key.
const FOREIGN_KEY_VIOLATION: &str = "23503";

/// Persistence error type
#[derive(Debug)]
pub enum StoreError {
    /// `PostgreSQL` error from `may_postgres`
    PostgresError(PostgresError),
    /// Query building or execution error
    QueryError(String),
    /// Row/record parsing or conversion error
    ParseError(String),
    /// No record with this id
    NotFound(Uuid),
    /// Deletion refused because other records reference this one as parent
    HasChildren(Uuid),
    /// A `(org_id, project_id, code)` uniqueness constraint was violated
    UniqueViolation(String),
    /// Other persistence errors
    Other(String),
}

impl StoreError {
    /// Classify a raw `PostgreSQL` error, lifting constraint violations into
    /// the structural variants. `subject` is the record the statement acted on.
    pub fn from_postgres(err: PostgresError, subject: Option<Uuid>) -> Self {
        let state = err.code().map(|code| code.code().to_string());
        match (state.as_deref(), subject) {
            (Some(UNIQUE_VIOLATION), _) => StoreError::UniqueViolation(err.to_string()),
            (Some(FOREIGN_KEY_VIOLATION), Some(id)) => StoreError::HasChildren(id),
            _ => StoreError::PostgresError(err),
        }
    }

    /// Whether this error means "the row was not there".
    pub fn is_not_found(&self) -> bool {
        match self {
            StoreError::NotFound(_) => true,
            StoreError::PostgresError(e) => is_no_rows_message(&e.to_string()),
            StoreError::QueryError(msg) | StoreError::Other(msg) => is_no_rows_message(msg),
            _ => false,
        }
    }
}

/// Only match specific "no rows" patterns, not a broad "not found", so that
/// "table not found" or "column not found" stay real errors.
fn is_no_rows_message(msg: &str) -> bool {
    let msg = msg.to_lowercase();
    msg.contains("no rows")
        || msg.contains("row not found")
        || msg.contains("expected one row")
        || msg.contains("query returned an unexpected number of rows")
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::PostgresError(e) => write!(f, "PostgreSQL error: {e}"),
            StoreError::QueryError(s) => write!(f, "Query error: {s}"),
            StoreError::ParseError(s) => write!(f, "Parse error: {s}"),
            StoreError::NotFound(id) => write!(f, "Record not found: {id}"),
            StoreError::HasChildren(id) => {
                write!(f, "Record {id} still has children and cannot be deleted")
            }
            StoreError::UniqueViolation(s) => write!(f, "Uniqueness violation: {s}"),
            StoreError::Other(s) => write!(f, "Store error: {s}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::PostgresError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<PostgresError> for StoreError {
    fn from(err: PostgresError) -> Self {
        StoreError::PostgresError(err)
    }
}
