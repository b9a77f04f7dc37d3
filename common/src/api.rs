//! Defines the common API for all relational store implementations.

use crate::tuple::{RelationDesc, Row};

/// A specialized error type for store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// An error raised by the underlying engine, kept as-is.
    #[error(transparent)]
    Engine(Box<dyn std::error::Error + Send + Sync>),
    /// The named relation does not exist.
    #[error("relation not found: {0}")]
    RelationNotFound(String),
    /// A column was declared with a type that has no tag.
    #[error("unsupported type `{declared}` for column {relation}.{column}")]
    UnsupportedType {
        relation: String,
        column: String,
        declared: String,
    },
}

impl StoreError {
    pub fn engine<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        StoreError::Engine(Box::new(err))
    }
}

/// The capability the view layer needs from a relational store.
///
/// This trait is object-safe, so views hold it as `Arc<dyn Store>`.
/// Implementations serialize statements themselves; callers may issue
/// statements from several threads.
pub trait Store: Send + Sync {
    /// A human readable name for the store (e.g. its file path).
    fn name(&self) -> &str;

    /// Runs one statement and returns every row it produced.
    ///
    /// Statements that produce no rows (DDL, DML) return an empty vector.
    fn execute(&self, sql: &str) -> Result<Vec<Row>, StoreError>;

    /// Describes a base relation: its name and ordered, typed column list.
    fn describe(&self, relation: &str) -> Result<RelationDesc, StoreError>;

    /// Lists the names of every base relation in the store.
    fn relations(&self) -> Result<Vec<String>, StoreError>;
}
