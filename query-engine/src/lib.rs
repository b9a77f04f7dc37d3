//! Query views over a relational store.
//!
//! This crate lets callers compose SELECT statements by chaining typed view
//! operations instead of writing SQL strings. Views are immutable: every
//! combinator returns a new view, and nothing runs until a view is
//! materialized (counted, collected, sampled or printed).
//!
//! # Example
//!
//! ```no_run
//! use query_engine::{Aggregate, Database, Value};
//!
//! # fn main() -> query_engine::Result<()> {
//! let db = Database::open("mydb.db")?;
//!
//! let users = db.create_table(
//!     "users",
//!     &["id", "city"],
//!     &[vec![Value::from(1), Value::from("NYC")]],
//! )?;
//!
//! let per_city = users
//!     .filter(users.column("id")?.gt(0)?)?
//!     .group("city", None, Some(Aggregate::Count))?
//!     .sort("city", false)?;
//! per_city.show()?;
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod config;
pub mod expression;
pub mod options;
pub mod print;
pub mod types;
mod database;
mod frame;
mod view;

pub use common::{ColumnDesc, RelationDesc, Row, Store, StoreError, TypeTag, Value};
pub use config::Config;
pub use database::{Database, SqliteStore};
pub use expression::{Aggregate, BinaryOperator, Expression, Literal, Operand, SqlType};
pub use frame::Frame;
pub use options::{Projection, SortKey, SortOrder, ViewOptions};
pub use view::{ColumnRef, QueryView};

/// A specialized error type for query view operations.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// Relation not found in the store
    #[error("Relation not found: {0}")]
    RelationNotFound(String),
    /// Column not found in the view's projection
    #[error("Unknown column: {0}")]
    UnknownColumn(String),
    /// Incompatible types in an expression or predicate
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),
    /// Operands reference different base relations
    #[error("Cannot combine expressions over {left} and {right}")]
    CrossViewCombination { left: String, right: String },
    /// An expression was handed to a view over another relation
    #[error("Expression over {found} used on a view over {expected}")]
    WrongView { expected: String, found: String },
    /// Row arity differs from the number of column names
    #[error("Column count mismatch: expected {expected}, found {found}")]
    ColumnCountMismatch { expected: usize, found: usize },
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    /// The store returned rows of an unexpected shape
    #[error("Malformed result: {0}")]
    MalformedResult(String),
    /// Failure inside the store, propagated unchanged
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, QueryError>;
