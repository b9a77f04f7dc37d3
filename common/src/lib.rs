//! Types and traits shared between the view layer and store implementations.

pub mod api;
pub mod tuple;

pub use api::{Store, StoreError};
pub use tuple::{ColumnDesc, RelationDesc, Row, TypeTag, Value};
