//! Catalog lookups against SQLite's own metadata.
//!
//! Relation descriptions are read fresh on every call, so a view obtained
//! after `ALTER TABLE` always sees the new columns.

use crate::expression::quote_identifier;
use common::{ColumnDesc, RelationDesc, StoreError, TypeTag};
use rusqlite::Connection;

/// Returns all table names in the database, sorted.
pub fn list_tables(conn: &Connection) -> Result<Vec<String>, StoreError> {
    let mut stmt = conn
        .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
        .map_err(StoreError::engine)?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .map_err(StoreError::engine)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(StoreError::engine)?;
    Ok(names)
}

/// Looks up a table by name and describes its columns in declaration order.
pub fn describe_table(conn: &Connection, name: &str) -> Result<RelationDesc, StoreError> {
    let sql = format!("PRAGMA table_info({})", quote_identifier(name));
    let mut stmt = conn.prepare(&sql).map_err(StoreError::engine)?;
    let declared = stmt
        .query_map([], |row| Ok((row.get::<_, String>(1)?, row.get::<_, String>(2)?)))
        .map_err(StoreError::engine)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(StoreError::engine)?;

    // table_info yields no rows for a missing table.
    if declared.is_empty() {
        return Err(StoreError::RelationNotFound(name.to_string()));
    }

    let columns = declared
        .into_iter()
        .map(|(column, declared)| match TypeTag::from_declared(&declared) {
            Some(tag) => Ok(ColumnDesc::new(column, tag)),
            None => Err(StoreError::UnsupportedType {
                relation: name.to_string(),
                column,
                declared,
            }),
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(RelationDesc {
        name: name.to_string(),
        columns,
    })
}
