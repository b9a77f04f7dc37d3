//! Database struct - the main entry point for building views.

use crate::catalog;
use crate::config::Config;
use crate::expression::quote_identifier;
use crate::types::{from_sqlite, to_sqlite};
use crate::view::QueryView;
use crate::{QueryError, Result};
use common::{RelationDesc, Row, Store, StoreError};
use rusqlite::Connection;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

/// A `Store` backed by a single SQLite connection.
///
/// Statements are serialized through a mutex, so at most one is in flight.
pub struct SqliteStore {
    name: String,
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens the database described by `config`.
    pub fn open(config: &Config) -> std::result::Result<Self, StoreError> {
        let conn = match &config.path {
            Some(path) => Connection::open(path),
            None => Connection::open_in_memory(),
        }
        .map_err(StoreError::engine)?;
        conn.busy_timeout(config.busy_timeout)
            .map_err(StoreError::engine)?;

        Ok(Self {
            name: config.store_name(),
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        // A panic mid-statement leaves the connection itself usable.
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `f` with exclusive access to the connection.
    pub(crate) fn with_connection<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> rusqlite::Result<T>,
    ) -> std::result::Result<T, StoreError> {
        let mut conn = self.lock();
        f(&mut conn).map_err(StoreError::engine)
    }

    fn into_connection(self) -> Connection {
        self.conn.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Store for SqliteStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&self, sql: &str) -> std::result::Result<Vec<Row>, StoreError> {
        debug!(store = %self.name, sql, "executing statement");
        let conn = self.lock();
        let mut stmt = conn.prepare(sql).map_err(StoreError::engine)?;
        let width = stmt.column_count();
        let mut rows = stmt.query([]).map_err(StoreError::engine)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().map_err(StoreError::engine)? {
            let mut values = Vec::with_capacity(width);
            for i in 0..width {
                values.push(from_sqlite(row.get_ref(i).map_err(StoreError::engine)?));
            }
            results.push(values);
        }
        Ok(results)
    }

    fn describe(&self, relation: &str) -> std::result::Result<RelationDesc, StoreError> {
        catalog::describe_table(&self.lock(), relation)
    }

    fn relations(&self) -> std::result::Result<Vec<String>, StoreError> {
        catalog::list_tables(&self.lock())
    }
}

/// The main database interface.
///
/// Hands out base views over its tables and manages the tables themselves.
pub struct Database {
    store: Arc<SqliteStore>,
    config: Arc<Config>,
}

impl Database {
    /// Opens or creates a database file at the specified path.
    pub fn open(path: &str) -> Result<Self> {
        Self::open_with(Config::file(path))
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        Self::open_with(Config::in_memory())
    }

    pub fn open_with(config: Config) -> Result<Self> {
        let store = Arc::new(SqliteStore::open(&config)?);
        info!(database = %store.name(), "opened database");
        Ok(Self {
            store,
            config: Arc::new(config),
        })
    }

    pub fn name(&self) -> &str {
        self.store.name()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The store views execute against.
    pub fn store(&self) -> Arc<dyn Store> {
        self.store.clone()
    }

    /// Returns a base view over the specified table.
    pub fn table(&self, name: &str) -> Result<QueryView> {
        let desc = self.store.describe(name).map_err(|err| match err {
            StoreError::RelationNotFound(name) => QueryError::RelationNotFound(name),
            other => QueryError::Store(other),
        })?;
        Ok(QueryView::base(self.store(), self.config.clone(), desc))
    }

    /// Lists all tables in the database.
    pub fn list_tables(&self) -> Result<Vec<String>> {
        Ok(self.store.relations()?)
    }

    /// Creates a new table from rows and column names and returns a view over it.
    ///
    /// Column types are taken from the first row. All rows are inserted in
    /// one transaction.
    pub fn create_table(&self, name: &str, columns: &[&str], rows: &[Row]) -> Result<QueryView> {
        let first = rows.first().ok_or_else(|| {
            QueryError::InvalidArgument(format!(
                "cannot infer column types for {} without rows",
                name
            ))
        })?;
        for row in rows {
            if row.len() != columns.len() {
                return Err(QueryError::ColumnCountMismatch {
                    expected: columns.len(),
                    found: row.len(),
                });
            }
        }

        let definitions = columns
            .iter()
            .zip(first)
            .map(|(column, value)| {
                let tag = value.type_tag().ok_or_else(|| {
                    QueryError::InvalidArgument(format!(
                        "cannot infer a type for column {} from {:?}",
                        column, value
                    ))
                })?;
                Ok(format!("{} {}", quote_identifier(column), tag.sql_name()))
            })
            .collect::<Result<Vec<_>>>()?;

        let create = format!(
            "CREATE TABLE {} ( {} )",
            quote_identifier(name),
            definitions.join(", ")
        );
        let insert = format!(
            "INSERT INTO {} VALUES ( {} )",
            quote_identifier(name),
            vec!["?"; columns.len()].join(", ")
        );

        self.store.with_connection(|conn| {
            let tx = conn.transaction()?;
            debug!(sql = %create, "executing statement");
            tx.execute(&create, [])?;
            {
                let mut stmt = tx.prepare(&insert)?;
                for row in rows {
                    stmt.execute(rusqlite::params_from_iter(row.iter().map(to_sqlite)))?;
                }
            }
            tx.commit()
        })?;

        info!(table = name, rows = rows.len(), "created table");
        self.table(name)
    }

    /// Drops the table the view reads from.
    ///
    /// Returns `false` if no such table exists.
    pub fn drop_table(&self, view: &QueryView) -> Result<bool> {
        if !self.list_tables()?.iter().any(|t| t == view.relation()) {
            return Ok(false);
        }
        self.store
            .execute(&format!("DROP TABLE {}", quote_identifier(view.relation())))?;
        info!(table = view.relation(), "dropped table");
        Ok(true)
    }

    /// Commits an open transaction, if any.
    pub fn commit(&self) -> Result<()> {
        self.store.with_connection(|conn| {
            if conn.is_autocommit() {
                Ok(())
            } else {
                conn.execute_batch("COMMIT")
            }
        })?;
        Ok(())
    }

    /// Closes the connection.
    ///
    /// Views still alive keep the connection open until they are dropped;
    /// in that case this only releases the database's own handle.
    pub fn close(self) -> Result<()> {
        let name = self.store.name().to_string();
        match Arc::try_unwrap(self.store) {
            Ok(store) => store
                .into_connection()
                .close()
                .map_err(|(_, err)| QueryError::Store(StoreError::engine(err)))?,
            Err(_) => debug!(database = %name, "views still hold the connection"),
        }
        info!(database = %name, "closed database");
        Ok(())
    }
}

impl std::fmt::Display for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tables = self.list_tables().unwrap_or_default();
        write!(f, "Database: {} Tables: {}", self.name(), tables.join(", "))
    }
}
