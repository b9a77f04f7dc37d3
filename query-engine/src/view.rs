//! QueryView API for composing queries programmatically.
//!
//! Provides a fluent, method-chaining interface over one base relation.
//! Nothing is executed until the view is materialized.

use crate::config::Config;
use crate::expression::{quote_identifier, Aggregate, Expression};
use crate::frame::Frame;
use crate::options::{Projection, SortOrder, ViewOptions};
use crate::print::render_table;
use crate::{QueryError, Result};
use common::{RelationDesc, Row, Store, Value};
use indexmap::IndexMap;
use std::fmt;
use std::sync::{Arc, OnceLock};
use tracing::{info, trace};

/// A column given either by name or as an already-built expression.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnRef {
    Name(String),
    Expr(Expression),
}

impl From<&str> for ColumnRef {
    fn from(name: &str) -> Self {
        ColumnRef::Name(name.to_string())
    }
}

impl From<String> for ColumnRef {
    fn from(name: String) -> Self {
        ColumnRef::Name(name)
    }
}

impl From<Expression> for ColumnRef {
    fn from(expr: Expression) -> Self {
        ColumnRef::Expr(expr)
    }
}

impl From<&Expression> for ColumnRef {
    fn from(expr: &Expression) -> Self {
        ColumnRef::Expr(expr.clone())
    }
}

/// A lazy, immutable view over a base relation.
///
/// Methods can be chained to build a query:
/// ```no_run
/// # use query_engine::Database;
/// # fn main() -> query_engine::Result<()> {
/// # let db = Database::open_in_memory()?;
/// let users = db.table("users")?;
/// let adults = users
///     .filter(users.column("age")?.gt(17)?)?
///     .select(&["name", "age"])?
///     .sort("age", true)?;
/// println!("{}", adults.formulate());
/// # Ok(())
/// # }
/// ```
///
/// Every combinator returns a new view; the receiver is never changed. Two
/// views are equal when they read from the same base relation.
#[derive(Clone)]
pub struct QueryView {
    store: Arc<dyn Store>,
    relation: Arc<str>,
    columns: IndexMap<String, Expression>,
    options: ViewOptions,
    config: Arc<Config>,
    row_count: OnceLock<u64>,
}

/// Name of the derived table used when a statement has to be wrapped.
const DERIVED: &str = "view_rows";

impl QueryView {
    /// Creates a base view with every column of the relation and no options.
    pub(crate) fn base(store: Arc<dyn Store>, config: Arc<Config>, desc: RelationDesc) -> Self {
        let relation: Arc<str> = Arc::from(desc.name.as_str());
        let columns = desc
            .columns
            .iter()
            .map(|c| {
                (
                    c.name.clone(),
                    Expression::reference(relation.clone(), &c.name, c.type_tag),
                )
            })
            .collect();
        Self {
            store,
            relation,
            columns,
            options: ViewOptions::new(),
            config,
            row_count: OnceLock::new(),
        }
    }

    fn derive(&self, columns: IndexMap<String, Expression>, options: ViewOptions) -> Self {
        Self {
            store: self.store.clone(),
            relation: self.relation.clone(),
            columns,
            options,
            config: self.config.clone(),
            row_count: OnceLock::new(),
        }
    }

    /// The name of the base relation.
    pub fn relation(&self) -> &str {
        &self.relation
    }

    /// The current projection, in output order.
    pub fn columns(&self) -> &IndexMap<String, Expression> {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.keys().cloned().collect()
    }

    pub fn options(&self) -> &ViewOptions {
        &self.options
    }

    /// Settings of the database this view was opened from.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Looks up a projected column by name.
    pub fn column(&self, name: &str) -> Result<&Expression> {
        self.columns
            .get(name)
            .ok_or_else(|| QueryError::UnknownColumn(name.to_string()))
    }

    fn check_owned(&self, expr: &Expression) -> Result<()> {
        if expr.relation() != self.relation() {
            return Err(QueryError::WrongView {
                expected: self.relation.to_string(),
                found: expr.relation().to_string(),
            });
        }
        Ok(())
    }

    /// Resolves a name or expression to an expression owned by this view.
    pub fn resolve(&self, column: impl Into<ColumnRef>) -> Result<Expression> {
        match column.into() {
            ColumnRef::Name(name) => self.column(&name).cloned(),
            ColumnRef::Expr(expr) => {
                self.check_owned(&expr)?;
                Ok(expr)
            }
        }
    }

    fn check_predicate(&self, predicate: &Expression, clause: &str) -> Result<()> {
        self.check_owned(predicate)?;
        if !predicate.is_boolean() {
            return Err(QueryError::TypeMismatch(format!(
                "{} expects a boolean predicate, found {} expression {}",
                clause,
                predicate.sql_type(),
                predicate
            )));
        }
        Ok(())
    }

    // ===== Combinators =====

    /// Projects the given columns, in the given order (SELECT clause).
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<QueryView> {
        if names.is_empty() {
            return Err(QueryError::InvalidArgument(
                "select expects at least one column".to_string(),
            ));
        }
        let columns = names
            .iter()
            .map(|name| {
                let name = name.as_ref();
                Ok((name.to_string(), self.column(name)?.clone()))
            })
            .collect::<Result<IndexMap<_, _>>>()?;
        Ok(self.derive(columns, self.options.clone()))
    }

    /// Adds a filter (WHERE clause), ANDed with any existing one.
    pub fn filter(&self, predicate: Expression) -> Result<QueryView> {
        self.check_predicate(&predicate, "where")?;
        let options = self.options.with_filter(predicate)?;
        Ok(self.derive(self.columns.clone(), options))
    }

    /// Sorts by a column (ORDER BY clause), replacing any previous sort.
    pub fn sort(&self, key: impl Into<ColumnRef>, descending: bool) -> Result<QueryView> {
        let key = self.resolve(key)?;
        let options = self
            .options
            .with_sort(key, SortOrder::from_descending(descending));
        Ok(self.derive(self.columns.clone(), options))
    }

    /// Groups rows by a column (GROUP BY clause), replacing any previous group.
    ///
    /// With an aggregate, the key column (if projected) is moved to the front
    /// and every other projected column is wrapped in the aggregate.
    pub fn group(
        &self,
        key: impl Into<ColumnRef>,
        having: Option<Expression>,
        aggregate: Option<Aggregate>,
    ) -> Result<QueryView> {
        let key = self.resolve(key)?;
        if let Some(having) = &having {
            self.check_predicate(having, "having")?;
        }

        let columns = match aggregate {
            Some(func) => {
                let key_name = self
                    .columns
                    .iter()
                    .find(|(_, expr)| **expr == key)
                    .map(|(name, _)| name.clone());
                let mut columns = IndexMap::with_capacity(self.columns.len());
                if let Some(name) = &key_name {
                    columns.insert(name.clone(), key.clone());
                }
                for (name, expr) in &self.columns {
                    if Some(name) != key_name.as_ref() {
                        columns.insert(name.clone(), expr.apply(func));
                    }
                }
                columns
            }
            None => self.columns.clone(),
        };

        let options = self.options.with_group(key, having);
        Ok(self.derive(columns, options))
    }

    /// Limits the number of rows (LIMIT clause). A tighter existing limit wins.
    pub fn limit(&self, n: u64) -> Result<QueryView> {
        Ok(self.derive(self.columns.clone(), self.options.with_limit(n)))
    }

    /// Adds a derived column, or replaces the column of the same name.
    pub fn with_column(&self, name: &str, expr: Expression) -> Result<QueryView> {
        self.check_owned(&expr)?;
        let mut columns = self.columns.clone();
        columns.insert(name.to_string(), expr);
        Ok(self.derive(columns, self.options.clone()))
    }

    /// Removes a column from the projection.
    pub fn without_column(&self, name: &str) -> Result<QueryView> {
        let mut columns = self.columns.clone();
        if columns.shift_remove(name).is_none() {
            return Err(QueryError::UnknownColumn(name.to_string()));
        }
        if columns.is_empty() {
            return Err(QueryError::InvalidArgument(format!(
                "cannot remove {}, the last column of the view",
                name
            )));
        }
        Ok(self.derive(columns, self.options.clone()))
    }

    // ===== SQL generation =====

    /// Renders the view as one SELECT statement.
    pub fn formulate(&self) -> String {
        self.options.render(&self.relation, &self.columns)
    }

    /// Renders the view with a one-shot override bag merged over its options.
    pub fn formulate_with(&self, overrides: &ViewOptions) -> Result<String> {
        let sort_key = overrides.sort().map(|s| &s.key);
        for expr in [overrides.filter(), overrides.group(), overrides.having(), sort_key]
            .into_iter()
            .flatten()
        {
            self.check_owned(expr)?;
        }
        if let Some(Projection::Columns(exprs)) = overrides.columns() {
            for expr in exprs {
                self.check_owned(expr)?;
            }
        }
        let merged = self.options.merged(overrides)?;
        Ok(merged.render(&self.relation, &self.columns))
    }

    // ===== Materialization =====

    fn execute(&self, sql: &str) -> Result<Vec<Row>> {
        Ok(self.store.execute(sql)?)
    }

    /// Number of rows the view yields. Computed once per view and cached.
    pub fn len(&self) -> Result<u64> {
        if let Some(count) = self.row_count.get() {
            return Ok(*count);
        }

        // Grouped, limited and aggregating statements must be counted from the outside.
        let collapses = self.columns.values().any(Expression::is_aggregate);
        let sql = if collapses || self.options.group().is_some() || self.options.limit().is_some()
        {
            format!("WITH {} AS ({}) SELECT COUNT(*) FROM {}", DERIVED, self.formulate(), DERIVED)
        } else {
            self.formulate_with(&ViewOptions::new().with_columns(Projection::CountAll))?
        };

        let rows = self.execute(&sql)?;
        let count = rows
            .first()
            .and_then(|row| row.first())
            .and_then(Value::as_integer)
            .and_then(|n| u64::try_from(n).ok())
            .ok_or_else(|| QueryError::MalformedResult(format!("no row count from: {}", sql)))?;

        trace!(relation = %self.relation, count, "counted rows");
        Ok(*self.row_count.get_or_init(|| count))
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Executes the view and returns every row.
    pub fn collect(&self) -> Result<Vec<Row>> {
        self.execute(&self.formulate())
    }

    /// Executes the view and returns the rows with their column names.
    pub fn to_frame(&self) -> Result<Frame> {
        Ok(Frame::new(self.column_names(), self.collect()?))
    }

    /// Returns at most the first `n` rows.
    pub fn head(&self, n: u64) -> Result<Frame> {
        let sql = self.formulate_with(&ViewOptions::new().with_limit(n))?;
        Ok(Frame::new(self.column_names(), self.execute(&sql)?))
    }

    /// Returns the values of one column under the view's filter, sort and group.
    pub fn column_values(&self, column: impl Into<ColumnRef>) -> Result<Vec<Value>> {
        let expr = self.resolve(column)?;
        let sql = self.formulate_with(
            &ViewOptions::new().with_columns(Projection::Columns(vec![expr])),
        )?;
        Ok(self
            .execute(&sql)?
            .into_iter()
            .filter_map(|row| row.into_iter().next())
            .collect())
    }

    /// Draws an approximate sample of about `n` rows.
    ///
    /// When the view has at most `n` rows, all of them are returned. Otherwise
    /// every row whose random ordinal is a multiple of `count / n` is kept, up
    /// to `n` rows. This may return fewer than `n` rows and is not a uniform
    /// sample without replacement.
    pub fn sample(&self, n: u64) -> Result<Frame> {
        if n == 0 {
            return Err(QueryError::InvalidArgument(
                "sample size must be at least 1".to_string(),
            ));
        }
        let count = self.len()?;
        if count <= n {
            return self.to_frame();
        }
        let stride = count / n;
        let sql = format!(
            "WITH {} AS ({}) SELECT * FROM {} WHERE RANDOM() % {} = 0 LIMIT {}",
            DERIVED,
            self.formulate(),
            DERIVED,
            stride,
            n
        );
        Ok(Frame::new(self.column_names(), self.execute(&sql)?))
    }

    /// Draws a sample of the size configured as `sample_rows`.
    pub fn sample_default(&self) -> Result<Frame> {
        self.sample(self.config.sample_rows as u64)
    }

    // ===== Persistence =====

    /// Writes derived columns into the base relation and returns a fresh
    /// base view over it.
    ///
    /// New columns are added with `ALTER TABLE` and filled for every row of
    /// the relation, regardless of this view's filter. Columns cannot be
    /// removed from a relation this way; use `save_as` for that.
    pub fn save(&self) -> Result<QueryView> {
        let existing = self.store.describe(&self.relation)?;
        let table = quote_identifier(&self.relation);
        for (name, expr) in &self.columns {
            if existing.column(name).is_some() {
                continue;
            }
            let column = quote_identifier(name);
            let tag = expr.sql_type().storage_tag();
            self.execute(&format!("ALTER TABLE {} ADD {} {}", table, column, tag.sql_name()))?;
            self.execute(&format!("UPDATE {} SET {} = {}", table, column, expr))?;
            info!(relation = %self.relation, column = %name, "added column");
        }
        let desc = self.store.describe(&self.relation)?;
        Ok(QueryView::base(self.store.clone(), self.config.clone(), desc))
    }

    /// Stores the result of this view as a new table and returns a view over it.
    ///
    /// The table takes the view's column names, each declared with the storage
    /// type of its expression.
    pub fn save_as(&self, name: &str) -> Result<QueryView> {
        let table = quote_identifier(name);
        let definitions = self
            .columns
            .iter()
            .map(|(column, expr)| {
                format!(
                    "{} {}",
                    quote_identifier(column),
                    expr.sql_type().storage_tag().sql_name()
                )
            })
            .collect::<Vec<_>>();
        self.execute(&format!("CREATE TABLE {} ( {} )", table, definitions.join(", ")))?;
        self.execute(&format!("INSERT INTO {} {}", table, self.formulate()))?;
        info!(relation = %self.relation, table = name, "saved view as table");
        let desc = self.store.describe(name)?;
        Ok(QueryView::base(self.store.clone(), self.config.clone(), desc))
    }

    // ===== Printing =====

    /// One-line description: relation, store, row count and columns.
    pub fn summary(&self) -> Result<String> {
        Ok(format!(
            "Table {} from database {}: {} entries\n Columns: {}",
            self.relation,
            self.store.name(),
            self.len()?,
            self.column_names().join(", ")
        ))
    }

    /// Renders the first `n` rows under a header line.
    pub fn preview(&self, n: usize) -> Result<String> {
        let total = self.len()?;
        let frame = self.head(n as u64)?;
        Ok(format!(
            "Table {} from database {}: Showing {} of {} entries\n{}",
            self.relation,
            self.store.name(),
            frame.len(),
            total,
            render_table(frame.columns(), frame.rows())
        ))
    }

    /// Prints the first `preview_rows` rows of the view to stdout.
    pub fn show(&self) -> Result<()> {
        println!("{}", self.preview(self.config.preview_rows)?);
        Ok(())
    }
}

impl PartialEq for QueryView {
    fn eq(&self, other: &Self) -> bool {
        self.relation == other.relation
    }
}

impl fmt::Debug for QueryView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryView")
            .field("store", &self.store.name())
            .field("relation", &self.relation)
            .field("columns", &self.columns.keys().collect::<Vec<_>>())
            .field("options", &self.options)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    fn sample_db() -> (Database, QueryView) {
        let db = Database::open_in_memory().unwrap();
        let view = db
            .create_table(
                "r",
                &["a", "b"],
                &[
                    vec![Value::from(1), Value::from("x")],
                    vec![Value::from(2), Value::from("y")],
                    vec![Value::from(3), Value::from("x")],
                ],
            )
            .unwrap();
        (db, view)
    }

    #[test]
    fn test_view_where_scenario() {
        let (_db, v) = sample_db();
        let v2 = v.filter(v.column("a").unwrap().gt(1).unwrap()).unwrap();
        assert_eq!(v2.formulate(), "SELECT a,b FROM r WHERE (a > 1)   ");
        assert_eq!(
            v2.collect().unwrap(),
            vec![
                vec![Value::from(2), Value::from("y")],
                vec![Value::from(3), Value::from("x")],
            ]
        );
    }

    #[test]
    fn test_view_combinators_leave_receiver_unchanged() {
        let (_db, v) = sample_db();
        let _ = v.sort("a", true).unwrap().limit(1).unwrap();
        assert_eq!(v.formulate(), "SELECT a,b FROM r    ");
        assert_eq!(v.len().unwrap(), 3);
    }

    #[test]
    fn test_view_select_unknown_column() {
        let (_db, v) = sample_db();
        assert!(matches!(
            v.select(&["a", "zzz"]),
            Err(QueryError::UnknownColumn(name)) if name == "zzz"
        ));
        assert!(matches!(v.sort("zzz", false), Err(QueryError::UnknownColumn(_))));
    }

    #[test]
    fn test_view_rejects_non_boolean_predicate() {
        let (_db, v) = sample_db();
        let a = v.column("a").unwrap().clone();
        assert!(matches!(v.filter(a.add(1).unwrap()), Err(QueryError::TypeMismatch(_))));
        assert!(matches!(
            v.group("b", Some(a.clone()), None),
            Err(QueryError::TypeMismatch(_))
        ));
    }

    #[test]
    fn test_view_with_and_without_column() {
        let (_db, v) = sample_db();
        let doubled = v.column("a").unwrap().mul(2).unwrap();
        let v2 = v.with_column("a2", doubled).unwrap();
        assert_eq!(v2.column_names(), vec!["a", "b", "a2"]);
        assert_eq!(v2.formulate(), "SELECT a,b,(a * 2) AS a2 FROM r    ");

        let v3 = v2.without_column("b").unwrap();
        assert_eq!(
            v3.collect().unwrap(),
            vec![
                vec![Value::from(1), Value::from(2)],
                vec![Value::from(2), Value::from(4)],
                vec![Value::from(3), Value::from(6)],
            ]
        );
        assert!(matches!(v3.without_column("b"), Err(QueryError::UnknownColumn(_))));
        let only_a = v.select(&["a"]).unwrap();
        assert!(matches!(
            only_a.without_column("a"),
            Err(QueryError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_view_head_and_column_values() {
        let (_db, v) = sample_db();
        let sorted = v.sort("a", true).unwrap();
        let head = sorted.head(2).unwrap();
        assert_eq!(head.columns(), &["a".to_string(), "b".to_string()]);
        assert_eq!(head.len(), 2);
        assert_eq!(head.rows()[0][0], Value::from(3));

        assert_eq!(
            sorted.column_values("b").unwrap(),
            vec![Value::from("x"), Value::from("y"), Value::from("x")]
        );
    }

    #[test]
    fn test_view_len_is_memoized() {
        let (db, v) = sample_db();
        assert_eq!(v.len().unwrap(), 3);
        db.store().execute("INSERT INTO r VALUES (4, 'z')").unwrap();
        assert_eq!(v.len().unwrap(), 3);
        assert_eq!(db.table("r").unwrap().len().unwrap(), 4);
    }

    #[test]
    fn test_view_len_respects_limit() {
        let (_db, v) = sample_db();
        assert_eq!(v.limit(2).unwrap().len().unwrap(), 2);
    }

    #[test]
    fn test_view_equality_is_by_relation() {
        let (db, v) = sample_db();
        let sorted = v.sort("a", false).unwrap();
        assert_eq!(v, sorted);

        let other = db
            .create_table("s", &["a"], &[vec![Value::from(1)]])
            .unwrap();
        assert_ne!(v, other);
    }

    #[test]
    fn test_view_save_adds_derived_column() {
        let (db, v) = sample_db();
        let tripled = v.column("a").unwrap().mul(3).unwrap();
        let saved = v.with_column("a3", tripled).unwrap().save().unwrap();
        assert_eq!(saved.column_names(), vec!["a", "b", "a3"]);
        assert_eq!(
            db.table("r").unwrap().column_values("a3").unwrap(),
            vec![Value::from(3), Value::from(6), Value::from(9)]
        );
    }

    #[test]
    fn test_view_save_as_new_table() {
        let (db, v) = sample_db();
        let xs = v
            .filter(v.column("b").unwrap().eq("x").unwrap())
            .unwrap()
            .select(&["a"])
            .unwrap();
        let saved = xs.save_as("xs").unwrap();
        assert_eq!(saved.relation(), "xs");
        assert_eq!(saved.len().unwrap(), 2);
        assert!(db.list_tables().unwrap().contains(&"xs".to_string()));
    }

    #[test]
    fn test_view_summary_and_preview() {
        let (_db, v) = sample_db();
        let summary = v.summary().unwrap();
        assert!(summary.starts_with("Table r from database :memory:: 3 entries"));
        assert!(summary.ends_with("Columns: a, b"));

        let preview = v.preview(2).unwrap();
        assert!(preview.starts_with("Table r from database :memory:: Showing 2 of 3 entries"));
    }

    #[test]
    fn test_formulate_with_ands_override_filter() {
        let (_db, v) = sample_db();
        let filtered = v.filter(v.column("a").unwrap().gt(1).unwrap()).unwrap();
        let overrides = ViewOptions::new()
            .with_filter(v.column("b").unwrap().eq("x").unwrap())
            .unwrap();
        let sql = filtered.formulate_with(&overrides).unwrap();
        assert_eq!(sql.trim_end(), "SELECT a,b FROM r WHERE ((a > 1) AND (b = 'x'))");
        assert_eq!(filtered.formulate().trim_end(), "SELECT a,b FROM r WHERE (a > 1)");
    }

    #[test]
    fn test_formulate_with_rejects_foreign_overrides() {
        let (db, v) = sample_db();
        let s = db
            .create_table("s", &["a"], &[vec![Value::from(1)]])
            .unwrap();
        let foreign = s.column("a").unwrap().clone();

        let overrides = [
            ViewOptions::new().with_filter(foreign.gt(0).unwrap()).unwrap(),
            ViewOptions::new().with_sort(foreign.clone(), SortOrder::Ascending),
            ViewOptions::new().with_group(foreign.clone(), None),
            ViewOptions::new().with_columns(Projection::Columns(vec![foreign.clone()])),
        ];
        for options in &overrides {
            assert!(matches!(
                v.formulate_with(options),
                Err(QueryError::WrongView { expected, found }) if expected == "r" && found == "s"
            ));
        }
    }

    #[test]
    fn test_view_uses_database_config() {
        let config = Config {
            preview_rows: 1,
            sample_rows: 2,
            ..Config::default()
        };
        let db = Database::open_with(config).unwrap();
        let rows: Vec<_> = (0..50).map(|i| vec![Value::from(i)]).collect();
        let v = db.create_table("n", &["i"], &rows).unwrap();

        let derived = v.limit(10).unwrap();
        assert_eq!(derived.config().preview_rows, 1);
        assert!(derived.sample_default().unwrap().len() <= 2);

        let saved = derived.save_as("m").unwrap();
        assert_eq!(saved.config().sample_rows, 2);
    }
}
