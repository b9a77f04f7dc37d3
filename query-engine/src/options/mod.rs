//! Pending clause state for a view and the SELECT statement renderer.
//!
//! `ViewOptions` is an immutable record. Each `with_*` constructor returns a
//! copy with exactly one field overlaid, so options can be shared freely
//! between a view and every view derived from it.

use crate::expression::{quote_identifier, Expression};
use crate::Result;
use indexmap::IndexMap;
use std::fmt;

/// Largest LIMIT SQLite accepts; it reads the value as a signed integer.
const MAX_LIMIT: u64 = i64::MAX as u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn from_descending(descending: bool) -> Self {
        if descending {
            SortOrder::Descending
        } else {
            SortOrder::Ascending
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            SortOrder::Ascending => "ASC",
            SortOrder::Descending => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortKey {
    pub key: Expression,
    pub order: SortOrder,
}

/// A column list that replaces the view's own projection.
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    Columns(Vec<Expression>),
    /// Renders verbatim as `COUNT(*)`.
    CountAll,
}

impl fmt::Display for Projection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Projection::Columns(exprs) => f.write_str(&join(exprs)),
            Projection::CountAll => f.write_str("COUNT(*)"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewOptions {
    columns: Option<Projection>,
    filter: Option<Expression>,
    sort: Option<SortKey>,
    group: Option<Expression>,
    having: Option<Expression>,
    limit: Option<u64>,
}

impl ViewOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn columns(&self) -> Option<&Projection> {
        self.columns.as_ref()
    }

    pub fn filter(&self) -> Option<&Expression> {
        self.filter.as_ref()
    }

    pub fn sort(&self) -> Option<&SortKey> {
        self.sort.as_ref()
    }

    pub fn group(&self) -> Option<&Expression> {
        self.group.as_ref()
    }

    /// The having predicate. Always `None` when no group is set.
    pub fn having(&self) -> Option<&Expression> {
        self.having.as_ref()
    }

    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    /// Replaces the column list.
    pub fn with_columns(&self, columns: Projection) -> Self {
        Self {
            columns: Some(columns),
            ..self.clone()
        }
    }

    /// ANDs `predicate` into the existing filter, or sets it if absent.
    pub fn with_filter(&self, predicate: Expression) -> Result<Self> {
        let filter = match &self.filter {
            Some(existing) => existing.and(&predicate)?,
            None => predicate,
        };
        Ok(Self {
            filter: Some(filter),
            ..self.clone()
        })
    }

    pub fn with_sort(&self, key: Expression, order: SortOrder) -> Self {
        Self {
            sort: Some(SortKey { key, order }),
            ..self.clone()
        }
    }

    /// Replaces the group key. The previous having predicate belonged to the
    /// previous group and is replaced by `having`.
    pub fn with_group(&self, key: Expression, having: Option<Expression>) -> Self {
        Self {
            group: Some(key),
            having,
            ..self.clone()
        }
    }

    /// Sets the row limit. An existing tighter limit is kept.
    pub fn with_limit(&self, limit: u64) -> Self {
        Self {
            limit: Some(self.limit.map_or(limit, |current| current.min(limit))),
            ..self.clone()
        }
    }

    /// Merges a one-shot override bag onto these options.
    ///
    /// Columns, group (with its having) and sort from `overrides` replace the
    /// persisted ones; filters are ANDed; the smaller limit wins.
    pub fn merged(&self, overrides: &ViewOptions) -> Result<ViewOptions> {
        let filter = match (&self.filter, &overrides.filter) {
            (Some(persisted), Some(extra)) => Some(persisted.and(extra)?),
            (persisted, extra) => extra.clone().or_else(|| persisted.clone()),
        };

        let (group, having) = match &overrides.group {
            Some(group) => (Some(group.clone()), overrides.having.clone()),
            None => (self.group.clone(), self.having.clone()),
        };

        let limit = match (self.limit, overrides.limit) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };

        Ok(ViewOptions {
            columns: overrides.columns.clone().or_else(|| self.columns.clone()),
            filter,
            sort: overrides.sort.clone().or_else(|| self.sort.clone()),
            group,
            having,
            limit,
        })
    }

    /// Renders the SELECT statement for `relation`.
    ///
    /// `projection` is used when no column list is set. Each entry whose name
    /// differs from the bare column it references is aliased with `AS`. The
    /// statement always has six segments; absent clauses are empty strings.
    pub fn render(&self, relation: &str, projection: &IndexMap<String, Expression>) -> String {
        let columns = match &self.columns {
            Some(columns) => columns.to_string(),
            None => select_list(projection),
        };

        let filter = match &self.filter {
            Some(predicate) => format!("WHERE {}", predicate),
            None => String::new(),
        };

        let group = match (&self.group, &self.having) {
            (Some(key), Some(having)) => format!("GROUP BY {} HAVING {}", key, having),
            (Some(key), None) => format!("GROUP BY {}", key),
            (None, _) => String::new(),
        };

        let sort = match &self.sort {
            Some(SortKey { key, order }) => format!("ORDER BY {} {}", key, order.keyword()),
            None => String::new(),
        };

        let limit = match self.limit {
            Some(n) => format!("LIMIT {}", n.min(MAX_LIMIT)),
            None => String::new(),
        };

        format!(
            "SELECT {} FROM {} {} {} {} {}",
            columns,
            quote_identifier(relation),
            filter,
            group,
            sort,
            limit
        )
    }
}

fn select_list(projection: &IndexMap<String, Expression>) -> String {
    projection
        .iter()
        .map(|(name, expr)| match expr.column_name() {
            Some(column) if column == name => expr.to_string(),
            _ => format!("{} AS {}", expr, quote_identifier(name)),
        })
        .collect::<Vec<_>>()
        .join(",")
}

fn join(exprs: &[Expression]) -> String {
    exprs
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(",")
}
