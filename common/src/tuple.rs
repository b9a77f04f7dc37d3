//! Column types, values and relation descriptions shared by every store.

use std::fmt;

/// The storage type of a base column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    Integer,
    Real,
    Text,
}

impl TypeTag {
    /// Maps a declared SQL column type onto a tag using SQLite affinity rules.
    ///
    /// An empty declaration maps to `Integer`. Returns `None` for declarations
    /// with no matching affinity (e.g. `BLOB`, `NUMERIC`).
    pub fn from_declared(declared: &str) -> Option<TypeTag> {
        let upper = declared.trim().to_ascii_uppercase();
        if upper.is_empty() || upper.contains("INT") {
            Some(TypeTag::Integer)
        } else if upper.contains("CHAR") || upper.contains("CLOB") || upper.contains("TEXT") {
            Some(TypeTag::Text)
        } else if upper.contains("REAL") || upper.contains("FLOA") || upper.contains("DOUB") {
            Some(TypeTag::Real)
        } else {
            None
        }
    }

    /// The SQL type name used when declaring a column of this type.
    pub fn sql_name(self) -> &'static str {
        match self {
            TypeTag::Integer => "INTEGER",
            TypeTag::Real => "REAL",
            TypeTag::Text => "TEXT",
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql_name())
    }
}

/// A single value read from or written to a store.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    /// Returns true if this value is NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The tag a column holding this value would be declared with.
    ///
    /// NULL and BLOB have no tag.
    pub fn type_tag(&self) -> Option<TypeTag> {
        match self {
            Value::Integer(_) => Some(TypeTag::Integer),
            Value::Real(_) => Some(TypeTag::Real),
            Value::Text(_) => Some(TypeTag::Text),
            Value::Null | Value::Blob(_) => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Real(r) => write!(f, "{}", r),
            Value::Text(s) => write!(f, "{}", s),
            Value::Blob(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(value as i64)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Real(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

/// One result row, in projection order.
pub type Row = Vec<Value>;

/// A named, typed column of a base relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDesc {
    pub name: String,
    pub type_tag: TypeTag,
}

impl ColumnDesc {
    pub fn new(name: impl Into<String>, type_tag: TypeTag) -> Self {
        Self {
            name: name.into(),
            type_tag,
        }
    }
}

/// A base relation: its name and ordered column list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationDesc {
    pub name: String,
    pub columns: Vec<ColumnDesc>,
}

impl RelationDesc {
    pub fn column(&self, name: &str) -> Option<&ColumnDesc> {
        self.columns.iter().find(|c| c.name == name)
    }
}
