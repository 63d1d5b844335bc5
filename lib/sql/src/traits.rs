use crate::error::SQLError;

/// A dynamically-typed SQL parameter or column value.
///
/// Only the shapes the record layer can produce exist here: every semantic
/// field type marshals to NULL, an integer, or text.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Text(String),
}

/// A row returned from a SQL query: column name to value.
#[derive(Debug, Clone)]
pub struct Row {
    pub columns: Vec<(String, Value)>,
}

impl Row {
    /// Get a column value by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.columns.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Get an integer column value by name.
    pub fn get_i64(&self, name: &str) -> Option<i64> {
        match self.get(name) {
            Some(Value::Integer(i)) => Some(*i),
            _ => None,
        }
    }

    /// Get a text column value by name.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        match self.get(name) {
            Some(Value::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }
}

/// SQLStore provides a SQL execution interface backed by a relational
/// database.
///
/// Statements use positional `?` placeholders; literal values are always
/// bound, never interpolated into the statement text.
pub trait SQLStore: Send + Sync {
    /// Execute a statement that returns rows.
    ///
    /// This includes data-changing statements with a `RETURNING` clause;
    /// the record layer fetches generated ids this way.
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, SQLError>;

    /// Execute a statement (INSERT/UPDATE/DELETE/DDL) and return the
    /// affected row count.
    fn exec(&self, sql: &str, params: &[Value]) -> Result<u64, SQLError>;
}
