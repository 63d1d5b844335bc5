use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;
use rusqlite::types::ValueRef;

use crate::error::SQLError;
use crate::traits::{Row, SQLStore, Value};

/// SqliteStore is a SQLStore implementation backed by rusqlite (bundled
/// SQLite). One connection, serialized behind a mutex; each statement is
/// prepared, executed, and dropped within a single call.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a SQLite database at the given path.
    pub fn open(path: &Path) -> Result<Self, SQLError> {
        let conn = Connection::open(path)
            .map_err(|e| SQLError::Connection(e.to_string()))?;

        // WAL so readers are not blocked behind writers; SQLite leaves
        // foreign key enforcement off unless asked.
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .map_err(|e| SQLError::Connection(e.to_string()))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite database (useful for tests).
    pub fn open_in_memory() -> Result<Self, SQLError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| SQLError::Connection(e.to_string()))?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(|e| SQLError::Connection(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

/// Convert our Value enum to rusqlite's ToSql.
fn bind_params(params: &[Value]) -> Vec<Box<dyn rusqlite::types::ToSql + '_>> {
    params
        .iter()
        .map(|v| -> Box<dyn rusqlite::types::ToSql + '_> {
            match v {
                Value::Null => Box::new(rusqlite::types::Null),
                Value::Integer(i) => Box::new(*i),
                Value::Text(s) => Box::new(s.as_str()),
            }
        })
        .collect()
}

/// Read one column of the current row into a Value.
///
/// The record layer only ever creates integer and varchar columns, so a
/// real or blob here means the table was touched by something else.
fn read_value(row: &rusqlite::Row<'_>, idx: usize) -> Result<Value, SQLError> {
    let value = match row
        .get_ref(idx)
        .map_err(|e| SQLError::Query(e.to_string()))?
    {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
        other => {
            return Err(SQLError::Query(format!(
                "unsupported column type {} at index {}",
                other.data_type(),
                idx
            )));
        }
    };
    Ok(value)
}

impl SQLStore for SqliteStore {
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, SQLError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| SQLError::Query(e.to_string()))?;

        let bound = bind_params(params);
        let param_refs: Vec<&dyn rusqlite::types::ToSql> =
            bound.iter().map(|b| b.as_ref()).collect();

        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| SQLError::Query(e.to_string()))?;

        let column_names: Vec<String> = stmt
            .column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();

        let mut rows = stmt
            .query(param_refs.as_slice())
            .map_err(|e| SQLError::Query(e.to_string()))?;

        let mut result = Vec::new();
        while let Some(row) = rows.next().map_err(|e| SQLError::Query(e.to_string()))? {
            let mut columns = Vec::with_capacity(column_names.len());
            for (idx, name) in column_names.iter().enumerate() {
                columns.push((name.clone(), read_value(row, idx)?));
            }
            result.push(Row { columns });
        }
        Ok(result)
    }

    fn exec(&self, sql: &str, params: &[Value]) -> Result<u64, SQLError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| SQLError::Execution(e.to_string()))?;

        let bound = bind_params(params);
        let param_refs: Vec<&dyn rusqlite::types::ToSql> =
            bound.iter().map(|b| b.as_ref()).collect();

        let affected = conn
            .execute(sql, param_refs.as_slice())
            .map_err(|e| SQLError::Execution(e.to_string()))?;

        Ok(affected as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SqliteStore {
        let s = SqliteStore::open_in_memory().unwrap();
        s.exec(
            "CREATE TABLE t (\"id\" integer primary key autoincrement, \"name\" varchar(255))",
            &[],
        )
        .unwrap();
        s
    }

    #[test]
    fn exec_and_query_roundtrip() {
        let s = store();
        let n = s
            .exec(
                "INSERT INTO t (\"name\") VALUES (?)",
                &[Value::Text("alpha".into())],
            )
            .unwrap();
        assert_eq!(n, 1);

        let rows = s
            .query(
                "SELECT \"id\", \"name\" FROM t WHERE \"name\" = ?",
                &[Value::Text("alpha".into())],
            )
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_i64("id"), Some(1));
        assert_eq!(rows[0].get_str("name"), Some("alpha"));
    }

    #[test]
    fn insert_returning_yields_generated_id() {
        let s = store();
        let rows = s
            .query(
                "INSERT INTO t (\"name\") VALUES (?) RETURNING \"id\"",
                &[Value::Text("beta".into())],
            )
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_i64("id"), Some(1));

        let rows = s
            .query(
                "INSERT INTO t (\"name\") VALUES (?) RETURNING \"id\"",
                &[Value::Text("gamma".into())],
            )
            .unwrap();
        assert_eq!(rows[0].get_i64("id"), Some(2));
    }

    #[test]
    fn null_params_and_columns() {
        let s = store();
        s.exec("INSERT INTO t (\"name\") VALUES (?)", &[Value::Null])
            .unwrap();
        let rows = s.query("SELECT \"name\" FROM t", &[]).unwrap();
        assert_eq!(rows[0].get("name"), Some(&Value::Null));
    }

    #[test]
    fn malformed_sql_is_a_query_error() {
        let s = store();
        let err = s.query("SELEKT broken", &[]).unwrap_err();
        assert!(matches!(err, SQLError::Query(_)));
    }
}
