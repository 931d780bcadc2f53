//! A prepared statement, re-resolved against the cache on every execute.

use std::sync::{Arc, Mutex};

use dbpool_core::driver::{RawRows, RawStatement, Value};
use dbpool_core::error::Result;

use crate::connection::sqlite_err;
use crate::rows::materialize_rows;

/// Mirrors the teacher's use of a cheap, cache-backed re-prepare over
/// holding a long-lived borrowed `rusqlite::Statement` — `dbpool_core`
/// already validates the `1`-based parameter index before this is reached,
/// so `bind` here only needs to record the value.
pub(crate) struct SqliteStatement {
    conn: Arc<Mutex<rusqlite::Connection>>,
    sql: String,
    param_count: usize,
    params: Vec<Value>,
}

impl SqliteStatement {
    pub(crate) fn new(conn: Arc<Mutex<rusqlite::Connection>>, sql: String, param_count: usize) -> Self {
        SqliteStatement {
            conn,
            sql,
            params: vec![Value::Null; param_count],
            param_count,
        }
    }
}

fn to_rusqlite(value: &Value) -> rusqlite::types::Value {
    match value {
        Value::Null => rusqlite::types::Value::Null,
        Value::Int(i) => rusqlite::types::Value::Integer(i64::from(*i)),
        Value::BigInt(i) => rusqlite::types::Value::Integer(*i),
        Value::Double(d) => rusqlite::types::Value::Real(*d),
        Value::Text(s) => rusqlite::types::Value::Text(s.clone()),
        Value::Blob(b) => rusqlite::types::Value::Blob(b.clone()),
        Value::Timestamp(t) => rusqlite::types::Value::Integer(*t),
    }
}

fn bind_params(stmt: &mut rusqlite::Statement<'_>, params: &[Value]) -> Result<()> {
    for (i, value) in params.iter().enumerate() {
        stmt.raw_bind_parameter(i + 1, to_rusqlite(value)).map_err(sqlite_err)?;
    }
    Ok(())
}

impl RawStatement for SqliteStatement {
    fn parameter_count(&self) -> usize {
        self.param_count
    }

    fn bind(&mut self, index: usize, value: &Value) -> Result<()> {
        self.params[index] = value.clone();
        Ok(())
    }

    fn execute(&mut self) -> Result<u64> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(&self.sql).map_err(sqlite_err)?;
        bind_params(&mut stmt, &self.params)?;
        let changed = stmt.raw_execute().map_err(sqlite_err)?;
        Ok(u64::try_from(changed).unwrap_or(u64::MAX))
    }

    fn execute_query(&mut self) -> Result<Box<dyn RawRows>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(&self.sql).map_err(sqlite_err)?;
        bind_params(&mut stmt, &self.params)?;
        materialize_rows(&mut stmt)
    }

    fn rows_changed(&self) -> u64 {
        self.conn.lock().unwrap().changes()
    }

    fn last_row_id(&self) -> i64 {
        self.conn.lock().unwrap().last_insert_rowid()
    }
}
