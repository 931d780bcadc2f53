//! One SQLite session and its PRAGMA-driven construction (spec.md §6.6).

use std::sync::{Arc, Mutex};
use std::time::Duration;

use dbpool_core::driver::{RawConnection, RawStatement, TransactionType};
use dbpool_core::error::{Error, Result, SqlErrorKind};
use dbpool_core::url::Url;

use crate::rows::materialize_rows;
use crate::statement::SqliteStatement;

/// Maps URL query parameters onto `PRAGMA` statements applied once, right
/// after the physical connection opens:
///
/// - `synchronous` (`off`/`normal`/`full`/`extra`)
/// - `journal_mode` (`delete`/`truncate`/`persist`/`memory`/`wal`/`off`)
/// - `foreign_keys` (`0`/`1`/`true`/`false`/`on`/`off`/`yes`/`no`)
/// - `busy_timeout` (milliseconds)
/// - `mode` (`memory` forces an in-memory database regardless of path)
pub(crate) fn open_connection(url: &Url) -> Result<rusqlite::Connection> {
    let path = url.path().unwrap_or("");
    let host = url.host().unwrap_or("");
    let in_memory = url.parameter("mode") == Some("memory") || (path.is_empty() && host.is_empty());

    let conn = if in_memory {
        rusqlite::Connection::open_in_memory()
    } else {
        // "sqlite:///abs/path.db" parses to host="" path="/abs/path.db" (used
        // as-is); "sqlite://./rel.db" parses to host="." path="/rel.db" and
        // is reassembled as "./rel.db".
        let file_path = if host.is_empty() {
            path.to_owned()
        } else {
            format!("{host}{path}")
        };
        rusqlite::Connection::open(file_path)
    }
    .map_err(sqlite_err)?;

    if let Some(sync) = url.parameter("synchronous") {
        conn.pragma_update(None, "synchronous", sync).map_err(sqlite_err)?;
    }
    if let Some(journal_mode) = url.parameter("journal_mode") {
        conn.pragma_update(None, "journal_mode", journal_mode).map_err(sqlite_err)?;
    }
    if let Some(fk) = url.parameter("foreign_keys") {
        let on = matches!(fk, "1" | "true" | "on" | "yes");
        conn.pragma_update(None, "foreign_keys", on).map_err(sqlite_err)?;
    }
    if let Some(busy_timeout) = url.parameter("busy_timeout") {
        let ms: u64 = busy_timeout
            .parse()
            .map_err(|_| Error::sql(SqlErrorKind::InvalidUrl, format!("invalid busy_timeout: {busy_timeout:?}")))?;
        conn.busy_timeout(Duration::from_millis(ms)).map_err(sqlite_err)?;
    }

    Ok(conn)
}

/// Classifies a `rusqlite::Error` into the unified `SqlErrorKind` taxonomy.
pub(crate) fn sqlite_err(error: rusqlite::Error) -> Error {
    let kind = match &error {
        rusqlite::Error::InvalidColumnIndex(_)
        | rusqlite::Error::InvalidColumnName(_)
        | rusqlite::Error::InvalidParameterName(_) => SqlErrorKind::IndexOutOfRange,
        rusqlite::Error::InvalidParameterCount(_, _) => SqlErrorKind::ParameterCountMismatch,
        rusqlite::Error::QueryReturnedNoRows => SqlErrorKind::InvalidState,
        _ => SqlErrorKind::Driver,
    };
    Error::sql(kind, error.to_string())
}

/// A live SQLite session shared (via `Mutex`) with any outstanding
/// [`SqliteStatement`]s prepared from it.
///
/// `rusqlite::Statement`/`Rows` borrow from their `Connection` for their
/// whole lifetime, which cannot cross the `dyn RawStatement`/`dyn RawRows`
/// object-safety boundary. Query results are therefore materialized
/// eagerly into owned cells the moment a query runs, rather than streamed
/// lazily row by row; `dbpool_core::result::ResultSet`'s forward-only
/// cursor contract (`next()` before reading) is unaffected — only the
/// *timing* of the fetch changes.
pub struct SqliteConnection {
    pub(crate) conn: Arc<Mutex<rusqlite::Connection>>,
}

impl RawConnection for SqliteConnection {
    fn close(&mut self) -> Result<()> {
        // rusqlite::Connection closes its native handle on Drop; there is no
        // separate flush step worth forcing here while the handle may still
        // be shared with an outstanding SqliteStatement.
        Ok(())
    }

    fn ping(&mut self) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        Ok(conn.execute_batch("SELECT 1;").is_ok())
    }

    fn begin(&mut self, isolation: TransactionType) -> Result<()> {
        let sql = match isolation {
            TransactionType::Immediate => "BEGIN IMMEDIATE",
            TransactionType::Exclusive => "BEGIN EXCLUSIVE",
            TransactionType::ReadUncommitted => {
                return Err(Error::sql(
                    SqlErrorKind::NotSupported,
                    "SQLite does not support read_uncommitted (MySQL-only)",
                ));
            }
            _ => "BEGIN DEFERRED",
        };
        self.conn.lock().unwrap().execute_batch(sql).map_err(sqlite_err)
    }

    fn commit(&mut self) -> Result<()> {
        self.conn.lock().unwrap().execute_batch("COMMIT").map_err(sqlite_err)
    }

    fn rollback(&mut self) -> Result<()> {
        self.conn.lock().unwrap().execute_batch("ROLLBACK").map_err(sqlite_err)
    }

    fn execute(&mut self, sql: &str) -> Result<u64> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(sql).map_err(sqlite_err)?;
        let changed = stmt.raw_execute().map_err(sqlite_err)?;
        Ok(u64::try_from(changed).unwrap_or(u64::MAX))
    }

    fn execute_query(&mut self, sql: &str) -> Result<Box<dyn dbpool_core::driver::RawRows>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(sql).map_err(sqlite_err)?;
        materialize_rows(&mut stmt)
    }

    fn prepare(&mut self, sql: &str) -> Result<Box<dyn RawStatement>> {
        let param_count = {
            let conn = self.conn.lock().unwrap();
            conn.prepare(sql).map_err(sqlite_err)?.parameter_count()
        };
        Ok(Box::new(SqliteStatement::new(Arc::clone(&self.conn), sql.to_owned(), param_count)))
    }

    fn last_row_id(&self) -> i64 {
        self.conn.lock().unwrap().last_insert_rowid()
    }

    fn set_query_timeout_ms(&mut self, ms: u64) -> Result<()> {
        self.conn
            .lock()
            .unwrap()
            .busy_timeout(Duration::from_millis(ms))
            .map_err(sqlite_err)
    }
}
