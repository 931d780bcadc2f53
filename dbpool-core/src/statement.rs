//! Prepared statements with positional parameter binding (spec.md §4.4).

use crate::driver::{IntoBindValue, RawStatement, Value};
use crate::error::{Error, Result, SqlErrorKind};
use crate::result::ResultSet;

/// A compiled statement bound to the connection that prepared it.
///
/// Parameter positions are `1`-based throughout the public API, matching
/// the column indices of [`crate::result::ResultSet`] (spec.md §4.4, §4.5).
/// Statement caching, where supported, is a backend concern: the SQLite
/// driver delegates to `rusqlite::Connection::prepare_cached` rather than
/// `dbpool-core` keeping its own cache keyed by SQL text.
pub struct PreparedStatement {
    raw: Box<dyn RawStatement>,
}

impl PreparedStatement {
    pub(crate) fn new(raw: Box<dyn RawStatement>) -> Self {
        PreparedStatement { raw }
    }

    pub fn parameter_count(&self) -> usize {
        self.raw.parameter_count()
    }

    /// Binds a single `1`-based parameter position.
    ///
    /// Binding an empty byte sequence sets SQL null (spec.md §4.4).
    pub fn bind(&mut self, index: usize, value: impl IntoBindValue) -> Result<()> {
        self.bind_checked(index, value.into_value())
    }

    /// Binds every positional parameter in one call.
    ///
    /// Atomic with respect to the argument count: a mismatch is rejected
    /// before any value is bound, so a failed call never leaves the
    /// statement partially rebound (spec.md §4.4).
    pub fn bind_values(&mut self, values: &[Value]) -> Result<()> {
        if values.len() != self.raw.parameter_count() {
            return Err(Error::sql(
                SqlErrorKind::ParameterCountMismatch,
                format!(
                    "expected {} parameters, got {}",
                    self.raw.parameter_count(),
                    values.len()
                ),
            ));
        }
        for (i, value) in values.iter().enumerate() {
            self.raw.bind(i, &normalize(value.clone()))?;
        }
        Ok(())
    }

    pub fn execute(&mut self) -> Result<u64> {
        self.raw.execute()
    }

    pub fn execute_query(&mut self) -> Result<ResultSet> {
        let rows = self.raw.execute_query()?;
        Ok(ResultSet::new(rows))
    }

    pub fn rows_changed(&self) -> u64 {
        self.raw.rows_changed()
    }

    pub fn last_row_id(&self) -> i64 {
        self.raw.last_row_id()
    }

    fn bind_checked(&mut self, index: usize, value: Value) -> Result<()> {
        if index == 0 || index > self.raw.parameter_count() {
            return Err(Error::sql(
                SqlErrorKind::IndexOutOfRange,
                format!("parameter index {index} out of range"),
            ));
        }
        self.raw.bind(index - 1, &normalize(value))
    }
}

fn normalize(value: Value) -> Value {
    match value {
        Value::Blob(b) if b.is_empty() => Value::Null,
        other => other,
    }
}
