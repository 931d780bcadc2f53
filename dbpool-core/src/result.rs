//! The forward-only query result cursor (spec.md §4.5).

use crate::driver::{DateTime, RawRows};
use crate::error::{Error, Result, SqlErrorKind};

/// A forward-only cursor over the rows produced by a query.
///
/// Column indices are `1`-based. Every getter requires a current row: call
/// [`ResultSet::next`] at least once and check its return value before
/// reading. Numeric getters (`get_i32`/`get_i64`/`get_f64`) coerce the raw
/// textual representation uniformly across backends; only the temporal
/// getters are backend-specific (spec.md §4.5, §9).
pub struct ResultSet {
    raw: Box<dyn RawRows>,
    started: bool,
    has_row: bool,
}

impl ResultSet {
    pub(crate) fn new(raw: Box<dyn RawRows>) -> Self {
        ResultSet {
            raw,
            started: false,
            has_row: false,
        }
    }

    /// Advances to the next row. Returns `false` once the cursor is exhausted.
    pub fn next(&mut self) -> Result<bool> {
        self.started = true;
        self.has_row = self.raw.next()?;
        Ok(self.has_row)
    }

    pub fn column_count(&self) -> usize {
        self.raw.column_count()
    }

    pub fn column_name(&self, index: usize) -> Result<String> {
        self.check_index(index)?;
        self.raw.column_name(index - 1)
    }

    pub fn is_null(&self, index: usize) -> Result<bool> {
        self.check_row(index)?;
        self.raw.is_null(index - 1)
    }

    pub fn get_string(&self, index: usize) -> Result<Option<String>> {
        self.check_row(index)?;
        self.raw.get_string(index - 1)
    }

    /// Parses the column as base-10; null columns return `0` (spec.md §4.5).
    pub fn get_i32(&self, index: usize) -> Result<i32> {
        let value = self.get_i64(index)?;
        i32::try_from(value)
            .map_err(|_| Error::sql(SqlErrorKind::Other, format!("column {index} does not fit in i32")))
    }

    /// Parses the column as base-10; null columns return `0` (spec.md §4.5).
    pub fn get_i64(&self, index: usize) -> Result<i64> {
        self.check_row(index)?;
        match self.raw.get_string(index - 1)? {
            None => Ok(0),
            Some(text) => text.trim().parse::<i64>().map_err(|_| {
                Error::sql(
                    SqlErrorKind::Other,
                    format!("column {index} is not a valid integer: {text:?}"),
                )
            }),
        }
    }

    /// Parses the column as a float; null columns return `0.0` (spec.md §4.5).
    pub fn get_f64(&self, index: usize) -> Result<f64> {
        self.check_row(index)?;
        match self.raw.get_string(index - 1)? {
            None => Ok(0.0),
            Some(text) => text.trim().parse::<f64>().map_err(|_| {
                Error::sql(
                    SqlErrorKind::Other,
                    format!("column {index} is not a valid float: {text:?}"),
                )
            }),
        }
    }

    pub fn get_blob(&self, index: usize) -> Result<Option<Vec<u8>>> {
        self.check_row(index)?;
        self.raw.get_blob(index - 1)
    }

    /// Unix timestamp, seconds since epoch UTC (spec.md §4.5).
    pub fn get_timestamp(&self, index: usize) -> Result<i64> {
        self.check_row(index)?;
        self.raw.get_timestamp(index - 1)
    }

    pub fn get_datetime(&self, index: usize) -> Result<DateTime> {
        self.check_row(index)?;
        self.raw.get_datetime(index - 1)
    }

    /// Hints the batch size used for subsequent fetches.
    pub fn set_fetch_size(&mut self, n: u32) -> Result<()> {
        self.raw.set_fetch_size(n)
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index == 0 || index > self.raw.column_count() {
            return Err(Error::sql(
                SqlErrorKind::IndexOutOfRange,
                format!("column index {index} out of range"),
            ));
        }
        Ok(())
    }

    fn check_row(&self, index: usize) -> Result<()> {
        self.check_index(index)?;
        if !self.started || !self.has_row {
            return Err(Error::sql(
                SqlErrorKind::InvalidState,
                "no current row; call next() before reading a column",
            ));
        }
        Ok(())
    }
}
