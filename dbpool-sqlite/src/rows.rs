//! The materialized row buffer handed back from a query (spec.md §4.5, §6.6).

use dbpool_core::driver::{DateTime, RawRows};
use dbpool_core::error::{Error, Result, SqlErrorKind};

use crate::connection::sqlite_err;

#[derive(Clone)]
enum Cell {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl From<rusqlite::types::ValueRef<'_>> for Cell {
    fn from(value: rusqlite::types::ValueRef<'_>) -> Self {
        match value {
            rusqlite::types::ValueRef::Null => Cell::Null,
            rusqlite::types::ValueRef::Integer(i) => Cell::Integer(i),
            rusqlite::types::ValueRef::Real(f) => Cell::Real(f),
            rusqlite::types::ValueRef::Text(t) => Cell::Text(String::from_utf8_lossy(t).into_owned()),
            rusqlite::types::ValueRef::Blob(b) => Cell::Blob(b.to_vec()),
        }
    }
}

/// Runs `stmt` (already bound) to completion and buffers every row.
///
/// SQLite has no native temporal column type: a timestamp column is
/// whatever the application stored, either a Unix integer or an ISO-8601
/// string (spec.md §6.6) — both are handled by [`BufferedRows::get_timestamp`].
pub(crate) fn materialize_rows(stmt: &mut rusqlite::Statement<'_>) -> Result<Box<dyn RawRows>> {
    let column_names: Vec<String> = stmt.column_names().into_iter().map(str::to_owned).collect();
    let column_count = column_names.len();

    let mut rows_cursor = stmt.raw_query();
    let mut rows = Vec::new();
    while let Some(row) = rows_cursor.next().map_err(sqlite_err)? {
        let mut cells = Vec::with_capacity(column_count);
        for index in 0..column_count {
            cells.push(Cell::from(row.get_ref(index).map_err(sqlite_err)?));
        }
        rows.push(cells);
    }

    Ok(Box::new(BufferedRows {
        column_names,
        rows,
        cursor: 0,
    }))
}

pub(crate) struct BufferedRows {
    column_names: Vec<String>,
    rows: Vec<Vec<Cell>>,
    /// `0` means "before the first row"; otherwise the 1-based index of the
    /// current row within `rows`.
    cursor: usize,
}

impl BufferedRows {
    fn current(&self, index: usize) -> Result<&Cell> {
        self.rows[self.cursor - 1]
            .get(index)
            .ok_or_else(|| Error::sql(SqlErrorKind::IndexOutOfRange, format!("column index {index} out of range")))
    }
}

/// Parses a SQLite timestamp column as either a Unix integer or an ISO-8601
/// `YYYY-MM-DD[ T]HH:MM:SS` string (spec.md §6.6).
fn parse_timestamp_text(text: &str) -> Result<i64> {
    if let Ok(seconds) = text.trim().parse::<i64>() {
        return Ok(seconds);
    }
    let datetime = parse_iso8601(text)?;
    Ok(datetime_to_unix(&datetime))
}

fn parse_iso8601(text: &str) -> Result<DateTime> {
    let invalid = || Error::sql(SqlErrorKind::Other, format!("not a valid timestamp: {text:?}"));

    let text = text.trim();
    let (date_part, time_part) = match text.split_once(['T', ' ']) {
        Some((d, t)) => (d, t),
        None => (text, "00:00:00"),
    };

    let mut date_fields = date_part.splitn(3, '-');
    let year: i32 = date_fields.next().ok_or_else(invalid)?.parse().map_err(|_| invalid())?;
    let month: u8 = date_fields.next().ok_or_else(invalid)?.parse().map_err(|_| invalid())?;
    let day: u8 = date_fields.next().ok_or_else(invalid)?.parse().map_err(|_| invalid())?;

    let time_part = time_part.trim_end_matches('Z');
    let mut time_fields = time_part.splitn(3, ':');
    let hour: u8 = time_fields.next().ok_or_else(invalid)?.parse().map_err(|_| invalid())?;
    let minute: u8 = time_fields.next().ok_or_else(invalid)?.parse().map_err(|_| invalid())?;
    let second_str = time_fields.next().unwrap_or("0");
    let second: u8 = second_str
        .split('.')
        .next()
        .unwrap_or("0")
        .parse()
        .map_err(|_| invalid())?;

    if !(1..=12).contains(&month) || !(1..=31).contains(&day) || hour > 23 || minute > 59 || second > 60 {
        return Err(invalid());
    }

    Ok(DateTime {
        year,
        month: month - 1,
        day,
        hour,
        minute,
        second,
        utc_offset_seconds: Some(0),
    })
}

const DAYS_IN_MONTH: [i64; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

/// Days since the Unix epoch for the given proleptic-Gregorian calendar date.
fn days_since_epoch(year: i32, month0: u8, day: u8) -> i64 {
    let mut days: i64 = 0;
    if year >= 1970 {
        for y in 1970..year {
            days += if is_leap_year(y) { 366 } else { 365 };
        }
    } else {
        for y in year..1970 {
            days -= if is_leap_year(y) { 366 } else { 365 };
        }
    }
    for m in 0..month0 {
        days += DAYS_IN_MONTH[m as usize];
        if m == 1 && is_leap_year(year) {
            days += 1;
        }
    }
    days + i64::from(day) - 1
}

fn datetime_to_unix(dt: &DateTime) -> i64 {
    let days = days_since_epoch(dt.year, dt.month, dt.day);
    let seconds_of_day = i64::from(dt.hour) * 3600 + i64::from(dt.minute) * 60 + i64::from(dt.second);
    let offset = i64::from(dt.utc_offset_seconds.unwrap_or(0));
    days * 86_400 + seconds_of_day - offset
}

// `seconds`/`days` are reduced modulo their field ranges just above each
// cast, so every value fits its target type; the deny-by-default truncation
// and sign-loss lints would otherwise flag these as unchecked narrowing.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn unix_to_datetime(mut seconds: i64) -> DateTime {
    let mut days = seconds.div_euclid(86_400);
    seconds = seconds.rem_euclid(86_400);
    let hour = (seconds / 3600) as u8;
    let minute = ((seconds % 3600) / 60) as u8;
    let second = (seconds % 60) as u8;

    let mut year = 1970i32;
    loop {
        let year_len = if is_leap_year(year) { 366 } else { 365 };
        if days >= 0 && days < year_len {
            break;
        }
        if days < 0 {
            year -= 1;
            days += if is_leap_year(year) { 366 } else { 365 };
        } else {
            days -= year_len;
            year += 1;
        }
    }

    let mut month0 = 0u8;
    loop {
        let mut len = DAYS_IN_MONTH[month0 as usize];
        if month0 == 1 && is_leap_year(year) {
            len += 1;
        }
        if days < len {
            break;
        }
        days -= len;
        month0 += 1;
    }

    DateTime {
        year,
        month: month0,
        day: (days + 1) as u8,
        hour,
        minute,
        second,
        utc_offset_seconds: Some(0),
    }
}

fn checked_f64_to_i64(value: f64) -> Result<i64> {
    if value.is_finite() && value >= i64::MIN as f64 && value <= i64::MAX as f64 {
        #[allow(clippy::cast_possible_truncation)]
        Ok(value as i64)
    } else {
        Err(Error::sql(SqlErrorKind::Other, "timestamp value out of i64 range"))
    }
}

impl RawRows for BufferedRows {
    fn next(&mut self) -> Result<bool> {
        if self.cursor < self.rows.len() {
            self.cursor += 1;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn column_count(&self) -> usize {
        self.column_names.len()
    }

    fn column_name(&self, index: usize) -> Result<String> {
        self.column_names
            .get(index)
            .cloned()
            .ok_or_else(|| Error::sql(SqlErrorKind::IndexOutOfRange, format!("column index {index} out of range")))
    }

    fn is_null(&self, index: usize) -> Result<bool> {
        Ok(matches!(self.current(index)?, Cell::Null))
    }

    fn get_string(&self, index: usize) -> Result<Option<String>> {
        Ok(match self.current(index)? {
            Cell::Null => None,
            Cell::Integer(i) => Some(i.to_string()),
            Cell::Real(f) => Some(f.to_string()),
            Cell::Text(s) => Some(s.clone()),
            Cell::Blob(b) => Some(String::from_utf8_lossy(b).into_owned()),
        })
    }

    fn get_blob(&self, index: usize) -> Result<Option<Vec<u8>>> {
        Ok(match self.current(index)? {
            Cell::Null => None,
            Cell::Blob(b) => Some(b.clone()),
            Cell::Text(s) => Some(s.clone().into_bytes()),
            Cell::Integer(i) => Some(i.to_string().into_bytes()),
            Cell::Real(f) => Some(f.to_string().into_bytes()),
        })
    }

    fn get_timestamp(&self, index: usize) -> Result<i64> {
        match self.current(index)?.clone() {
            Cell::Null => Ok(0),
            Cell::Integer(i) => Ok(i),
            Cell::Real(f) => checked_f64_to_i64(f),
            Cell::Text(s) => parse_timestamp_text(&s),
            Cell::Blob(_) => Err(Error::sql(SqlErrorKind::Other, "cannot read a blob column as a timestamp")),
        }
    }

    fn get_datetime(&self, index: usize) -> Result<DateTime> {
        match self.current(index)?.clone() {
            Cell::Text(s) => parse_iso8601(&s).or_else(|_| Ok(unix_to_datetime(self.get_timestamp(index)?))),
            _ => Ok(unix_to_datetime(self.get_timestamp(index)?)),
        }
    }

    fn set_fetch_size(&mut self, _n: u32) -> Result<()> {
        // Rows are already fully materialized; there is nothing left to
        // batch (see the module-level note on eager buffering).
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unix_to_datetime_and_back_round_trips() {
        let dt = unix_to_datetime(1_700_000_000);
        assert_eq!(datetime_to_unix(&dt), 1_700_000_000);
    }

    #[test]
    fn parses_iso8601_with_t_separator() {
        let dt = parse_iso8601("2024-03-05T13:45:30").unwrap();
        assert_eq!(dt.year, 2024);
        assert_eq!(dt.month, 2);
        assert_eq!(dt.day, 5);
        assert_eq!(dt.hour, 13);
        assert_eq!(dt.minute, 45);
        assert_eq!(dt.second, 30);
    }

    #[test]
    fn parses_iso8601_with_space_separator_and_no_seconds() {
        let dt = parse_iso8601("1999-12-31 23:59").unwrap();
        assert_eq!(dt.year, 1999);
        assert_eq!(dt.month, 11);
        assert_eq!(dt.day, 31);
        assert_eq!(dt.hour, 23);
        assert_eq!(dt.minute, 59);
        assert_eq!(dt.second, 0);
    }

    #[test]
    fn parse_timestamp_text_prefers_integer_form() {
        assert_eq!(parse_timestamp_text("12345").unwrap(), 12345);
    }

    #[test]
    fn days_before_epoch_are_negative() {
        let dt = DateTime {
            year: 1969,
            month: 11,
            day: 31,
            hour: 0,
            minute: 0,
            second: 0,
            utc_offset_seconds: Some(0),
        };
        assert_eq!(datetime_to_unix(&dt), -86_400);
    }
}
