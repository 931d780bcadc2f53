//! A single live backend session (spec.md §4.3).

use std::time::Instant;

use crate::driver::{RawConnection, TransactionType};
use crate::error::{Error, Result, SqlErrorKind};
use crate::result::ResultSet;
use crate::statement::PreparedStatement;

/// Default row-batch hint applied to new result sets (spec.md §4.5).
pub(crate) const DEFAULT_FETCH_SIZE: u32 = 100;

/// One checked-out backend session.
///
/// `Connection` is never constructed directly by application code — the
/// pool hands one out wrapped in a [`crate::pool::PooledConnection`] guard
/// and reclaims it (rolling back any open transaction) when the guard
/// drops. Whether a connection is idle or in-use is tracked by the pool,
/// not here: this mirrors the teacher's split between a bare connection
/// type and the `Idle`/`Live` wrapper states around it.
pub struct Connection {
    raw: Box<dyn RawConnection>,
    created_at: Instant,
    in_transaction: bool,
    last_accessed: Instant,
    query_timeout_ms: Option<u64>,
    max_rows: Option<u64>,
    fetch_size: u32,
}

impl Connection {
    pub(crate) fn new(raw: Box<dyn RawConnection>) -> Self {
        let now = Instant::now();
        Connection {
            raw,
            created_at: now,
            in_transaction: false,
            last_accessed: now,
            query_timeout_ms: None,
            max_rows: None,
            fetch_size: DEFAULT_FETCH_SIZE,
        }
    }

    pub(crate) fn touch(&mut self) {
        self.last_accessed = Instant::now();
    }

    pub(crate) fn last_accessed(&self) -> Instant {
        self.last_accessed
    }

    /// When this session was opened, for `max_lifetime` enforcement — set
    /// once at construction and never reset by a pool checkout/return
    /// cycle (spec.md §4.6.4).
    pub(crate) fn created_at(&self) -> Instant {
        self.created_at
    }

    pub(crate) fn ping(&mut self) -> Result<bool> {
        self.raw.ping()
    }

    pub(crate) fn close(mut self) -> Result<()> {
        self.raw.close()
    }

    /// Whether a transaction is currently open on this connection.
    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    /// Sets the per-session query timeout. Backends without support signal
    /// `SqlErrorKind::NotSupported` (spec.md §6.4).
    pub fn set_query_timeout_ms(&mut self, ms: u64) -> Result<()> {
        self.raw.set_query_timeout_ms(ms)?;
        self.query_timeout_ms = Some(ms);
        Ok(())
    }

    pub fn query_timeout_ms(&self) -> Option<u64> {
        self.query_timeout_ms
    }

    /// Caps the number of rows a subsequent query will yield; `0` means
    /// unbounded. Enforcement happens at the result-set layer in drivers
    /// that expose row limits natively.
    pub fn set_max_rows(&mut self, max_rows: u64) {
        self.max_rows = Some(max_rows);
    }

    pub fn max_rows(&self) -> Option<u64> {
        self.max_rows
    }

    pub fn set_fetch_size(&mut self, fetch_size: u32) {
        self.fetch_size = fetch_size;
    }

    pub fn fetch_size(&self) -> u32 {
        self.fetch_size
    }

    /// Issues a direct execute, returning rows affected. Only the first
    /// statement of a multi-statement string runs (spec.md §4.3).
    pub fn execute(&mut self, sql: &str) -> Result<u64> {
        self.touch();
        self.raw.execute(sql)
    }

    /// Issues a query and returns a forward-only [`ResultSet`]. A result set
    /// obtained this way is invalidated the moment another query runs on
    /// the same connection (spec.md §4.3).
    pub fn execute_query(&mut self, sql: &str) -> Result<ResultSet> {
        self.touch();
        let mut rows = self.raw.execute_query(sql)?;
        rows.set_fetch_size(self.fetch_size)?;
        Ok(ResultSet::new(rows))
    }

    pub fn prepare(&mut self, sql: &str) -> Result<PreparedStatement> {
        self.touch();
        let raw = self.raw.prepare(sql)?;
        Ok(PreparedStatement::new(raw))
    }

    pub fn begin_transaction(&mut self) -> Result<()> {
        self.begin_transaction_with(TransactionType::Default)
    }

    pub fn begin_transaction_with(&mut self, isolation: TransactionType) -> Result<()> {
        if self.in_transaction {
            return Err(Error::sql(
                SqlErrorKind::InvalidState,
                "a transaction is already open on this connection",
            ));
        }
        self.raw.begin(isolation)?;
        self.in_transaction = true;
        Ok(())
    }

    pub fn commit(&mut self) -> Result<()> {
        if !self.in_transaction {
            return Err(Error::sql(SqlErrorKind::InvalidState, "no transaction is open"));
        }
        self.raw.commit()?;
        self.in_transaction = false;
        Ok(())
    }

    pub fn rollback(&mut self) -> Result<()> {
        if !self.in_transaction {
            return Err(Error::sql(SqlErrorKind::InvalidState, "no transaction is open"));
        }
        self.raw.rollback()?;
        self.in_transaction = false;
        Ok(())
    }

    /// Rolls back silently if a transaction is open; used by the pool when
    /// reclaiming a connection a caller forgot to commit or roll back
    /// (spec.md §4.6.3, the "rollback-on-return" property).
    pub(crate) fn rollback_if_open(&mut self) -> Result<()> {
        if self.in_transaction {
            self.raw.rollback()?;
            self.in_transaction = false;
        }
        Ok(())
    }

    pub fn last_row_id(&self) -> i64 {
        self.raw.last_row_id()
    }
}
