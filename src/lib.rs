//! A thread-safe SQL connection pool that multiplexes a bounded set of
//! long-lived connections across blocking callers (spec.md §1).
//!
//! This facade crate re-exports [`dbpool_core`] and wires in whichever
//! backend driver crates are enabled by feature flag. Enable `sqlite`
//! (on by default) to connect to a `sqlite://` URL.

pub use dbpool_core::connection::Connection;
pub use dbpool_core::driver::{
    DateTime, Driver, IntoBindValue, RawConnection, RawRows, RawStatement, TransactionType, Timestamp, Value,
};
pub use dbpool_core::error::{Error, Result, SqlErrorKind};
pub use dbpool_core::pool::{Pool, PoolOptions, PooledConnection};
pub use dbpool_core::result::ResultSet;
pub use dbpool_core::statement::PreparedStatement;
pub use dbpool_core::url::Url;
pub use dbpool_core::{abort, connection, driver, error, pool, result, statement, url};

#[cfg(feature = "sqlite")]
pub use dbpool_sqlite::SqliteDriver;

#[cfg(feature = "sqlite")]
use std::sync::Arc;

/// Extends [`PoolOptions`] with a shorthand that already knows to select
/// [`SqliteDriver`] for a `sqlite://` URL. For any other protocol, or to
/// supply a backend driver compiled in elsewhere, use
/// [`PoolOptions::connect`]/[`PoolOptions::connect_lazy`] directly.
#[cfg(feature = "sqlite")]
pub trait SqliteOptionsExt {
    fn connect_sqlite(self, url: &str) -> Result<Pool>;
    /// Like [`SqliteOptionsExt::connect_sqlite`], but returns before any
    /// physical connection is opened.
    fn connect_sqlite_lazy(self, url: &str) -> Result<Pool>;
}

#[cfg(feature = "sqlite")]
impl SqliteOptionsExt for PoolOptions {
    fn connect_sqlite(self, url: &str) -> Result<Pool> {
        self.connect(url, Arc::new(SqliteDriver))
    }

    fn connect_sqlite_lazy(self, url: &str) -> Result<Pool> {
        self.connect_lazy(url, Arc::new(SqliteDriver))
    }
}

/// Connects with default [`PoolOptions`] to a `sqlite://` URL.
#[cfg(feature = "sqlite")]
pub fn connect_sqlite(url: &str) -> Result<Pool> {
    PoolOptions::new().connect_sqlite(url)
}
