//! The SQLite reference driver adapter, backed by `rusqlite` (spec.md §6.6).
//!
//! This is the one backend shipped in this workspace; MySQL, PostgreSQL, and
//! Oracle adapters are out of scope and left to implementers of
//! `dbpool_core::driver::Driver` elsewhere (spec.md §1).

mod connection;
mod rows;
mod statement;

use std::sync::{Arc, Mutex};

use dbpool_core::driver::{Driver, RawConnection};
use dbpool_core::error::Result;
use dbpool_core::url::Url;

use connection::{open_connection, SqliteConnection};

/// Opens `rusqlite::Connection`s for a `sqlite://` URL.
///
/// Register with a pool via `PoolOptions::connect`/`connect_lazy`, passing
/// `Arc::new(SqliteDriver)` as the driver.
#[derive(Debug, Default)]
pub struct SqliteDriver;

impl Driver for SqliteDriver {
    fn open(&self, url: &Url) -> Result<Box<dyn RawConnection>> {
        let conn = open_connection(url)?;
        Ok(Box::new(SqliteConnection {
            conn: Arc::new(Mutex::new(conn)),
        }))
    }
}
