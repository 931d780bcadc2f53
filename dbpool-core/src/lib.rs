//! Core of `dbpool`: the pool manager, connection lifecycle, statement/result
//! abstraction, and URL model. Not intended to be used directly — depend on
//! the `dbpool` facade crate and enable the backend feature you need.
//!
//! Module map (spec.md §2):
//! - [`url`] — the connection `URL` model.
//! - [`driver`] — the narrow contract a backend adapter implements.
//! - [`connection`] — a single live backend session.
//! - [`statement`] — prepared statements with positional binding.
//! - [`result`] — the forward-only query result cursor.
//! - [`pool`] — the pool manager: builder, acquisition, reaper, shutdown.
//! - [`error`] — the unified error taxonomy.
//! - [`abort`] — the process-wide fatal-error hook.

pub mod abort;
pub mod connection;
pub mod driver;
pub mod error;
pub mod pool;
pub mod result;
pub mod statement;
pub mod url;

pub use connection::Connection;
pub use driver::{DateTime, Driver, IntoBindValue, RawConnection, RawRows, RawStatement, TransactionType, Value};
pub use error::{Error, Result, SqlErrorKind};
pub use pool::{Pool, PoolOptions, PooledConnection};
pub use result::ResultSet;
pub use statement::PreparedStatement;
pub use url::Url;
