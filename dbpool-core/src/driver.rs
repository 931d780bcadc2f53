//! The narrow driver interface a backend adapter implements (spec.md §4.2, §6.4).
//!
//! Mirrors the teacher's protocol-keyed dispatch table (`sqlx-core`'s
//! `Database`/`Connection`/`Row` trait family, dispatched once per pool via
//! its `Any` driver): `dbpool-core` never names a concrete backend. At pool
//! construction, the URL's protocol selects one `Driver` implementation,
//! which is then held as `Arc<dyn Driver>` for the pool's lifetime.
//!
//! Type coercion across heterogeneous back-ends (spec.md §2, §4.5) is
//! deliberately *not* the driver's job: a driver only needs to hand back raw
//! string/blob bytes and `is_null`; `dbpool-core::result::ResultSet` does the
//! base-10 parsing for numeric getters uniformly, once, for every backend.
//! The exception is the temporal getters (`get_timestamp`/`get_datetime`),
//! which spec.md §4.5 calls out as inherently backend-specific (SQLite has
//! no native temporal type and must guess between a Unix integer and an
//! ISO-8601 string) and so are implemented per-driver.

use crate::error::Result;
use crate::url::Url;

/// Transaction isolation / locking mode (spec.md §4.3, §6.2).
///
/// Semantics are forwarded to the backend; a backend that does not
/// distinguish a given mode (e.g. SQLite treats everything but `Immediate`/
/// `Exclusive` as `Serializable`) may alias it freely. `ReadUncommitted` is
/// MySQL-only; `Immediate`/`Exclusive` are SQLite-only locking levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionType {
    #[default]
    Default,
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
    Immediate,
    Exclusive,
}

/// A broken-down calendar timestamp (spec.md §4.5 `get_datetime`).
///
/// `year` is the literal year (not years-since-1900), `month` is `0..11`,
/// `second` may be `60` to represent a leap second.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateTime {
    pub year: i32,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    /// UTC offset in seconds, when the source value carried a timezone.
    pub utc_offset_seconds: Option<i32>,
}

/// A value bound to a prepared statement parameter (spec.md §4.4).
///
/// Binding an empty `Blob` sets SQL null, per spec.md §4.4.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i32),
    BigInt(i64),
    Double(f64),
    Text(String),
    Blob(Vec<u8>),
    /// Unix timestamp, seconds since epoch UTC.
    Timestamp(i64),
}

/// Converts an idiomatic Rust value into a bind [`Value`].
///
/// Implemented for the primitive types `PreparedStatement::bind_values`
/// accepts directly, so callers can write
/// `stmt.bind_values(&[1i32.into_value(), "hi".into_value()])`-style code, or
/// more idiomatically via the `bind!` convenience in `statement.rs`.
pub trait IntoBindValue {
    fn into_value(self) -> Value;
}

macro_rules! impl_into_bind_value {
    ($ty:ty, $variant:ident) => {
        impl IntoBindValue for $ty {
            fn into_value(self) -> Value {
                Value::$variant(self.into())
            }
        }
    };
}

impl_into_bind_value!(i8, Int);
impl_into_bind_value!(i16, Int);
impl_into_bind_value!(i32, Int);
impl_into_bind_value!(i64, BigInt);
impl_into_bind_value!(u8, Int);
impl_into_bind_value!(u16, Int);
impl_into_bind_value!(u32, BigInt);
impl_into_bind_value!(f32, Double);
impl_into_bind_value!(f64, Double);
impl_into_bind_value!(String, Text);

impl IntoBindValue for &str {
    fn into_value(self) -> Value {
        Value::Text(self.to_owned())
    }
}

impl IntoBindValue for &[u8] {
    fn into_value(self) -> Value {
        Value::Blob(self.to_owned())
    }
}

impl IntoBindValue for Vec<u8> {
    fn into_value(self) -> Value {
        Value::Blob(self)
    }
}

impl IntoBindValue for Value {
    fn into_value(self) -> Value {
        self
    }
}

impl<T: IntoBindValue> IntoBindValue for Option<T> {
    fn into_value(self) -> Value {
        match self {
            Some(v) => v.into_value(),
            None => Value::Null,
        }
    }
}

/// A Unix timestamp bind value, disambiguated from a plain integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamp(pub i64);

impl IntoBindValue for Timestamp {
    fn into_value(self) -> Value {
        Value::Timestamp(self.0)
    }
}

/// Per-backend factory: opens a `RawConnection` for a parsed `Url`.
///
/// Implementations are chosen once, at pool construction, based on
/// `url.protocol()` (spec.md §9 "Driver polymorphism").
pub trait Driver: Send + Sync {
    fn open(&self, url: &Url) -> Result<Box<dyn RawConnection>>;
}

/// One live backend session (spec.md §4.2).
///
/// All methods are blocking; `dbpool-core` never calls these while holding
/// the pool's mutex except during the reaper's liveness check (spec.md
/// §4.6.4, §9 "known latency concern").
pub trait RawConnection: Send {
    fn close(&mut self) -> Result<()>;
    fn ping(&mut self) -> Result<bool>;

    fn begin(&mut self, isolation: TransactionType) -> Result<()>;
    fn commit(&mut self) -> Result<()>;
    fn rollback(&mut self) -> Result<()>;

    /// Issues a direct, possibly multi-statement execute. Returns rows affected.
    fn execute(&mut self, sql: &str) -> Result<u64>;

    /// Only the first statement of a multi-statement string is executed
    /// (spec.md §4.3) — this is a backend characteristic, not a bug.
    fn execute_query(&mut self, sql: &str) -> Result<Box<dyn RawRows>>;

    fn prepare(&mut self, sql: &str) -> Result<Box<dyn RawStatement>>;

    fn last_row_id(&self) -> i64;

    /// Set the per-session query timeout. Backends that can't support this
    /// signal `SqlErrorKind::NotSupported` (spec.md §6.4).
    fn set_query_timeout_ms(&mut self, _ms: u64) -> Result<()> {
        Ok(())
    }
}

/// A compiled statement with positional (`1`-based) parameters (spec.md §4.4).
pub trait RawStatement: Send {
    fn parameter_count(&self) -> usize;

    /// `index` is `0`-based here; `dbpool-core::statement` converts from the
    /// public `1`-based parameter index.
    fn bind(&mut self, index: usize, value: &Value) -> Result<()>;

    fn execute(&mut self) -> Result<u64>;
    fn execute_query(&mut self) -> Result<Box<dyn RawRows>>;
    fn rows_changed(&self) -> u64;
    fn last_row_id(&self) -> i64;
}

/// A forward-only row cursor (spec.md §4.5).
///
/// `index` in every getter below is `0`-based; `dbpool-core::result`
/// converts from the public `1`-based column index.
pub trait RawRows: Send {
    fn next(&mut self) -> Result<bool>;

    fn column_count(&self) -> usize;
    fn column_name(&self, index: usize) -> Result<String>;

    fn is_null(&self, index: usize) -> Result<bool>;

    /// The column's value rendered as text, or `None` for SQL null.
    /// `dbpool-core` parses this for the numeric getters.
    fn get_string(&self, index: usize) -> Result<Option<String>>;

    /// An owned copy of the column's raw bytes, or `None` for SQL null.
    ///
    /// Spec.md §9 notes that a borrowed, `next()`-bounded view is also
    /// acceptable; `dbpool-core` allocates on each call instead, trading
    /// some throughput for a getter API with no lifetime tied to the cursor
    /// (documented in `DESIGN.md`).
    fn get_blob(&self, index: usize) -> Result<Option<Vec<u8>>>;

    /// Unix timestamp, seconds since epoch UTC. Backend-specific coercion
    /// (spec.md §4.5).
    fn get_timestamp(&self, index: usize) -> Result<i64>;

    /// Broken-down calendar value. Backend-specific coercion (spec.md §4.5).
    fn get_datetime(&self, index: usize) -> Result<DateTime>;

    /// Hints the batch size for subsequent `next()` calls. Backends without
    /// prefetching (e.g. SQLite) may treat this as a no-op.
    fn set_fetch_size(&mut self, n: u32) -> Result<()>;
}
