//! The unified error taxonomy (spec.md §6.5, §7).
//!
//! There is exactly one error kind carrying all runtime failures — `Error::Sql` —
//! and a disjoint `Error::Assert` kind for programmer errors (precondition
//! violations that are fatal regardless of build profile). Both carry a
//! structured frame: a classification `kind`, a `message`, and the call site
//! that raised them.

use std::fmt;
use std::panic::Location;

/// `Result` alias used throughout `dbpool-core` and driver adapters.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of a [`Error::Sql`] failure.
///
/// This is *not* a second error kind — spec.md §7 is explicit that all
/// runtime failures share the single `SQL` kind. `SqlErrorKind` only lets
/// callers match on the cause without string-parsing `message`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlErrorKind {
    /// A connection `URL` failed to parse (spec.md §4.1).
    InvalidUrl,
    /// A driver operation (open/ping/execute/prepare/fetch/bind/rollback) failed.
    Driver,
    /// Every connection is in use and the pool is at `max` (spec.md §4.6.2 step 4).
    PoolFull,
    /// An acquisition or driver operation exceeded its configured timeout.
    Timeout,
    /// `bind_values` was called with the wrong number of arguments (spec.md §4.4).
    ParameterCountMismatch,
    /// A column index was out of range, or a getter ran before the first `next()`.
    IndexOutOfRange,
    /// An operation was attempted in an invalid connection/statement/result state
    /// (e.g. using a closed connection, or a result set invalidated by a new query).
    InvalidState,
    /// The driver does not implement the requested operation (spec.md §6.4).
    NotSupported,
    /// A catch-all for driver-reported failures with no finer classification.
    Other,
}

impl fmt::Display for SqlErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SqlErrorKind::InvalidUrl => "invalid url",
            SqlErrorKind::Driver => "driver error",
            SqlErrorKind::PoolFull => "pool full",
            SqlErrorKind::Timeout => "timed out",
            SqlErrorKind::ParameterCountMismatch => "parameter count mismatch",
            SqlErrorKind::IndexOutOfRange => "index out of range",
            SqlErrorKind::InvalidState => "invalid state",
            SqlErrorKind::NotSupported => "not supported",
            SqlErrorKind::Other => "sql error",
        };
        f.write_str(s)
    }
}

/// A structured frame: `{kind, message, function, file, line}` (spec.md §6.5).
///
/// `function` is best-effort: unlike C's `__func__`, Rust has no reflection
/// for "the name of the function currently executing", so frames are
/// annotated by the call site that chose to pass one (usually via the
/// `sql_err!`/`assert_err!` macros below). `file`/`line` are always accurate,
/// captured automatically via `#[track_caller]`.
#[derive(Debug, Clone)]
pub struct Frame {
    pub message: String,
    pub function: Option<&'static str>,
    pub file: &'static str,
    pub line: u32,
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// An error raised by the pool, a connection, a statement, a result set, or
/// the URL parser.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// The unified `SQL` error kind (spec.md §7).
    #[error("{}: {}", .kind, .frame.message)]
    Sql { kind: SqlErrorKind, frame: Frame },

    /// A programmer-error precondition violation (spec.md §7). Fatal in
    /// release as well as debug — callers should not attempt to recover.
    #[error("assertion failed: {}", .frame.message)]
    Assert { frame: Frame },
}

impl Error {
    #[track_caller]
    pub fn sql(kind: SqlErrorKind, message: impl Into<String>) -> Self {
        let loc = Location::caller();
        Error::Sql {
            kind,
            frame: Frame {
                message: message.into(),
                function: None,
                file: loc.file(),
                line: loc.line(),
            },
        }
    }

    #[track_caller]
    pub fn sql_in(kind: SqlErrorKind, function: &'static str, message: impl Into<String>) -> Self {
        let loc = Location::caller();
        Error::Sql {
            kind,
            frame: Frame {
                message: message.into(),
                function: Some(function),
                file: loc.file(),
                line: loc.line(),
            },
        }
    }

    #[track_caller]
    pub fn assert(message: impl Into<String>) -> Self {
        let loc = Location::caller();
        Error::Assert {
            frame: Frame {
                message: message.into(),
                function: None,
                file: loc.file(),
                line: loc.line(),
            },
        }
    }

    /// Returns the [`SqlErrorKind`] for `Error::Sql`, or `None` for `Error::Assert`.
    pub fn kind(&self) -> Option<SqlErrorKind> {
        match self {
            Error::Sql { kind, .. } => Some(*kind),
            Error::Assert { .. } => None,
        }
    }

    pub fn is_pool_full(&self) -> bool {
        matches!(self.kind(), Some(SqlErrorKind::PoolFull))
    }
}

/// Convenience constructor used by driver adapters to wrap a backend-native
/// error while preserving its message verbatim (spec.md §4.2).
#[track_caller]
pub fn driver_error(message: impl Into<String>) -> Error {
    Error::sql(SqlErrorKind::Driver, message)
}
