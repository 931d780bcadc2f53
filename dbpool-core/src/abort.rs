//! The process-wide fatal-error hook (spec.md §6.5, §7).
//!
//! Programmer-error preconditions (`Error::Assert`) are not recoverable —
//! spec.md treats them the way the original library treats an assertion
//! failure: terminate rather than let the caller limp along on invalid
//! state. Rust has no analogue of installing a handler that runs before an
//! uncaught exception unwinds the process, so this hook is the closest
//! realization: a process-wide callback run immediately before the thread
//! panics, useful for flushing logs or emitting a crash report.

use std::sync::OnceLock;

use crate::error::Error;

type Hook = dyn Fn(&Error) + Send + Sync;

static HANDLER: OnceLock<Box<Hook>> = OnceLock::new();

/// Registers the process-wide abort hook. May only be called once; later
/// calls return `Err` and leave the first registration in place.
pub fn set_abort_handler<F>(handler: F) -> std::result::Result<(), ()>
where
    F: Fn(&Error) + Send + Sync + 'static,
{
    HANDLER.set(Box::new(handler)).map_err(|_| ())
}

/// Runs the registered hook, if any, then panics the calling thread.
///
/// Reserved for precondition violations that indicate a bug in the caller
/// (e.g. using a `PooledConnection` after it has been closed) — never used
/// for ordinary, recoverable runtime failures, which are always returned
/// as `Result::Err` instead.
#[track_caller]
pub(crate) fn raise(error: Error) -> ! {
    if let Some(hook) = HANDLER.get() {
        hook(&error);
    }
    panic!("{error}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SqlErrorKind;

    #[test]
    #[should_panic(expected = "assertion failed")]
    fn raise_panics() {
        raise(Error::assert("test precondition violated"));
    }

    #[test]
    fn second_registration_is_rejected() {
        // Shares process-wide state with other tests in this binary, so
        // only assert the idempotent outcome: at most one registration
        // ever succeeds.
        let first = set_abort_handler(|_: &Error| {});
        let second = set_abort_handler(|_: &Error| {});
        assert!(first.is_err() || second.is_err(), "two registrations cannot both succeed");
        let _ = SqlErrorKind::Other;
    }
}
