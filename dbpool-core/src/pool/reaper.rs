//! The background idle-connection reaper (spec.md §4.6.4).
//!
//! One thread per pool, holding only a `Weak` reference so it never keeps
//! the pool alive past the last `Pool`/`PooledConnection` handle — mirrors
//! the teacher's `conn_reaper` background task.

use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::inner::SharedPool;

/// Spawns the reaper thread, or returns `None` if neither `idle_timeout`
/// nor `max_lifetime` is configured — an unbounded pool has nothing to reap
/// and the thread would only spin uselessly (spec.md §9: "the reaper must
/// not run when no expiry policy is configured").
pub(crate) fn spawn(pool: &Arc<SharedPool>) -> Option<JoinHandle<()>> {
    let period = reap_period(pool.options())?;
    let weak = Arc::downgrade(pool);
    Some(
        thread::Builder::new()
            .name("dbpool-reaper".into())
            .spawn(move || run(weak, period))
            .expect("failed to spawn dbpool reaper thread"),
    )
}

fn reap_period(options: &super::PoolOptions) -> Option<Duration> {
    let shortest = [options.idle_timeout, options.max_lifetime]
        .into_iter()
        .flatten()
        .min()?;
    Some((shortest / 2).max(Duration::from_millis(100)))
}

fn run(pool: Weak<SharedPool>, period: Duration) {
    loop {
        thread::sleep(period);
        let Some(pool) = pool.upgrade() else {
            return;
        };
        if pool.is_closed() {
            return;
        }
        pool.reap_idle();
    }
}
