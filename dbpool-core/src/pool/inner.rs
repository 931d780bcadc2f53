//! Pool internals: the shared state, the acquire/release protocol, and the
//! `PooledConnection` RAII guard (spec.md §4.6.2, §4.6.3).
//!
//! Mirrors the teacher's `SharedPool<DB>` / `Idle<DB>` / `Live<DB>` split,
//! minus the part of the shape that doesn't carry over: the teacher's async
//! semaphore queues a waiter until a permit frees up, but spec.md §1/§5
//! forbid queuing entirely ("a full pool fails fast rather than blocking").
//! So there is no waiter queue here, blocking or otherwise — just a `Mutex`
//! guarding the bookkeeping around an acquisition that either succeeds,
//! creates, or fails immediately (spec.md §4.6.2).

use std::collections::VecDeque;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tracing::Level;

use crate::connection::Connection;
use crate::driver::Driver;
use crate::error::{Error, Result, SqlErrorKind};
use crate::url::Url;

use super::PoolOptions;

struct IdleConn {
    conn: Connection,
    idle_since: Instant,
}

struct State {
    idle: VecDeque<IdleConn>,
    /// Connections currently checked out by a caller (spec.md §4.6.6 `active`).
    checked_out: u32,
    closed: bool,
}

impl State {
    /// Live connections: checked out plus idle. Never exceeds `max_connections`.
    fn size(&self) -> u32 {
        u32::try_from(self.idle.len()).unwrap_or(u32::MAX) + self.checked_out
    }
}

pub(crate) struct SharedPool {
    driver: Arc<dyn Driver>,
    url: Url,
    options: PoolOptions,
    state: Mutex<State>,
}

impl SharedPool {
    pub(crate) fn new(driver: Arc<dyn Driver>, url: Url, options: PoolOptions) -> Arc<Self> {
        Arc::new(SharedPool {
            driver,
            url,
            options,
            state: Mutex::new(State {
                idle: VecDeque::new(),
                checked_out: 0,
                closed: false,
            }),
        })
    }

    pub(crate) fn url(&self) -> &Url {
        &self.url
    }

    pub(crate) fn options(&self) -> &PoolOptions {
        &self.options
    }

    /// Eagerly opens `min_connections` sessions. A failure partway through
    /// is logged and treated as a successful partial fill rather than a
    /// hard construction error (spec.md §9 Open Question: "behavior when
    /// min_connections cannot be satisfied at startup").
    pub(crate) fn fill_to_min(self: &Arc<Self>) {
        for _ in 0..self.options.min_connections {
            match self.create_connection() {
                Ok(conn) => {
                    let mut state = self.state.lock().unwrap();
                    state.idle.push_back(IdleConn {
                        conn,
                        idle_since: Instant::now(),
                    });
                }
                Err(error) => {
                    tracing::warn!(%error, "failed to pre-fill pool to min_connections; continuing with a smaller pool");
                    break;
                }
            }
        }
    }

    fn create_connection(&self) -> Result<Connection> {
        let raw = self.driver.open(&self.url)?;
        let mut conn = Connection::new(raw);
        if let Some(hook) = &self.options.after_connect {
            hook(&mut conn)?;
        }
        Ok(conn)
    }

    /// Returns a pingable connection or fails immediately; never blocks
    /// waiting for another caller to release one (spec.md §4.6.2).
    pub(crate) fn acquire(self: &Arc<Self>) -> Result<Connection> {
        let start = Instant::now();
        let conn = self.acquire_inner()?;
        let elapsed = start.elapsed();
        log_at(self.options.acquire_time_level, &format!("acquired connection in {elapsed:?}"));
        if elapsed >= self.options.acquire_slow_threshold {
            log_at(
                self.options.acquire_slow_level,
                &format!("acquiring a connection took {elapsed:?}, exceeding acquire_slow_threshold"),
            );
        }
        Ok(conn)
    }

    /// Identical to [`SharedPool::acquire`]: spec.md has no blocking
    /// acquisition variant to distinguish this from, since the core never
    /// queues waiters (spec.md §4.6.2 step 4, "do not block").
    pub(crate) fn try_acquire(self: &Arc<Self>) -> Result<Connection> {
        self.acquire_inner()
    }

    /// Implements spec.md §4.6.2's algorithm: scan for an idle connection
    /// first, retrying past any that fail to recycle; otherwise open a new
    /// one while under `max_connections`; otherwise fail with `PoolFull`
    /// without blocking.
    fn acquire_inner(self: &Arc<Self>) -> Result<Connection> {
        loop {
            let mut state = self.state.lock().unwrap();

            if state.closed {
                return Err(Error::sql(SqlErrorKind::InvalidState, "pool is closed"));
            }

            if let Some(idle) = state.idle.pop_front() {
                drop(state);
                match self.recycle(idle) {
                    Some(conn) => {
                        let mut state = self.state.lock().unwrap();
                        state.checked_out += 1;
                        return Ok(conn);
                    }
                    // The idle connection was dead or expired and has
                    // already been dropped from `idle`; loop and try the
                    // next candidate (or open a new one).
                    None => continue,
                }
            }

            if state.size() < self.options.max_connections {
                state.checked_out += 1;
                drop(state);
                return match self.create_connection() {
                    Ok(conn) => Ok(conn),
                    Err(error) => {
                        let mut state = self.state.lock().unwrap();
                        state.checked_out = state.checked_out.saturating_sub(1);
                        Err(error)
                    }
                };
            }

            return Err(Error::sql(
                SqlErrorKind::PoolFull,
                "pool is at max_connections and no connection is idle",
            ));
        }
    }

    /// Validates a just-popped idle connection before handing it out.
    /// Returns `None` if the connection was closed instead (expired
    /// lifetime, or a failed liveness ping); the caller retries the loop.
    /// The connection has already been removed from `idle` by the caller,
    /// so no further bookkeeping is needed on this path.
    fn recycle(self: &Arc<Self>, mut idle: IdleConn) -> Option<Connection> {
        if let Some(max_lifetime) = self.options.max_lifetime {
            if idle.conn.created_at().elapsed() >= max_lifetime {
                let _ = idle.conn.close();
                return None;
            }
        }

        if self.options.test_before_acquire {
            match idle.conn.ping() {
                Ok(true) => {}
                Ok(false) | Err(_) => {
                    let _ = idle.conn.close();
                    return None;
                }
            }
        }

        if let Some(hook) = &self.options.before_acquire {
            if let Err(error) = hook(&mut idle.conn) {
                tracing::warn!(%error, "before_acquire hook rejected idle connection");
                let _ = idle.conn.close();
                return None;
            }
        }

        Some(idle.conn)
    }

    fn dec_checked_out(self: &Arc<Self>) {
        let mut state = self.state.lock().unwrap();
        state.checked_out = state.checked_out.saturating_sub(1);
    }

    /// Returns a checked-out connection to the idle queue, rolling back any
    /// open transaction first (spec.md §4.6.3, the rollback-on-return
    /// property). If the pool has been closed in the meantime the
    /// connection is closed instead of requeued.
    pub(crate) fn release(self: &Arc<Self>, mut conn: Connection) {
        if let Err(error) = conn.rollback_if_open() {
            tracing::warn!(%error, "rollback on return failed; closing connection instead of reusing it");
            self.dec_checked_out();
            let _ = conn.close();
            return;
        }

        if let Some(hook) = &self.options.after_release {
            if let Err(error) = hook(&mut conn) {
                tracing::warn!(%error, "after_release hook failed; closing connection instead of reusing it");
                self.dec_checked_out();
                let _ = conn.close();
                return;
            }
        }

        let mut state = self.state.lock().unwrap();
        state.checked_out = state.checked_out.saturating_sub(1);
        if state.closed {
            drop(state);
            let _ = conn.close();
            return;
        }
        state.idle.push_back(IdleConn {
            conn,
            idle_since: Instant::now(),
        });
    }

    /// Closes and drops a connection without requeuing it (spec.md §4.6.3,
    /// used when the caller explicitly discards a broken connection).
    pub(crate) fn discard(self: &Arc<Self>, conn: Connection) -> Result<()> {
        self.dec_checked_out();
        conn.close()
    }

    /// Reaps idle connections past `idle_timeout`/`max_lifetime`, never
    /// dropping the live count below `min_connections` (spec.md §4.6.4).
    pub(crate) fn reap_idle(self: &Arc<Self>) {
        let mut state = self.state.lock().unwrap();
        if state.closed {
            return;
        }

        let min = self.options.min_connections;
        let mut remaining_size = state.size();
        let mut keep = VecDeque::with_capacity(state.idle.len());
        let mut reaped = 0u32;

        while let Some(idle) = state.idle.pop_front() {
            let idle_expired = self
                .options
                .idle_timeout
                .is_some_and(|t| idle.idle_since.elapsed() >= t);
            let lifetime_expired = self
                .options
                .max_lifetime
                .is_some_and(|t| idle.conn.created_at().elapsed() >= t);

            if (idle_expired || lifetime_expired) && remaining_size > min {
                let _ = idle.conn.close();
                remaining_size -= 1;
                reaped += 1;
            } else {
                keep.push_back(idle);
            }
        }
        state.idle = keep;
        drop(state);

        if reaped > 0 {
            tracing::debug!(reaped, "reaper closed expired idle connections");
        }
    }

    /// Closes every idle connection and marks the pool closed so future
    /// acquires are rejected (spec.md §4.6.5). Refused with `InvalidState`
    /// while any connection is still checked out (spec.md §4.6.5 "checked
    /// error if active() > 0", §7).
    pub(crate) fn close(self: &Arc<Self>) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.closed {
            return Ok(());
        }
        if state.checked_out > 0 {
            return Err(Error::sql(
                SqlErrorKind::InvalidState,
                format!("cannot stop: {} connection(s) are still checked out", state.checked_out),
            ));
        }
        state.closed = true;
        let idle: Vec<IdleConn> = state.idle.drain(..).collect();
        drop(state);

        for idle in idle {
            let _ = idle.conn.close();
        }
        Ok(())
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.state.lock().unwrap().closed
    }

    /// Total live connections: checked out plus idle (spec.md §4.6.6).
    pub(crate) fn size(&self) -> u32 {
        self.state.lock().unwrap().size()
    }

    /// Connections currently checked out by a caller (spec.md §4.6.6 `active`).
    pub(crate) fn active(&self) -> u32 {
        self.state.lock().unwrap().checked_out
    }

    pub(crate) fn num_idle(&self) -> usize {
        self.state.lock().unwrap().idle.len()
    }

    /// `true` iff `active() == max_connections` (spec.md §4.6.6) — a
    /// distinct condition from `size() == max_connections`: a pool at
    /// `max_connections` with idle connections sitting in the queue still
    /// has capacity to hand one out and is not full.
    pub(crate) fn is_full(&self) -> bool {
        self.state.lock().unwrap().checked_out >= self.options.max_connections
    }
}

impl fmt::Debug for SharedPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock().unwrap();
        f.debug_struct("Pool")
            .field("size", &state.size())
            .field("active", &state.checked_out)
            .field("num_idle", &state.idle.len())
            .field("max_connections", &self.options.max_connections)
            .field("closed", &state.closed)
            .finish()
    }
}

fn log_at(level: Level, message: &str) {
    match level {
        Level::ERROR => tracing::error!("{message}"),
        Level::WARN => tracing::warn!("{message}"),
        Level::INFO => tracing::info!("{message}"),
        Level::DEBUG => tracing::debug!("{message}"),
        Level::TRACE => tracing::trace!("{message}"),
    }
}

/// An RAII handle on a checked-out connection (spec.md §4.6.3).
///
/// Returns the connection to its pool on drop — after rolling back any
/// transaction the caller left open. Mirrors the teacher's
/// `PoolConnection<DB>` guard.
pub struct PooledConnection {
    pool: Arc<SharedPool>,
    conn: Option<Connection>,
}

impl PooledConnection {
    pub(crate) fn new(pool: Arc<SharedPool>, conn: Connection) -> Self {
        PooledConnection {
            pool,
            conn: Some(conn),
        }
    }

    /// Closes this connection and removes it from the pool's live count
    /// instead of returning it to the idle queue — use after detecting the
    /// connection is broken in a way a liveness ping would not catch.
    pub fn close(mut self) -> Result<()> {
        let conn = self.conn.take().expect("connection already taken");
        self.pool.discard(conn)
    }
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.conn.as_ref().expect("connection already taken")
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Connection {
        self.conn.as_mut().expect("connection already taken")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn);
        }
    }
}

impl fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConnection").field("pool", &self.pool).finish()
    }
}
