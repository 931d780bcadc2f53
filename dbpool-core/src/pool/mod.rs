//! The connection pool manager (spec.md §4.6).
//!
//! `Pool` is a thin, `Clone`-able handle around `Arc<SharedPool>` — exactly
//! the teacher's `Pool<DB>(Arc<SharedPool<DB>>)` shape. The acquisition
//! algorithm, the return protocol, and the reaper live in [`inner`] and
//! [`reaper`]; this module is the public builder/façade surface.

mod inner;
mod reaper;
#[cfg(test)]
mod tests;

pub use inner::PooledConnection;

use std::fmt;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::Level;

use crate::connection::Connection;
use crate::driver::Driver;
use crate::error::Result;
use crate::url::Url;

use inner::SharedPool;

type Hook = Arc<dyn Fn(&mut Connection) -> Result<()> + Send + Sync>;

/// Builder for a [`Pool`] (spec.md §4.6.1, §6.3, §10, §12).
///
/// Field defaults mirror the teacher's `PoolOptions<DB>`.
pub struct PoolOptions {
    pub(crate) max_connections: u32,
    pub(crate) min_connections: u32,
    pub(crate) max_lifetime: Option<Duration>,
    pub(crate) idle_timeout: Option<Duration>,
    pub(crate) test_before_acquire: bool,
    pub(crate) acquire_time_level: Level,
    pub(crate) acquire_slow_level: Level,
    pub(crate) acquire_slow_threshold: Duration,
    pub(crate) after_connect: Option<Hook>,
    pub(crate) before_acquire: Option<Hook>,
    pub(crate) after_release: Option<Hook>,
}

impl Default for PoolOptions {
    fn default() -> Self {
        PoolOptions {
            max_connections: 10,
            min_connections: 0,
            max_lifetime: Some(Duration::from_secs(30 * 60)),
            idle_timeout: Some(Duration::from_secs(10 * 60)),
            test_before_acquire: true,
            acquire_time_level: Level::DEBUG,
            acquire_slow_level: Level::WARN,
            acquire_slow_threshold: Duration::from_secs(2),
            after_connect: None,
            before_acquire: None,
            after_release: None,
        }
    }
}

impl PoolOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upper bound on live connections (checked out + idle). Must be at
    /// least `1`; the pool clamps a lower value up to `1`.
    pub fn max_connections(mut self, n: u32) -> Self {
        self.max_connections = n.max(1);
        self
    }

    /// Connections the pool tries to keep open even while idle.
    pub fn min_connections(mut self, n: u32) -> Self {
        self.min_connections = n;
        self
    }

    /// Maximum age of a connection before the reaper (or a recycling
    /// acquire) closes it instead of reusing it. `None` disables the check.
    pub fn max_lifetime(mut self, lifetime: impl Into<Option<Duration>>) -> Self {
        self.max_lifetime = lifetime.into();
        self
    }

    /// Maximum time a connection may sit idle before the reaper closes it,
    /// never dropping the pool below `min_connections`. `None` disables it.
    pub fn idle_timeout(mut self, timeout: impl Into<Option<Duration>>) -> Self {
        self.idle_timeout = timeout.into();
        self
    }

    /// Whether to ping an idle connection before handing it out
    /// (spec.md §4.6.2 step 2, the ping-before-handout guarantee).
    pub fn test_before_acquire(mut self, test: bool) -> Self {
        self.test_before_acquire = test;
        self
    }

    /// Log level used to report every successful acquire's wait time.
    pub fn acquire_time_level(mut self, level: Level) -> Self {
        self.acquire_time_level = level;
        self
    }

    /// Log level used when an acquire's wait time meets or exceeds
    /// `acquire_slow_threshold`.
    pub fn acquire_slow_level(mut self, level: Level) -> Self {
        self.acquire_slow_level = level;
        self
    }

    pub fn acquire_slow_threshold(mut self, threshold: Duration) -> Self {
        self.acquire_slow_threshold = threshold;
        self
    }

    /// Runs once, immediately after a new physical connection is opened
    /// (including pre-fill at construction).
    pub fn after_connect<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Connection) -> Result<()> + Send + Sync + 'static,
    {
        self.after_connect = Some(Arc::new(hook));
        self
    }

    /// Runs each time an idle connection is about to be handed out,
    /// after the liveness ping (if `test_before_acquire` is set).
    pub fn before_acquire<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Connection) -> Result<()> + Send + Sync + 'static,
    {
        self.before_acquire = Some(Arc::new(hook));
        self
    }

    /// Runs each time a connection is returned to the pool, before it
    /// re-enters the idle queue.
    pub fn after_release<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Connection) -> Result<()> + Send + Sync + 'static,
    {
        self.after_release = Some(Arc::new(hook));
        self
    }

    /// Parses `url`, opens `min_connections` sessions eagerly, and starts
    /// the reaper if an expiry policy is configured.
    pub fn connect(self, url: &str, driver: Arc<dyn Driver>) -> Result<Pool> {
        let url = Url::parse(url)?;
        self.connect_parsed(url, driver, true)
    }

    /// Like [`PoolOptions::connect`], but returns before any physical
    /// connection is opened; the first `acquire()` opens it lazily.
    pub fn connect_lazy(self, url: &str, driver: Arc<dyn Driver>) -> Result<Pool> {
        let url = Url::parse(url)?;
        self.connect_parsed(url, driver, false)
    }

    fn connect_parsed(self, url: Url, driver: Arc<dyn Driver>, eager: bool) -> Result<Pool> {
        let shared = SharedPool::new(driver, url, self);
        if eager {
            shared.fill_to_min();
        }
        let reaper = reaper::spawn(&shared);
        Ok(Pool {
            shared,
            reaper: Arc::new(Mutex::new(reaper)),
        })
    }
}

/// A thread-safe, cloneable handle to a bounded set of long-lived
/// connections (spec.md §2, §4.6).
///
/// Cloning a `Pool` is cheap (an `Arc` bump) and every clone shares the same
/// underlying connections, idle queue, and reaper thread.
#[derive(Clone)]
pub struct Pool {
    shared: Arc<SharedPool>,
    reaper: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl Pool {
    pub fn builder() -> PoolOptions {
        PoolOptions::new()
    }

    /// Connects with default [`PoolOptions`].
    pub fn connect(url: &str, driver: Arc<dyn Driver>) -> Result<Pool> {
        PoolOptions::new().connect(url, driver)
    }

    /// Returns an idle connection, opens a new one while under
    /// `max_connections`, or fails immediately with `SqlErrorKind::PoolFull`.
    /// Never blocks waiting for another caller to release a connection
    /// (spec.md §1, §4.6.2, §5).
    pub fn acquire(&self) -> Result<PooledConnection> {
        let conn = self.shared.acquire()?;
        Ok(PooledConnection::new(Arc::clone(&self.shared), conn))
    }

    /// Never blocks: returns `SqlErrorKind::PoolFull` immediately if no
    /// connection is idle and the pool is already at `max_connections`
    /// (spec.md §4.6.2 step 4).
    pub fn try_acquire(&self) -> Result<PooledConnection> {
        let conn = self.shared.try_acquire()?;
        Ok(PooledConnection::new(Arc::clone(&self.shared), conn))
    }

    /// Total live connections: checked out plus idle.
    pub fn size(&self) -> u32 {
        self.shared.size()
    }

    /// Connections currently idle in the pool.
    pub fn idle(&self) -> usize {
        self.shared.num_idle()
    }

    /// Connections currently checked out by a caller (spec.md §4.6.6).
    pub fn active(&self) -> u32 {
        self.shared.active()
    }

    pub fn max_size(&self) -> u32 {
        self.shared.options().max_connections
    }

    pub fn min_size(&self) -> u32 {
        self.shared.options().min_connections
    }

    /// `true` once `active() == max_size()`: every live connection is
    /// checked out and none is idle to hand out (spec.md §4.6.6).
    pub fn is_full(&self) -> bool {
        self.shared.is_full()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    /// Closes every idle connection, rejects further acquires, and waits
    /// for the reaper thread to exit (spec.md §4.6.5). Refused with
    /// `SqlErrorKind::InvalidState` while any connection is still checked
    /// out (spec.md §4.6.5, §7).
    pub fn close(&self) -> Result<()> {
        self.shared.close()?;
        if let Some(handle) = self.reaper.lock().unwrap().take() {
            let _ = handle.join();
        }
        Ok(())
    }
}

impl fmt::Debug for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.shared, f)
    }
}
