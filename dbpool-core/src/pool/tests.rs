//! Pool-algorithm invariant tests against an in-memory mock driver
//! (spec.md §8): no real backend is needed to exercise acquisition bounds,
//! the ping-before-handout guarantee, rollback-on-return, and fail-fast
//! behavior when the pool is full.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::driver::{DateTime, Driver, RawConnection, RawRows, RawStatement, TransactionType};
use crate::error::{Error, Result, SqlErrorKind};
use crate::pool::PoolOptions;
use crate::url::Url;

#[derive(Default)]
struct Counters {
    opened: AtomicUsize,
    closed: AtomicUsize,
}

struct MockDriver {
    counters: Arc<Counters>,
    alive: Arc<AtomicBool>,
}

impl MockDriver {
    fn new() -> Arc<Self> {
        Arc::new(MockDriver {
            counters: Arc::new(Counters::default()),
            alive: Arc::new(AtomicBool::new(true)),
        })
    }
}

impl Driver for MockDriver {
    fn open(&self, _url: &Url) -> Result<Box<dyn RawConnection>> {
        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockConnection {
            counters: Arc::clone(&self.counters),
            alive: Arc::clone(&self.alive),
            in_tx: false,
        }))
    }
}

struct MockConnection {
    counters: Arc<Counters>,
    alive: Arc<AtomicBool>,
    in_tx: bool,
}

impl RawConnection for MockConnection {
    fn close(&mut self) -> Result<()> {
        self.counters.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn ping(&mut self) -> Result<bool> {
        Ok(self.alive.load(Ordering::SeqCst))
    }

    fn begin(&mut self, _isolation: TransactionType) -> Result<()> {
        self.in_tx = true;
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.in_tx = false;
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        self.in_tx = false;
        Ok(())
    }

    fn execute(&mut self, _sql: &str) -> Result<u64> {
        Ok(0)
    }

    fn execute_query(&mut self, _sql: &str) -> Result<Box<dyn RawRows>> {
        Ok(Box::new(EmptyRows))
    }

    fn prepare(&mut self, _sql: &str) -> Result<Box<dyn RawStatement>> {
        Err(Error::sql(SqlErrorKind::NotSupported, "mock driver has no statements"))
    }

    fn last_row_id(&self) -> i64 {
        0
    }
}

struct EmptyRows;

impl RawRows for EmptyRows {
    fn next(&mut self) -> Result<bool> {
        Ok(false)
    }
    fn column_count(&self) -> usize {
        0
    }
    fn column_name(&self, _index: usize) -> Result<String> {
        Ok(String::new())
    }
    fn is_null(&self, _index: usize) -> Result<bool> {
        Ok(true)
    }
    fn get_string(&self, _index: usize) -> Result<Option<String>> {
        Ok(None)
    }
    fn get_blob(&self, _index: usize) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }
    fn get_timestamp(&self, _index: usize) -> Result<i64> {
        Ok(0)
    }
    fn get_datetime(&self, _index: usize) -> Result<DateTime> {
        unimplemented!("not exercised by these tests")
    }
    fn set_fetch_size(&mut self, _n: u32) -> Result<()> {
        Ok(())
    }
}

fn opts() -> PoolOptions {
    PoolOptions::new().idle_timeout(None).max_lifetime(None)
}

#[test]
fn fills_to_min_connections_on_connect() {
    let driver = MockDriver::new();
    let pool = opts()
        .min_connections(2)
        .max_connections(4)
        .connect("mock://test", driver)
        .unwrap();
    assert_eq!(pool.size(), 2);
    assert_eq!(pool.idle(), 2);
}

#[test]
fn acquire_reuses_idle_connections_without_opening_new_ones() {
    let driver = MockDriver::new();
    let counters = Arc::clone(&driver.counters);
    let pool = opts().max_connections(2).connect("mock://test", driver).unwrap();

    {
        let _a = pool.acquire().unwrap();
    }
    {
        let _b = pool.acquire().unwrap();
    }
    assert_eq!(counters.opened.load(Ordering::SeqCst), 1);
    assert_eq!(pool.size(), 1);
}

#[test]
fn try_acquire_fails_fast_when_pool_is_full() {
    let driver = MockDriver::new();
    let pool = opts().max_connections(1).connect("mock://test", driver).unwrap();

    let _held = pool.acquire().unwrap();
    assert!(pool.is_full());

    let start = Instant::now();
    let err = pool.try_acquire().unwrap_err();
    assert!(err.is_pool_full());
    assert!(start.elapsed() < Duration::from_millis(50), "try_acquire must never block");
}

#[test]
fn acquire_fails_fast_when_pool_stays_full() {
    let driver = MockDriver::new();
    let pool = opts().max_connections(1).connect("mock://test", driver).unwrap();

    let _held = pool.acquire().unwrap();
    let start = Instant::now();
    let err = pool.acquire().unwrap_err();
    assert!(err.is_pool_full());
    assert!(start.elapsed() < Duration::from_millis(50), "acquire must never block");
}

#[test]
fn acquire_does_not_wait_for_a_connection_released_by_another_thread() {
    let driver = MockDriver::new();
    let pool = opts().max_connections(1).connect("mock://test", driver).unwrap();

    let held = pool.acquire().unwrap();
    let waiter_pool = pool.clone();
    let waiter = std::thread::spawn(move || waiter_pool.acquire().map(|_| ()));

    // The spawned acquire must fail immediately rather than park waiting for
    // `held` to be dropped; it has nothing to race against.
    let result = waiter.join().unwrap();
    assert!(result.unwrap_err().is_pool_full());

    drop(held);
    assert!(pool.acquire().is_ok());
}

#[test]
fn returning_a_connection_rolls_back_an_open_transaction() {
    let driver = MockDriver::new();
    let pool = opts().max_connections(1).connect("mock://test", driver).unwrap();

    {
        let mut conn = pool.acquire().unwrap();
        conn.begin_transaction().unwrap();
        assert!(conn.in_transaction());
        // dropped without commit/rollback
    }

    let conn = pool.acquire().unwrap();
    assert!(!conn.in_transaction(), "a returned connection must not carry an open transaction");
}

#[test]
fn dead_idle_connection_is_reaped_instead_of_handed_out() {
    let driver = MockDriver::new();
    let counters = Arc::clone(&driver.counters);
    let alive = Arc::clone(&driver.alive);
    let pool = opts()
        .max_connections(2)
        .test_before_acquire(true)
        .connect("mock://test", driver)
        .unwrap();

    {
        let _conn = pool.acquire().unwrap();
    }
    assert_eq!(pool.idle(), 1);

    alive.store(false, Ordering::SeqCst);
    let _conn = pool.acquire().unwrap();

    assert_eq!(counters.opened.load(Ordering::SeqCst), 2, "the dead connection must be replaced, not reused");
    assert_eq!(counters.closed.load(Ordering::SeqCst), 1);
}

#[test]
fn close_rejects_further_acquires_and_drains_idle_connections() {
    let driver = MockDriver::new();
    let counters = Arc::clone(&driver.counters);
    let pool = opts().min_connections(2).max_connections(4).connect("mock://test", driver).unwrap();

    pool.close().unwrap();

    assert_eq!(counters.closed.load(Ordering::SeqCst), 2);
    let err = pool.acquire().unwrap_err();
    assert_eq!(err.kind(), Some(SqlErrorKind::InvalidState));
}

#[test]
fn close_is_refused_while_a_connection_is_checked_out() {
    let driver = MockDriver::new();
    let pool = opts().max_connections(2).connect("mock://test", driver).unwrap();

    let held = pool.acquire().unwrap();
    assert_eq!(pool.active(), 1);

    let err = pool.close().unwrap_err();
    assert_eq!(err.kind(), Some(SqlErrorKind::InvalidState));
    assert!(!pool.is_closed());

    drop(held);
    assert_eq!(pool.active(), 0);
    pool.close().unwrap();
}

#[test]
fn is_full_tracks_checked_out_connections_not_total_size() {
    let driver = MockDriver::new();
    let pool = opts().min_connections(2).max_connections(2).connect("mock://test", driver).unwrap();

    // Both connections are pre-filled and idle: the pool is at max size but
    // nothing is checked out, so it is not full.
    assert_eq!(pool.size(), 2);
    assert_eq!(pool.active(), 0);
    assert!(!pool.is_full());

    let _a = pool.acquire().unwrap();
    let _b = pool.acquire().unwrap();
    assert_eq!(pool.active(), 2);
    assert!(pool.is_full());
}

#[test]
fn reaper_trims_idle_connections_back_toward_min_connections() {
    let driver = MockDriver::new();
    let counters = Arc::clone(&driver.counters);
    let pool = PoolOptions::new()
        .min_connections(1)
        .max_connections(4)
        .idle_timeout(Duration::from_millis(30))
        .max_lifetime(None)
        .connect("mock://test", driver)
        .unwrap();

    // Check out four connections (reusing the one pre-filled connection and
    // opening three more) so the pool grows to max_connections, then let
    // them all go idle at once.
    let extras: Vec<_> = (0..4).map(|_| pool.acquire().unwrap()).collect();
    assert_eq!(pool.size(), 4);
    drop(extras);

    // The reaper period is derived from idle_timeout / 2 (floored at
    // 100ms); give it a few cycles to run.
    std::thread::sleep(Duration::from_millis(350));

    assert_eq!(pool.size(), 1, "reaper must trim idle connections down to min_connections");
    assert!(counters.closed.load(Ordering::SeqCst) >= 3);
    pool.close().unwrap();
}
