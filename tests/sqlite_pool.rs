//! Pool lifecycle scenarios against the real SQLite driver (spec.md §8).

use std::time::Duration;

use dbpool::{Pool, PoolOptions, SqliteDriver};
use std::sync::Arc;

fn memory_url() -> String {
    "sqlite://?mode=memory".to_owned()
}

#[test]
fn start_with_min_connections_fills_eagerly() {
    let pool = PoolOptions::new()
        .min_connections(2)
        .max_connections(5)
        .connect(&memory_url(), Arc::new(SqliteDriver))
        .unwrap();

    assert_eq!(pool.size(), 2);
    assert_eq!(pool.idle(), 2);
    assert!(!pool.is_full());
}

#[test]
fn acquiring_past_max_connections_fails_without_blocking() {
    let pool = PoolOptions::new()
        .min_connections(0)
        .max_connections(5)
        .connect(&memory_url(), Arc::new(SqliteDriver))
        .unwrap();

    let mut held = Vec::new();
    for n in 1..=5 {
        let conn = pool.acquire().unwrap();
        held.push(conn);
        assert_eq!(pool.size(), n);
    }
    assert!(pool.is_full());

    let start = std::time::Instant::now();
    let err = pool.try_acquire().unwrap_err();
    assert!(start.elapsed() < Duration::from_millis(500), "try_acquire must not block");

    let message = err.to_string().to_lowercase();
    assert!(message.contains("pool"), "message was: {message}");
    assert!(message.contains("full"), "message was: {message}");
    assert!(err.is_pool_full());
}

#[test]
fn transaction_left_open_is_rolled_back_on_return() {
    let pool = Pool::builder()
        .min_connections(1)
        .max_connections(3)
        .connect(&memory_url(), Arc::new(SqliteDriver))
        .unwrap();

    {
        let mut conn = pool.acquire().unwrap();
        conn.execute("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT)").unwrap();
        conn.begin_transaction().unwrap();
        conn.execute("INSERT INTO t (name) VALUES ('a')").unwrap();
        conn.execute("INSERT INTO t (name) VALUES ('b')").unwrap();
        // Dropped here without commit — the pool must roll back on release.
    }

    let mut conn = pool.acquire().unwrap();
    assert!(!conn.in_transaction());
    let mut rows = conn.execute_query("SELECT COUNT(*) FROM t").unwrap();
    assert!(rows.next().unwrap());
    assert_eq!(rows.get_i64(1).unwrap(), 0);
}

#[test]
fn reaper_trims_idle_connections_back_toward_min_connections() {
    let pool = Pool::builder()
        .min_connections(1)
        .max_connections(3)
        .idle_timeout(Duration::from_secs(1))
        .max_lifetime(None)
        .connect(&memory_url(), Arc::new(SqliteDriver))
        .unwrap();

    let extras: Vec<_> = (0..3).map(|_| pool.acquire().unwrap()).collect();
    assert_eq!(pool.size(), 3);
    drop(extras);
    assert_eq!(pool.idle(), 3);

    std::thread::sleep(Duration::from_secs(3));

    assert_eq!(pool.size(), 1);
    let conn = pool.acquire().unwrap();
    assert!(!conn.in_transaction());
}

#[test]
fn pool_close_rejects_further_acquires() {
    let pool = Pool::builder()
        .min_connections(1)
        .max_connections(2)
        .connect(&memory_url(), Arc::new(SqliteDriver))
        .unwrap();

    pool.close().unwrap();
    assert!(pool.is_closed());
    let err = pool.try_acquire().unwrap_err();
    assert!(err.to_string().contains("closed"));
}
