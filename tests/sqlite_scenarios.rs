//! Statement/result and failure-recovery scenarios against the real SQLite
//! driver (spec.md §8).

use std::sync::Arc;

use dbpool::{Pool, PoolOptions, SqlErrorKind, SqliteDriver, Value};

fn file_url(path: &std::path::Path) -> String {
    format!("sqlite://{}", path.display())
}

#[test]
fn round_trips_text_blob_and_timestamp_through_a_prepared_statement() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("t.db");
    let pool = Pool::builder()
        .min_connections(1)
        .max_connections(3)
        .connect(&file_url(&db_path), Arc::new(SqliteDriver))
        .unwrap();

    let mut conn = pool.acquire().unwrap();
    conn.execute("CREATE TABLE t (id INTEGER PRIMARY KEY, name VARCHAR, bin BLOB, ts INTEGER)")
        .unwrap();

    let mut insert = conn.prepare("INSERT INTO t(name,bin,ts) VALUES(?,?,?)").unwrap();
    insert
        .bind_values(&[
            Value::Text("Kaoru".to_owned()),
            Value::Blob(vec![0x01, 0x02, 0x03]),
            Value::Timestamp(1_700_000_000),
        ])
        .unwrap();
    insert.execute().unwrap();

    let mut select = conn.prepare("SELECT name,bin,ts FROM t WHERE id=?").unwrap();
    select.bind(1, 1i64).unwrap();
    let mut rows = select.execute_query().unwrap();

    assert!(rows.next().unwrap());
    assert_eq!(rows.column_count(), 3);
    assert_eq!(rows.get_string(1).unwrap(), Some("Kaoru".to_owned()));
    assert_eq!(rows.get_blob(2).unwrap(), Some(vec![0x01, 0x02, 0x03]));
    assert_eq!(rows.get_timestamp(3).unwrap(), 1_700_000_000);
    assert!(!rows.next().unwrap());
}

#[test]
fn bind_values_with_wrong_count_rejects_before_binding_anything() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("t.db");
    let pool = Pool::builder()
        .min_connections(1)
        .max_connections(1)
        .connect(&file_url(&db_path), Arc::new(SqliteDriver))
        .unwrap();

    let mut conn = pool.acquire().unwrap();
    conn.execute("CREATE TABLE t (a INTEGER, b INTEGER)").unwrap();

    let mut insert = conn.prepare("INSERT INTO t(a,b) VALUES(?,?)").unwrap();
    let err = insert
        .bind_values(&[Value::Int(1), Value::Int(2), Value::Int(3)])
        .unwrap_err();
    assert_eq!(err.kind(), Some(SqlErrorKind::ParameterCountMismatch));

    // The mismatched call must not have partially bound parameters: a
    // correctly-sized call on the same statement still succeeds.
    insert.bind_values(&[Value::Int(1), Value::Int(2)]).unwrap();
    assert_eq!(insert.execute().unwrap(), 1);
}

#[test]
fn next_past_the_last_row_returns_false() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("t.db");
    let pool = Pool::builder()
        .min_connections(1)
        .max_connections(1)
        .connect(&file_url(&db_path), Arc::new(SqliteDriver))
        .unwrap();

    let mut conn = pool.acquire().unwrap();
    conn.execute("CREATE TABLE t (id INTEGER)").unwrap();
    conn.execute("INSERT INTO t(id) VALUES (1)").unwrap();

    let mut rows = conn.execute_query("SELECT id FROM t").unwrap();
    assert!(rows.next().unwrap());
    assert_eq!(rows.get_i64(1).unwrap(), 1);
    assert!(!rows.next().unwrap());
    assert!(!rows.next().unwrap(), "calling next() again past exhaustion stays false");
}

#[test]
fn opening_a_new_connection_fails_cleanly_when_the_database_directory_is_gone_and_recovers_after() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("sub").join("t.db");
    std::fs::create_dir_all(db_path.parent().unwrap()).unwrap();

    let pool = PoolOptions::new()
        .min_connections(1)
        .max_connections(2)
        .connect(&file_url(&db_path), Arc::new(SqliteDriver))
        .unwrap();

    // Hold the one pre-filled connection so the next acquire must open a
    // brand new physical connection rather than reuse an idle one.
    let held = pool.acquire().unwrap();

    std::fs::remove_dir_all(dir.path().join("sub")).unwrap();

    let err = pool.try_acquire().unwrap_err();
    assert_eq!(err.kind(), Some(SqlErrorKind::Driver));
    assert!(
        !pool.is_full(),
        "a failed open must not leave the pool thinking it grew"
    );

    drop(held);
    std::fs::create_dir_all(db_path.parent().unwrap()).unwrap();

    // The pool recovers once the database is reachable again.
    let conn = pool.acquire().unwrap();
    assert!(!conn.in_transaction());
}
