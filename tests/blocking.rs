mod common;

use sluice::{Error, blocking::BlockingClient};
use tokio::runtime::Runtime;

/// The mock needs a runtime of its own, the blocking connection brings
/// another one.
fn mock() -> (Runtime, common::MockServer) {
    let rt = Runtime::new().unwrap();
    let mock = rt.block_on(common::spawn());
    (rt, mock)
}

#[test]
fn iterate_rows() {
    let (_rt, mock) = mock();
    let client = BlockingClient::new(&mock.dsn()).unwrap();
    let mut conn = client.get_conn().unwrap();

    let rows = conn.query_iter("SELECT number FROM numbers(5)").unwrap();
    assert_eq!("number", rows.schema()[0].name());

    let numbers: Vec<u64> = rows.map(|row| row.unwrap().get::<u64, _>(0).unwrap()).collect();
    assert_eq!(vec![0, 1, 2, 3, 4], numbers);
    assert!(mock.kills().is_empty());
}

#[test]
fn dropping_rows_early_kills_the_query() {
    let (_rt, mock) = mock();
    let mut conn = BlockingClient::new(&mock.dsn()).unwrap().get_conn().unwrap();

    let mut rows = conn.query_iter("SELECT number FROM numbers(5)").unwrap();
    assert!(rows.next().is_some());
    drop(rows);

    assert_eq!(vec!["q1"], mock.kills());
}

#[test]
fn query_row_and_empty_result() {
    let (_rt, mock) = mock();
    let mut conn = BlockingClient::new(&mock.dsn()).unwrap().get_conn().unwrap();

    let row = conn.query_row("SELECT 'Hello, World!'").unwrap();
    assert_eq!("Hello, World!", row.get::<String, _>(0).unwrap());

    let err = conn.query_row("SELECT 1 WHERE false").unwrap_err();
    assert_eq!(Error::EmptyResult, err);

    assert_eq!("mock 1.0", conn.version().unwrap());
}

#[test]
fn stream_load() {
    let (_rt, mock) = mock();
    let mut conn = BlockingClient::new(&mock.dsn()).unwrap().get_conn().unwrap();

    let progress = conn
        .stream_load(
            "INSERT INTO test VALUES",
            [["-1", "1", "1.0", "1", "1", "2011-03-06", "2011-03-06T06:20:00Z"]],
        )
        .unwrap();
    assert_eq!(1, progress.write_rows);
    assert_eq!(45, progress.write_bytes);

    let info = conn.info();
    assert_eq!(Some("default".to_string()), info.database);

    conn.close().unwrap();
}
