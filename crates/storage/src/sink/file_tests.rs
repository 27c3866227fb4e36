// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::TempDir;

#[tokio::test]
async fn appends_records_after_existing_content() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("transaction.log");
    std::fs::write(&path, "1\t2\ta\tb\n").unwrap();

    let mut sink = FileSink::open(&path, SyncPolicy::Flush).unwrap();
    sink.append(b"2\t1\ta\t\n").await.unwrap();
    sink.flush().await.unwrap();

    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        "1\t2\ta\tb\n2\t1\ta\t\n"
    );
}

#[tokio::test]
async fn creates_missing_parent_directories() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("deeper").join("transaction.log");

    let mut sink = FileSink::open(&path, SyncPolicy::Fsync).unwrap();
    sink.append(b"1\t2\tk\tv\n").await.unwrap();
    sink.flush().await.unwrap();

    assert_eq!(std::fs::read_to_string(&path).unwrap(), "1\t2\tk\tv\n");
}

#[tokio::test]
async fn open_fails_when_path_is_a_directory() {
    let dir = TempDir::new().unwrap();
    assert!(FileSink::open(dir.path(), SyncPolicy::Flush).is_err());
}

#[tokio::test]
async fn rollback_discards_unflushed_bytes() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("transaction.log");
    std::fs::write(&path, "1\t2\ta\tb\n").unwrap();

    let mut sink = FileSink::open(&path, SyncPolicy::Flush).unwrap();
    sink.append(b"2\t2\tc\td\n").await.unwrap();
    sink.flush().await.unwrap();

    // Half a record reaches the file before the writer gives up on it
    sink.append(b"3\t2\tto").await.unwrap();
    sink.rollback().await.unwrap();

    sink.append(b"4\t1\tc\t\n").await.unwrap();
    sink.flush().await.unwrap();

    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        "1\t2\ta\tb\n2\t2\tc\td\n4\t1\tc\t\n"
    );
}

#[tokio::test]
async fn rollback_without_pending_bytes_keeps_existing_content() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("transaction.log");
    std::fs::write(&path, "1\t2\ta\tb\n").unwrap();

    let mut sink = FileSink::open(&path, SyncPolicy::Fsync).unwrap();
    sink.rollback().await.unwrap();

    assert_eq!(std::fs::read_to_string(&path).unwrap(), "1\t2\ta\tb\n");
}
