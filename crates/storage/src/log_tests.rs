// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::config::SyncPolicy;
use crate::sink::FakeSink;
use std::io::Cursor;
use tempfile::TempDir;

fn log_from(content: &str) -> (TransactionLog<FakeSink>, FakeSink) {
    let sink = FakeSink::new();
    let log = TransactionLog::from_parts(
        Cursor::new(content.as_bytes().to_vec()),
        sink.clone(),
        LogConfig::default(),
    );
    (log, sink)
}

#[test]
fn opened_log_starts_at_zero() {
    let (log, _sink) = log_from("");
    assert_eq!(log.state(), LogState::Opened);
    assert_eq!(log.last_sequence(), 0);
}

#[test]
fn put_then_delete_replays_to_empty_store() {
    let (mut log, _sink) = log_from("1\t2\tx\t42\n2\t1\tx\t\n");
    let store = Store::new();

    let applied = log.recover_into(&store).unwrap();

    assert_eq!(applied, 2);
    assert!(store.is_empty());
    assert_eq!(log.state(), LogState::Recovered);
    assert_eq!(log.last_sequence(), 2);
}

#[test]
fn replay_yields_events_in_record_order() {
    let (mut log, _sink) = log_from("1\t2\trob\tv1\n2\t2\trob\tv2\n");
    let events: Vec<_> = log.replay().collect::<Result<_, _>>().unwrap();

    assert_eq!(
        events,
        vec![Event::put(1, "rob", "v1"), Event::put(2, "rob", "v2")]
    );
}

#[test]
fn out_of_order_record_aborts_without_applying_the_rest() {
    let (mut log, _sink) = log_from("1\t2\ta\t1\n2\t2\tb\t2\n2\t2\tc\t3\n3\t2\td\t4\n");
    let store = Store::new();

    let err = log.recover_into(&store).unwrap_err();

    assert!(matches!(
        err,
        RecoveryError::OutOfOrder {
            line: 3,
            sequence: 2,
            previous: 2
        }
    ));
    assert_eq!(log.state(), LogState::Corrupt);
    assert_eq!(log.last_sequence(), 2);
    assert!(store.get("c").is_err());
    assert!(store.get("d").is_err());
}

#[test]
fn malformed_record_marks_log_corrupt() {
    let (mut log, _sink) = log_from("1\t2\ta\t1\ngarbage\n");
    let store = Store::new();

    assert!(matches!(
        log.recover_into(&store),
        Err(RecoveryError::Malformed { line: 2, .. })
    ));
    assert_eq!(log.state(), LogState::Corrupt);
}

#[test]
fn replay_cannot_be_restarted() {
    let (mut log, _sink) = log_from("1\t2\ta\t1\n");
    assert_eq!(log.replay().count(), 1);

    let mut again = log.replay();
    assert!(matches!(
        again.next(),
        Some(Err(RecoveryError::AlreadyReplayed))
    ));
    assert!(again.next().is_none());
}

#[test]
fn abandoned_replay_leaves_log_replaying() {
    let (mut log, _sink) = log_from("1\t2\ta\t1\n2\t2\tb\t2\n");
    {
        let mut replay = log.replay();
        assert!(replay.next().is_some());
    }
    assert_eq!(log.state(), LogState::Replaying);
    assert_eq!(log.last_sequence(), 1);
}

#[tokio::test]
async fn run_requires_complete_replay() {
    let (log, _sink) = log_from("");
    assert!(matches!(log.run(), Err(LogError::NotRecovered)));

    let (mut log, _sink) = log_from("1\t2\ta\t1\n2\t2\tb\t2\n");
    log.replay().next();
    assert!(matches!(log.run(), Err(LogError::NotRecovered)));

    let (mut log, _sink) = log_from("2\t2\ta\t1\n1\t2\tb\t2\n");
    let _ = log.recover_into(&Store::new());
    assert!(matches!(log.run(), Err(LogError::NotRecovered)));
}

#[tokio::test]
async fn armed_log_continues_after_replayed_sequence() {
    let (mut log, sink) = log_from("1\t2\ta\t1\n7\t2\tb\t2\n");
    log.recover_into(&Store::new()).unwrap();

    let (armed, _errors) = log.run().unwrap();
    armed.writer().write_put("c", "3").await.unwrap();
    assert_eq!(armed.shutdown().await.unwrap(), 8);

    assert!(sink.records()[0].starts_with("8\t2\tc\t3\t"));
}

#[tokio::test]
async fn shutdown_is_idempotent_and_closes_writer() {
    let (mut log, _sink) = log_from("");
    log.recover_into(&Store::new()).unwrap();
    let (armed, _errors) = log.run().unwrap();

    armed.writer().write_put("a", "1").await.unwrap();
    assert_eq!(armed.shutdown().await.unwrap(), 1);
    assert_eq!(armed.shutdown().await.unwrap(), 1);

    assert!(matches!(
        armed.writer().write_delete("a").await,
        Err(LogError::Closed)
    ));
}

#[tokio::test]
async fn concurrent_shutdowns_both_wait_for_the_drain() {
    let (mut log, sink) = log_from("");
    log.recover_into(&Store::new()).unwrap();
    let (armed, _errors) = log.run().unwrap();

    sink.pause();
    armed.writer().write_put("a", "1").await.unwrap();
    armed.writer().write_put("b", "2").await.unwrap();

    let (armed, sink) = (&armed, &sink);
    let shutdown = || async move {
        let last_sequence = armed.shutdown().await.unwrap();
        (last_sequence, sink.records().len())
    };
    let (first, second, ()) = tokio::join!(shutdown(), shutdown(), async {
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        sink.resume();
    });

    assert_eq!(first, (2, 2));
    assert_eq!(second, (2, 2));
}

#[tokio::test]
async fn file_log_round_trip_across_restarts() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("data").join("transaction.log");

    {
        let mut log = TransactionLog::open(&path, LogConfig::default()).unwrap();
        assert_eq!(log.recover_into(&Store::new()).unwrap(), 0);
        let (armed, _errors) = log.run().unwrap();

        let writer = armed.writer();
        writer.write_put("rob", "v1").await.unwrap();
        writer.write_put("rob", "v2").await.unwrap();
        writer.write_put("x", "42").await.unwrap();
        writer.write_delete("x").await.unwrap();
        armed.shutdown().await.unwrap();
    }

    let mut log = TransactionLog::open(&path, LogConfig::default()).unwrap();
    let store = Store::new();
    assert_eq!(log.recover_into(&store).unwrap(), 4);
    assert_eq!(log.last_sequence(), 4);
    assert_eq!(store.get("rob").unwrap(), "v2");
    assert!(store.get("x").is_err());
}

#[tokio::test]
async fn baseline_records_and_checksummed_records_mix() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("transaction.log");
    std::fs::write(&path, "1\t2\told\tformat\n").unwrap();

    {
        let mut log = TransactionLog::open(&path, LogConfig::default()).unwrap();
        log.recover_into(&Store::new()).unwrap();
        let (armed, _errors) = log.run().unwrap();
        armed.writer().write_put("new", "format").await.unwrap();
        armed.shutdown().await.unwrap();
    }

    let mut log = TransactionLog::open(&path, LogConfig::default()).unwrap();
    let store = Store::new();
    log.recover_into(&store).unwrap();
    assert_eq!(store.get("old").unwrap(), "format");
    assert_eq!(store.get("new").unwrap(), "format");
}

/// Writes only the first half of its first record, then fails
struct TornOnceSink {
    inner: FileSink,
    torn: bool,
}

#[async_trait::async_trait]
impl EventSink for TornOnceSink {
    async fn append(&mut self, record: &[u8]) -> std::io::Result<()> {
        if !self.torn {
            self.torn = true;
            self.inner.append(&record[..record.len() / 2]).await?;
            return Err(std::io::Error::other("disk full"));
        }
        self.inner.append(record).await
    }

    async fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush().await
    }

    async fn rollback(&mut self) -> std::io::Result<()> {
        self.inner.rollback().await
    }
}

#[tokio::test]
async fn partial_append_does_not_corrupt_later_records() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("transaction.log");
    std::fs::write(&path, "1\t2\told\tv\n").unwrap();

    {
        let sink = TornOnceSink {
            inner: FileSink::open(&path, SyncPolicy::Flush).unwrap(),
            torn: false,
        };
        let mut log = TransactionLog::from_parts(
            std::io::BufReader::new(std::fs::File::open(&path).unwrap()),
            sink,
            LogConfig::default(),
        );
        log.recover_into(&Store::new()).unwrap();
        let (armed, mut errors) = log.run().unwrap();

        armed.writer().write_put("a", "first").await.unwrap();
        armed.writer().write_put("b", "durable").await.unwrap();
        assert_eq!(armed.shutdown().await.unwrap(), 3);

        assert_eq!(errors.recv().await.unwrap().sequence, 2);
        assert!(errors.recv().await.is_none());
    }

    let mut log = TransactionLog::open(&path, LogConfig::default()).unwrap();
    let store = Store::new();
    assert_eq!(log.recover_into(&store).unwrap(), 2);
    assert_eq!(log.last_sequence(), 3);
    assert_eq!(store.get("old").unwrap(), "v");
    assert_eq!(store.get("b").unwrap(), "durable");
    assert!(store.get("a").is_err());
}
