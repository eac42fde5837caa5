//! Event scanner against an in-memory source chain

mod common;

use alloy::primitives::B256;
use alloy::sol_types::SolEvent;

use common::*;
use relayer::contracts::TokensLocked;
use relayer::scanner::{EventScanner, ScanOutcome};
use relayer::types::BlockRange;

fn range(from: u64, to: u64) -> BlockRange {
    BlockRange::new(from, to).unwrap()
}

#[tokio::test]
async fn test_events_sorted_by_block_then_log_index() {
    let source = FakeChain::new(1, 1000);
    source.with(|s| {
        s.logs.push(lock_log(560, 1, tx_hash(4), 1));
        s.logs.push(lock_log(550, 7, tx_hash(2), 1));
        s.logs.push(lock_log(560, 0, tx_hash(3), 1));
        s.logs.push(lock_log(550, 2, tx_hash(1), 1));
    });
    let scanner = EventScanner::new(source.clone(), SOURCE_CONTRACT);

    let outcome = scanner
        .scan(range(501, 600), TokensLocked::SIGNATURE_HASH)
        .await
        .unwrap();

    let hashes: Vec<B256> = outcome.events().iter().map(|e| e.source_tx_hash).collect();
    assert_eq!(hashes, vec![tx_hash(1), tx_hash(2), tx_hash(3), tx_hash(4)]);
}

#[tokio::test]
async fn test_empty_range_is_found_not_rejected() {
    let source = FakeChain::new(1, 1000);
    let scanner = EventScanner::new(source.clone(), SOURCE_CONTRACT);

    let outcome = scanner
        .scan(range(501, 600), TokensLocked::SIGNATURE_HASH)
        .await
        .unwrap();
    assert_eq!(outcome, ScanOutcome::Found(vec![]));
}

#[tokio::test]
async fn test_rejected_range_is_reported() {
    let source = FakeChain::new(1, 1000);
    source.with(|s| s.reject_all = true);
    let scanner = EventScanner::new(source.clone(), SOURCE_CONTRACT);

    let outcome = scanner
        .scan(range(601, 700), TokensLocked::SIGNATURE_HASH)
        .await
        .unwrap();
    assert!(matches!(outcome, ScanOutcome::RangeRejected { .. }));
    assert!(outcome.events().is_empty());
}

#[tokio::test]
async fn test_node_error_escalates() {
    let source = FakeChain::new(1, 1000);
    source.with(|s| s.fail_logs = true);
    let scanner = EventScanner::new(source.clone(), SOURCE_CONTRACT);

    let result = scanner
        .scan(range(601, 700), TokensLocked::SIGNATURE_HASH)
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_malformed_and_removed_logs_are_skipped() {
    let source = FakeChain::new(1, 1000);
    source.with(|s| {
        s.logs.push(malformed_log(510, 0, tx_hash(1)));
        let mut removed = lock_log(520, 0, tx_hash(2), 1);
        removed.removed = true;
        s.logs.push(removed);
        s.logs.push(lock_log(530, 0, tx_hash(3), 1));
        // Same log delivered twice
        s.logs.push(lock_log(530, 0, tx_hash(3), 1));
    });
    let scanner = EventScanner::new(source.clone(), SOURCE_CONTRACT);

    let outcome = scanner
        .scan(range(501, 600), TokensLocked::SIGNATURE_HASH)
        .await
        .unwrap();
    let events = outcome.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].source_tx_hash, tx_hash(3));
    assert_eq!(events[0].block_number, 530);
    assert_eq!(events[0].recipient, RECIPIENT);
}
