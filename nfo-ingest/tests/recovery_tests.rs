//! Failure handling and compensation
//!
//! Relocation failures roll back the registration, store faults leave files
//! in place, worker faults only cost the offending file.

mod helpers;

use helpers::{nfe_xml, PanickingExtractor, TestEnv};
use nfo_ingest::models::{FileOutcome, QuarantineReason};
use nfo_ingest::services::BatchScheduler;
use std::sync::Arc;

const KEY_A: &str = "35240312345678000199550010000000011000000011";
const KEY_B: &str = "35240312345678000199550010000000021000000022";
const CNPJ: &str = "12345678000199";

#[tokio::test]
async fn test_relocation_failure_rolls_back_and_allows_retry() {
    let env = TestEnv::new().await;
    let worker = env.worker();

    // A plain file where the issuer folder should go makes the move fail
    let blocker = env.destination.join("ACME - 12345678000199");
    std::fs::write(&blocker, "in the way").unwrap();

    let content = nfe_xml(KEY_A, CNPJ, "Acme", "55", "2024-03-07");
    let source = env.deposit("a.xml", &content);
    let outcome = worker.process(&source).await;

    assert_eq!(outcome, FileOutcome::Quarantined(QuarantineReason::MoveFailure));
    assert!(env.store.find_by_access_key(KEY_A).await.unwrap().is_none());
    assert!(env.dedup.is_empty());
    assert_eq!(
        env.quarantined("move_failure"),
        vec![env.quarantine.join("move_failure/a.xml")]
    );

    // Operator clears the obstacle and re-deposits the file
    std::fs::remove_file(&blocker).unwrap();
    let retried = env.deposit("a.xml", &content);
    let outcome = worker.process(&retried).await;

    assert!(outcome.is_success());
    assert!(env.store.find_by_access_key(KEY_A).await.unwrap().is_some());
}

#[tokio::test]
async fn test_store_fault_defers_without_touching_file() {
    let env = TestEnv::new().await;
    let worker = env.worker();

    let source = env.deposit("a.xml", &nfe_xml(KEY_A, CNPJ, "Acme", "55", "2024-03-07"));
    env.pool.close().await;

    let outcome = worker.process(&source).await;

    assert!(matches!(outcome, FileOutcome::Deferred(_)));
    assert!(outcome.is_error());
    assert!(source.exists());
    assert!(TestEnv::files_under(&env.quarantine).is_empty());
    assert!(env.organized_files().is_empty());
    assert!(env.dedup.is_empty());
}

#[tokio::test]
async fn test_deferred_files_flag_cycle_as_store_faulted() {
    let env = TestEnv::new().await;
    let scheduler = env.scheduler(2, 10);

    let files = vec![
        env.deposit("a.xml", &nfe_xml(KEY_A, CNPJ, "Acme", "55", "2024-03-07")),
        env.deposit("b.xml", &nfe_xml(KEY_B, CNPJ, "Acme", "55", "2024-03-07")),
    ];
    env.pool.close().await;

    let stats = scheduler
        .run_cycle(files.clone(), &tokio_util::sync::CancellationToken::new())
        .await;

    assert!(stats.store_faulted());
    assert_eq!(stats.totals.deferred, 2);
    assert_eq!(stats.totals.errors, 2);
    assert!(files.iter().all(|f| f.exists()));
}

#[tokio::test]
async fn test_worker_fault_isolated_to_its_file() {
    let env = TestEnv::new().await;
    let worker = env.worker_with(Arc::new(PanickingExtractor {
        trigger: "poison".to_string(),
    }));
    let scheduler = BatchScheduler::new(Arc::new(worker), 4, 10);

    let files = vec![
        env.deposit("good_a.xml", &nfe_xml(KEY_A, CNPJ, "Acme", "55", "2024-03-07")),
        env.deposit("poison.xml", &nfe_xml(&format!("{:044}", 9), CNPJ, "Acme", "55", "2024-03-07")),
        env.deposit("good_b.xml", &nfe_xml(KEY_B, CNPJ, "Acme", "55", "2024-03-07")),
    ];

    let outcomes = scheduler.run_batch(files).await;

    assert_eq!(outcomes.iter().filter(|o| o.is_success()).count(), 2);
    assert!(outcomes.contains(&FileOutcome::Quarantined(QuarantineReason::Unexpected)));
    assert_eq!(
        env.quarantined("unexpected"),
        vec![env.quarantine.join("unexpected/poison.xml")]
    );
    assert_eq!(env.store.count_invoices().await.unwrap(), 2);
}

#[tokio::test]
async fn test_vanished_file_is_read_error() {
    let env = TestEnv::new().await;
    let worker = env.worker();

    let outcome = worker.process(&env.source.join("gone.xml")).await;

    // Nothing reached the quarantine area, and the outcome says so
    assert_eq!(outcome, FileOutcome::QuarantineFailed(QuarantineReason::ReadError));
    assert!(outcome.is_error());
    assert!(env.quarantined("read_error").is_empty());
    assert_eq!(env.store.count_invoices().await.unwrap(), 0);
}

#[tokio::test]
async fn test_vanished_file_counted_as_quarantine_failure() {
    let env = TestEnv::new().await;
    let scheduler = env.scheduler(2, 10);

    let files = vec![
        env.deposit("a.xml", &nfe_xml(KEY_A, CNPJ, "Acme", "55", "2024-03-07")),
        env.source.join("gone.xml"),
    ];

    let stats = scheduler
        .run_cycle(files, &tokio_util::sync::CancellationToken::new())
        .await;

    assert_eq!(stats.totals.succeeded, 1);
    assert_eq!(stats.totals.errors, 1);
    assert_eq!(stats.totals.quarantine_failed, 1);
    assert!(!stats.store_faulted());
}

#[tokio::test]
async fn test_failed_rollback_still_quarantines_and_evicts() {
    let env = TestEnv::new().await;
    let scheduler = env.scheduler(2, 10);

    let blocker = env.destination.join("ACME - 12345678000199");
    std::fs::write(&blocker, "in the way").unwrap();
    sqlx::query(
        "CREATE TRIGGER block_invoice_delete BEFORE DELETE ON invoices \
         BEGIN SELECT RAISE(ABORT, 'deletes disabled'); END",
    )
    .execute(&env.pool)
    .await
    .unwrap();

    let files = vec![
        env.deposit("a.xml", &nfe_xml(KEY_A, CNPJ, "Acme", "55", "2024-03-07")),
        env.deposit("b.xml", &nfe_xml(KEY_B, "98765432000110", "Beta", "55", "2024-03-07")),
    ];

    let outcomes = scheduler.run_batch(files).await;

    assert!(outcomes.contains(&FileOutcome::Quarantined(QuarantineReason::MoveFailure)));
    assert_eq!(outcomes.iter().filter(|o| o.is_success()).count(), 1);
    assert_eq!(
        env.quarantined("move_failure"),
        vec![env.quarantine.join("move_failure/a.xml")]
    );

    // The row survives the failed delete, the index entry does not
    assert!(env.store.find_by_access_key(KEY_A).await.unwrap().is_some());
    assert!(!env.dedup.contains_key(KEY_A));
    assert!(env.dedup.contains_key(KEY_B));
    assert_eq!(env.dedup.len(), (1, 1));
}
