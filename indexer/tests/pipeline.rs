mod common;

use common::{raw_height, test_config, Harness};
use staking_indexer::application::RunMode;
use staking_indexer::domain::errors::IndexerError;
use staking_indexer::domain::models::{ReportKind, RunState, SystemEventKind};
use staking_indexer::domain::types::Quantity;
use staking_indexer::infrastructure::persistence::Store;

#[tokio::test]
async fn index_run_skips_failed_height_and_resumes_after_good_prefix() {
    let harness = Harness::new(&test_config(100), 103);
    harness.source.fail_at(102);

    let report = harness.pipeline.run(RunMode::Index).await.unwrap().unwrap();
    assert_eq!(report.kind, ReportKind::Index);
    assert_eq!((report.start_height, report.end_height), (100, 103));
    assert_eq!(report.success_count, Some(3));
    assert_eq!(report.error_count, Some(1));
    assert_eq!(report.error_msg, None);
    assert_eq!(report.last_good_height, Some(101));
    assert_eq!(report.state(), RunState::Completed);

    let syncable = harness.store.get_syncable(103).await.unwrap().unwrap();
    assert!(syncable.is_completed());
    assert!(harness.store.get_syncable(102).await.unwrap().is_none());

    harness.source.heal(102);
    let next = harness.pipeline.run(RunMode::Index).await.unwrap().unwrap();
    assert_eq!((next.start_height, next.end_height), (102, 103));
    assert_eq!(next.success_count, Some(2));
    assert_eq!(next.last_good_height, Some(103));

    assert!(harness.pipeline.run(RunMode::Index).await.unwrap().is_none());
}

#[tokio::test]
async fn reindexing_a_range_twice_changes_nothing() {
    let harness = Harness::new(&test_config(1), 40);
    let mode = RunMode::SequentialReindex {
        start: 1,
        end: 20,
        index_version: 2,
    };

    harness.pipeline.run(mode).await.unwrap().unwrap();
    let once = harness.store.tables().await;
    let syncables = harness.store.syncables().await.len();

    let report = harness.pipeline.run(mode).await.unwrap().unwrap();
    assert_eq!(report.success_count, Some(20));
    assert_eq!(harness.store.tables().await, once);
    assert_eq!(harness.store.syncables().await.len(), syncables);

    let agg = harness.store.validator_agg(&common::key("V2")).await.unwrap().unwrap();
    assert_eq!(agg.aggregate.started_at_height, 1);
    assert_eq!(agg.aggregate.recent_at_height, 20);
    assert_eq!(agg.accumulated_uptime_count, 5);
}

#[tokio::test]
async fn sequential_and_parallel_reindex_converge() {
    let config = test_config(1);
    let sequential = Harness::new(&config, 60);
    let parallel = Harness::new(&config, 60);

    sequential
        .pipeline
        .run(RunMode::SequentialReindex {
            start: 1,
            end: 50,
            index_version: 1,
        })
        .await
        .unwrap()
        .unwrap();
    let report = parallel
        .pipeline
        .run(RunMode::ParallelReindex {
            start: 1,
            end: 50,
            index_version: 1,
        })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(report.kind, ReportKind::ParallelReindex);
    assert_eq!(report.success_count, Some(50));
    assert_eq!(report.last_good_height, Some(50));

    let a = sequential.store.tables().await;
    let b = parallel.store.tables().await;
    assert!(!a.validator_aggs.is_empty());
    assert_eq!(a.validator_aggs, b.validator_aggs);
    assert_eq!(a.summaries, b.summaries);
    assert_eq!(a.validator_eras, b.validator_eras);
    assert_eq!(a.validator_sessions, b.validator_sessions);
}

#[tokio::test]
async fn era_boundaries_produce_era_records_and_system_events() {
    let harness = Harness::new(&test_config(1), 30);
    harness
        .pipeline
        .run(RunMode::SequentialReindex {
            start: 1,
            end: 23,
            index_version: 1,
        })
        .await
        .unwrap()
        .unwrap();

    let era_one = harness.store.validator_era_seqs(1).await.unwrap();
    assert_eq!(era_one.len(), 3);
    assert!(era_one
        .iter()
        .all(|e| e.era_sequence.start_height == 8 && e.era_sequence.end_height == 15));

    let tables = harness.store.tables().await;
    let kinds: Vec<SystemEventKind> = tables.system_events.values().map(|e| e.kind).collect();
    assert!(kinds.contains(&SystemEventKind::JoinedActiveSet));
    assert!(kinds.contains(&SystemEventKind::LeftActiveSet));
    assert!(kinds.contains(&SystemEventKind::DelegationLeft));

    let rewards: Vec<_> = tables.reward_eras.values().collect();
    assert_eq!(rewards.len(), 4);
    assert!(rewards.iter().all(|r| r.validator_stash_account == common::key("V1")));
    let paid_era_zero: Vec<_> = rewards.iter().filter(|r| r.era_sequence.era == 0).collect();
    assert_eq!(paid_era_zero.len(), 2);
    assert!(paid_era_zero.iter().all(|r| r.era_sequence.end_height == 7));
    assert!(rewards.iter().any(|r| r.amount == Quantity::from(40i64)));

    assert!(!tables.summaries.is_empty());
}

#[tokio::test]
async fn incomplete_era_aborts_the_run() {
    let harness = Harness::new(&test_config(1), 20);
    let mut broken = raw_height(7);
    broken.validators[0].total_stake = Quantity::from(-1i64);
    harness.source.replace(broken);

    let report = harness
        .pipeline
        .run(RunMode::SequentialReindex {
            start: 1,
            end: 12,
            index_version: 1,
        })
        .await
        .unwrap()
        .unwrap();

    assert_eq!(report.state(), RunState::Failed);
    assert!(report.error_msg.as_deref().unwrap().contains("Invariant violated at height 7"));
    assert_eq!(report.success_count, Some(6));
    assert_eq!(report.last_good_height, Some(6));
    assert!(harness.store.get_syncable(8).await.unwrap().is_none());
}

#[tokio::test]
async fn storage_failure_after_retries_is_fatal() {
    let harness = Harness::new(&test_config(1), 10);
    harness.store.fail_commits_at(3).await;

    let report = harness
        .pipeline
        .run(RunMode::SequentialReindex {
            start: 1,
            end: 6,
            index_version: 1,
        })
        .await
        .unwrap()
        .unwrap();

    assert_eq!(report.state(), RunState::Failed);
    assert!(report.error_msg.as_deref().unwrap().contains("injected commit failure"));
    assert_eq!(report.success_count, Some(2));
    assert_eq!(report.error_count, Some(1));
    assert!(harness.store.get_syncable(4).await.unwrap().is_none());
}

#[tokio::test]
async fn cancellation_finishes_in_flight_height_and_records_report() {
    let harness = Harness::new(&test_config(1), 10);
    harness.source.cancel_after(3, harness.shutdown.clone());

    let report = harness
        .pipeline
        .run(RunMode::SequentialReindex {
            start: 1,
            end: 8,
            index_version: 1,
        })
        .await
        .unwrap()
        .unwrap();

    assert_eq!(report.error_msg.as_deref(), Some("run cancelled"));
    assert_eq!(report.success_count, Some(3));
    assert_eq!(report.error_count, Some(0));
    assert_eq!(report.last_good_height, Some(3));
    assert!(harness.store.get_syncable(3).await.unwrap().unwrap().is_completed());
    assert!(harness.store.get_syncable(4).await.unwrap().is_none());
}

#[tokio::test]
async fn invalid_ranges_are_rejected_before_any_report() {
    let harness = Harness::new(&test_config(5), 10);

    let below_floor = harness
        .pipeline
        .run(RunMode::SequentialReindex {
            start: 4,
            end: 8,
            index_version: 1,
        })
        .await;
    assert!(matches!(below_floor, Err(IndexerError::Validation(_))));

    let reversed = harness
        .pipeline
        .run(RunMode::ParallelReindex {
            start: 9,
            end: 6,
            index_version: 1,
        })
        .await;
    assert!(matches!(reversed, Err(IndexerError::Validation(_))));

    assert!(harness.store.reports().await.is_empty());
}

#[tokio::test]
async fn failed_reindex_keeps_previously_committed_heights_completed() {
    let harness = Harness::new(&test_config(1), 6);
    harness.pipeline.run(RunMode::Index).await.unwrap().unwrap();
    harness.store.fail_commits_at(3).await;

    let report = harness
        .pipeline
        .run(RunMode::SequentialReindex {
            start: 3,
            end: 4,
            index_version: 2,
        })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(report.state(), RunState::Failed);
    assert_eq!(report.success_count, Some(0));

    let syncable = harness.store.get_syncable(3).await.unwrap().unwrap();
    assert!(syncable.is_completed());
    assert_eq!(syncable.index_version, 1);
    assert_eq!(harness.store.max_processed_height().await.unwrap(), Some(6));
}
