//! Run orchestration: range planning, batching, reports and summaries

mod height_locks;
mod height_processor;
mod retry_handler;

pub use height_locks::HeightLocks;
pub use height_processor::{HeightOutcome, HeightProcessor};
pub use retry_handler::{RetryHandler, Retryable};

use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use tokio::sync::watch;

use crate::config::IndexerConfig;
use crate::domain::errors::IndexerError;
use crate::domain::models::{Report, ReportKind, Summary, TimeInterval};
use crate::domain::services::summarizer::{self, PendingBuckets};
use crate::domain::services::{ReportTracker, RunTally};
use crate::domain::types::Height;
use crate::infrastructure::persistence::Store;
use crate::infrastructure::source::BlockSource;
use crate::utils::logging;

/// What a run processes and how
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Forward sync from the resume point to the chain head
    Index,
    /// Re-process an explicit range, one height at a time
    SequentialReindex {
        start: Height,
        end: Height,
        index_version: i64,
    },
    /// Re-process an explicit range with batches dispatched concurrently
    ParallelReindex {
        start: Height,
        end: Height,
        index_version: i64,
    },
}

impl RunMode {
    pub fn kind(&self) -> ReportKind {
        match self {
            RunMode::Index => ReportKind::Index,
            RunMode::SequentialReindex { .. } => ReportKind::SequentialReindex,
            RunMode::ParallelReindex { .. } => ReportKind::ParallelReindex,
        }
    }
}

type HeightResult = (Height, Result<HeightOutcome, IndexerError>);

/// Resolved range of one run
#[derive(Debug, Clone, Copy)]
struct RunPlan {
    start: Height,
    end: Height,
    index_version: i64,
}

/// Identity of a running run, handed to every height
struct RunInfo {
    report_id: i64,
    index_version: i64,
    label: String,
}

/// Drives runs of every mode through the shared per-height routine
pub struct Pipeline {
    config: IndexerConfig,
    source: Arc<dyn BlockSource>,
    store: Arc<dyn Store>,
    reports: ReportTracker,
    processor: HeightProcessor,
    retry_handler: RetryHandler,
    shutdown: watch::Receiver<bool>,
}

impl Pipeline {
    pub fn new(
        config: &IndexerConfig,
        source: Arc<dyn BlockSource>,
        store: Arc<dyn Store>,
        locks: Arc<HeightLocks>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let retry_handler =
            RetryHandler::with_config(config.max_retries, config.retry_base_delay_ms);
        Self {
            processor: HeightProcessor::new(
                source.clone(),
                store.clone(),
                locks,
                retry_handler.clone(),
                config.missed_sessions_threshold,
            ),
            reports: ReportTracker::new(store.clone()),
            config: config.clone(),
            source,
            store,
            retry_handler,
            shutdown,
        }
    }

    /// Executes one run and returns its completed report.
    ///
    /// Returns `Ok(None)` when an index run finds nothing new. Invalid
    /// ranges fail before any report is created; every other outcome,
    /// including aborts and cancellation, ends in a completed report.
    pub async fn run(&self, mode: RunMode) -> Result<Option<Report>, IndexerError> {
        let Some(plan) = self.plan(mode).await? else {
            return Ok(None);
        };

        let kind = mode.kind();
        let mut report = self
            .reports
            .begin(kind, plan.index_version, plan.start, plan.end)
            .await?;
        let run = RunInfo {
            report_id: report.id,
            index_version: plan.index_version,
            label: format!("{}#{}", kind.as_str(), report.id),
        };
        logging::log_info(&format!(
            "[{}] 🚀 Processing heights {}..={} (index version {})",
            run.label, plan.start, plan.end, plan.index_version
        ));

        let batches = batches(plan.start, plan.end, self.config.pipeline_batch_size);
        let (results, summary_err) = match mode {
            RunMode::ParallelReindex { .. } => self.run_parallel(batches, &run).await,
            RunMode::Index | RunMode::SequentialReindex { .. } => {
                self.run_sequential(batches, &run).await
            }
        };

        let (tally, run_err) = tally(results, plan.start);
        let err = run_err.or(summary_err);
        ReportTracker::finish(&mut report, tally, err.as_ref())?;
        self.save_report(&report, &run.label).await?;

        match &err {
            None => logging::log_info(&format!(
                "[{}] ✅ Run completed: {} succeeded, {} errors, resume at {}",
                run.label,
                tally.success_count,
                tally.error_count,
                report.resume_height()
            )),
            Some(e) => logging::log_error(&format!(
                "[{}] ❌ Run aborted: {} ({} succeeded, {} errors)",
                run.label, e, tally.success_count, tally.error_count
            )),
        }
        Ok(Some(report))
    }

    /// Fails every report a previous process left running.
    ///
    /// Such reports would otherwise count as in flight forever. Their resume
    /// point stays at their first height, so the next index run covers the
    /// interrupted range again.
    pub async fn recover_interrupted(&self) -> Result<usize, IndexerError> {
        let abandoned = self.store.in_flight_reports().await?;
        for mut report in abandoned.iter().cloned() {
            let label = format!("{}#{}", report.kind.as_str(), report.id);
            let interrupted = IndexerError::Interrupted;
            ReportTracker::finish(&mut report, RunTally::default(), Some(&interrupted))?;
            self.save_report(&report, &label).await?;
            logging::log_warning(&format!(
                "[{}] Marked as interrupted, heights {}..={} will be indexed again",
                label, report.start_height, report.end_height
            ));
        }
        Ok(abandoned.len())
    }

    async fn save_report(&self, report: &Report, label: &str) -> Result<(), IndexerError> {
        self.retry_handler
            .execute_with_retry_and_logging(
                || self.store.save_report(report),
                &format!("Save of report {}", report.id),
                label,
            )
            .await?;
        Ok(())
    }

    async fn plan(&self, mode: RunMode) -> Result<Option<RunPlan>, IndexerError> {
        let floor = self.config.first_block_height;
        match mode {
            RunMode::Index => {
                let resume = match self.store.last_completed_report(ReportKind::Index).await? {
                    Some(last) => last.resume_height(),
                    None => floor,
                }
                .max(floor);
                let head = self
                    .retry_handler
                    .execute_with_retry_and_logging(
                        || self.source.chain_head(),
                        "Chain head lookup",
                        ReportKind::Index.as_str(),
                    )
                    .await?;
                if resume > head {
                    logging::log_debug(&format!(
                        "[{}] Nothing to index: resume height {} is above chain head {}",
                        ReportKind::Index.as_str(),
                        resume,
                        head
                    ));
                    return Ok(None);
                }
                Ok(Some(RunPlan {
                    start: resume,
                    end: head,
                    index_version: self.config.index_version,
                }))
            }
            RunMode::SequentialReindex {
                start,
                end,
                index_version,
            }
            | RunMode::ParallelReindex {
                start,
                end,
                index_version,
            } => {
                if start > end {
                    return Err(IndexerError::Validation(format!(
                        "empty reindex range {}..={}",
                        start, end
                    )));
                }
                if start < floor {
                    return Err(IndexerError::Validation(format!(
                        "height {} is below the first block height {}",
                        start, floor
                    )));
                }
                Ok(Some(RunPlan {
                    start,
                    end,
                    index_version,
                }))
            }
        }
    }

    /// Batches one after another.
    ///
    /// Summary buckets are recomputed once the run has moved past them and
    /// the still open ones when the run ends.
    async fn run_sequential(
        &self,
        batches: Vec<RangeInclusive<Height>>,
        run: &RunInfo,
    ) -> (Vec<HeightResult>, Option<IndexerError>) {
        let abort = AtomicBool::new(false);
        let mut pending = PendingBuckets::new();
        let mut results = Vec::new();

        for batch in batches {
            let batch_results = self.run_batch(batch, run, &abort).await;
            pending.add(committed_times(&batch_results));
            results.extend(batch_results);

            if let Err(e) = self.refresh_summaries(pending.take_closed(), run).await {
                return (results, Some(e));
            }
            if abort.load(Ordering::SeqCst) {
                break;
            }
        }
        let summary_err = self.refresh_summaries(pending.take_all(), run).await.err();
        (results, summary_err)
    }

    /// Batches spread over at most `reindex_workers` concurrent workers,
    /// summaries refreshed once all of them are done
    async fn run_parallel(
        &self,
        batches: Vec<RangeInclusive<Height>>,
        run: &RunInfo,
    ) -> (Vec<HeightResult>, Option<IndexerError>) {
        let abort = AtomicBool::new(false);
        let workers = self.config.reindex_workers.min(batches.len()).max(1);
        logging::log_info(&format!(
            "[{}] Dispatching {} batches over {} workers",
            run.label,
            batches.len(),
            workers
        ));

        let results: Vec<HeightResult> = stream::iter(batches)
            .map(|batch| self.run_batch(batch, run, &abort))
            .buffer_unordered(workers)
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .flatten()
            .collect();

        let mut pending = PendingBuckets::new();
        pending.add(committed_times(&results));
        let summary_err = self.refresh_summaries(pending.take_all(), run).await.err();
        (results, summary_err)
    }

    /// Heights of one batch in ascending order.
    ///
    /// Stops at a fatal error or when `abort` is raised by another batch;
    /// a shutdown signal is recorded as a cancelled result for the height
    /// that was not started.
    async fn run_batch(
        &self,
        heights: RangeInclusive<Height>,
        run: &RunInfo,
        abort: &AtomicBool,
    ) -> Vec<HeightResult> {
        let mut results = Vec::new();
        for height in heights {
            if abort.load(Ordering::SeqCst) {
                break;
            }
            if *self.shutdown.borrow() {
                logging::log_warning(&format!(
                    "[{}] Shutdown requested, not starting height {}",
                    run.label, height
                ));
                abort.store(true, Ordering::SeqCst);
                results.push((height, Err(IndexerError::Cancelled)));
                break;
            }

            let result = self
                .processor
                .process(height, run.report_id, run.index_version, &run.label)
                .await;
            let fatal = match &result {
                Ok(_) => false,
                Err(e) if e.is_fatal() => {
                    logging::log_error(&format!(
                        "[{}] Height {} failed fatally: {}",
                        run.label, height, e
                    ));
                    abort.store(true, Ordering::SeqCst);
                    true
                }
                Err(e) => {
                    logging::log_warning(&format!(
                        "[{}] Height {} failed: {}",
                        run.label, height, e
                    ));
                    false
                }
            };
            results.push((height, result));
            if fatal {
                break;
            }
        }
        results
    }

    /// Recomputes the given hour and day buckets from their stored rows
    async fn refresh_summaries(
        &self,
        buckets: Vec<(TimeInterval, DateTime<Utc>)>,
        run: &RunInfo,
    ) -> Result<(), IndexerError> {
        for (interval, bucket) in buckets {
            let summary = Summary::new(run.index_version, interval, bucket);
            let to = summary.bucket_end();
            let blocks = self.store.block_seqs_between(bucket, to).await?;
            let validators = self.store.validator_seqs_between(bucket, to).await?;
            let sessions = self.store.validator_session_seqs_between(bucket, to).await?;

            let set = summarizer::summarize(&summary, &blocks, &validators, &sessions);
            self.retry_handler
                .execute_with_retry_and_logging(
                    || self.store.replace_summaries(set.clone()),
                    &format!("Summary refresh of {} {}", interval.as_str(), bucket),
                    &run.label,
                )
                .await?;
        }
        Ok(())
    }
}

/// Block times of the heights that committed
fn committed_times(results: &[HeightResult]) -> Vec<DateTime<Utc>> {
    results
        .iter()
        .filter_map(|(_, r)| r.as_ref().ok().map(|o| o.time))
        .collect()
}

/// Splits `start..=end` into consecutive ranges of `size` heights
fn batches(start: Height, end: Height, size: u64) -> Vec<RangeInclusive<Height>> {
    let size = size.max(1) as i64;
    let mut batches = Vec::new();
    let mut from = start;
    while from <= end {
        let to = from.saturating_add(size - 1).min(end);
        batches.push(from..=to);
        from = to + 1;
    }
    batches
}

/// Folds height results into counters and the error that ended the run.
///
/// `last_good_height` is the end of the unbroken run of successes starting
/// at `start`; rejected records count as errors of a successful height.
fn tally(mut results: Vec<HeightResult>, start: Height) -> (RunTally, Option<IndexerError>) {
    results.sort_by_key(|(height, _)| *height);

    let mut tally = RunTally::default();
    let mut run_err = None;
    let mut next_good = Some(start);

    for (height, result) in results {
        match result {
            Ok(outcome) => {
                tally.success_count += 1;
                tally.error_count += outcome.rejected;
                if next_good == Some(height) {
                    tally.last_good_height = Some(height);
                    next_good = Some(height + 1);
                }
            }
            Err(e) => {
                next_good = None;
                if !matches!(e, IndexerError::Cancelled) {
                    tally.error_count += 1;
                }
                if e.is_fatal() && run_err.is_none() {
                    run_err = Some(e);
                }
            }
        }
    }
    (tally, run_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ok(height: Height) -> HeightResult {
        (
            height,
            Ok(HeightOutcome {
                height,
                time: Utc.timestamp_opt(1_600_000_000 + height, 0).unwrap(),
                rejected: 0,
            }),
        )
    }

    #[test]
    fn batches_cover_the_range_in_order() {
        assert_eq!(batches(100, 103, 2), vec![100..=101, 102..=103]);
        assert_eq!(batches(1, 5, 2), vec![1..=2, 3..=4, 5..=5]);
        assert_eq!(batches(7, 7, 10), vec![7..=7]);
        assert!(batches(8, 7, 2).is_empty());
    }

    #[test]
    fn failed_height_stops_the_good_prefix() {
        let results = vec![
            ok(103),
            ok(100),
            (102, Err(IndexerError::Validation("bad block".into()))),
            ok(101),
        ];
        let (tally, err) = tally(results, 100);
        assert_eq!(tally.success_count, 3);
        assert_eq!(tally.error_count, 1);
        assert_eq!(tally.last_good_height, Some(101));
        assert!(err.is_none());
    }

    #[test]
    fn cancellation_is_reported_but_not_counted() {
        let results = vec![ok(5), (6, Err(IndexerError::Cancelled))];
        let (tally, err) = tally(results, 5);
        assert_eq!(tally.success_count, 1);
        assert_eq!(tally.error_count, 0);
        assert_eq!(tally.last_good_height, Some(5));
        assert!(matches!(err, Some(IndexerError::Cancelled)));
    }

    #[test]
    fn rejected_records_count_as_errors() {
        let (height, mut result) = ok(9);
        if let Ok(outcome) = result.as_mut() {
            outcome.rejected = 2;
        }
        let (tally, _) = tally(vec![(height, result)], 9);
        assert_eq!(tally.success_count, 1);
        assert_eq!(tally.error_count, 2);
    }
}
