//! Per-run audit records

use std::sync::Arc;

use chrono::Utc;

use crate::domain::errors::IndexerError;
use crate::domain::models::{Report, ReportKind};
use crate::domain::types::Height;
use crate::infrastructure::persistence::{DbError, Store};

/// Outcome counters accumulated over a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunTally {
    pub success_count: i64,
    pub error_count: i64,
    pub last_good_height: Option<Height>,
}

#[derive(Clone)]
pub struct ReportTracker {
    store: Arc<dyn Store>,
}

impl ReportTracker {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn begin(
        &self,
        kind: ReportKind,
        index_version: i64,
        start_height: Height,
        end_height: Height,
    ) -> Result<Report, DbError> {
        let mut report = Report::new(kind, index_version, start_height, end_height);
        report.id = self.store.create_report(&report).await?;
        Ok(report)
    }

    /// Finalizes the report. `error_msg` is set iff `err` is given.
    pub async fn complete(
        &self,
        report: &mut Report,
        tally: RunTally,
        err: Option<&IndexerError>,
    ) -> Result<(), IndexerError> {
        Self::finish(report, tally, err)?;
        self.store.save_report(report).await?;
        Ok(())
    }

    /// Fills in the completion fields without persisting them
    pub fn finish(
        report: &mut Report,
        tally: RunTally,
        err: Option<&IndexerError>,
    ) -> Result<(), IndexerError> {
        if report.is_completed() {
            return Err(IndexerError::Validation(format!(
                "report {} already completed",
                report.id
            )));
        }
        let now = Utc::now();
        report.success_count = Some(tally.success_count);
        report.error_count = Some(tally.error_count);
        report.last_good_height = tally.last_good_height;
        report.error_msg = err.map(|e| e.to_string());
        report.duration_ms = Some((now - report.created_at).num_milliseconds().max(0));
        report.completed_at = Some(now);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::RunState;
    use crate::infrastructure::persistence::MemoryStore;

    #[tokio::test]
    async fn successful_run_has_no_error_message() {
        let store = Arc::new(MemoryStore::new());
        let tracker = ReportTracker::new(store.clone());

        let mut report = tracker.begin(ReportKind::Index, 1, 10, 20).await.unwrap();
        assert_eq!(report.state(), RunState::Running);

        let tally = RunTally {
            success_count: 11,
            error_count: 0,
            last_good_height: Some(20),
        };
        tracker.complete(&mut report, tally, None).await.unwrap();

        let stored = store.get_report(report.id).await.unwrap().unwrap();
        assert_eq!(stored.state(), RunState::Completed);
        assert_eq!(stored.success_count, Some(11));
        assert_eq!(stored.error_msg, None);
        assert!(stored.duration_ms.is_some());
    }

    #[tokio::test]
    async fn failed_run_records_message_and_cannot_complete_twice() {
        let store = Arc::new(MemoryStore::new());
        let tracker = ReportTracker::new(store.clone());

        let mut report = tracker
            .begin(ReportKind::SequentialReindex, 2, 1, 5)
            .await
            .unwrap();
        let err = IndexerError::invariant(3, "incomplete era");
        tracker
            .complete(&mut report, RunTally::default(), Some(&err))
            .await
            .unwrap();
        assert_eq!(report.state(), RunState::Failed);
        assert!(report.error_msg.as_deref().unwrap().contains("incomplete era"));

        assert!(tracker
            .complete(&mut report, RunTally::default(), None)
            .await
            .is_err());
    }

    #[test]
    fn interrupted_run_keeps_its_start_as_resume_point() {
        let mut report = Report::new(ReportKind::Index, 1, 3500, 3600);
        report.id = 4;
        ReportTracker::finish(&mut report, RunTally::default(), Some(&IndexerError::Interrupted))
            .unwrap();
        assert_eq!(report.state(), RunState::Failed);
        assert_eq!(report.error_msg.as_deref(), Some("run interrupted before completion"));
        assert_eq!(report.resume_height(), 3500);
    }
}
