//! The per-height routine shared by every run mode

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::height_locks::HeightLocks;
use super::retry_handler::RetryHandler;
use crate::domain::errors::IndexerError;
use crate::domain::models::{EraSequence, HeightRecords, RawHeight, ValidatorSessionSeq};
use crate::domain::services::sequence_builder::{self, BuiltSequences};
use crate::domain::services::system_event_detector::{self, DetectionContext};
use crate::domain::services::SyncableTracker;
use crate::domain::types::{Era, Height, PublicKey};
use crate::infrastructure::persistence::Store;
use crate::infrastructure::source::BlockSource;
use crate::utils::logging;

/// What a successfully committed height reports back to its run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeightOutcome {
    pub height: Height,
    pub time: DateTime<Utc>,

    /// Records dropped because they failed validation
    pub rejected: i64,
}

/// Fetches, builds and commits single heights
pub struct HeightProcessor {
    source: Arc<dyn BlockSource>,
    store: Arc<dyn Store>,
    syncables: SyncableTracker,
    locks: Arc<HeightLocks>,
    retry_handler: RetryHandler,
    missed_sessions_threshold: usize,
}

impl HeightProcessor {
    pub fn new(
        source: Arc<dyn BlockSource>,
        store: Arc<dyn Store>,
        locks: Arc<HeightLocks>,
        retry_handler: RetryHandler,
        missed_sessions_threshold: usize,
    ) -> Self {
        Self {
            syncables: SyncableTracker::new(store.clone()),
            source,
            store,
            locks,
            retry_handler,
            missed_sessions_threshold,
        }
    }

    /// Processes `height` for the run `report_id`.
    ///
    /// Holds the height lock for the whole routine, so two runs touching
    /// the same height never interleave their writes.
    pub async fn process(
        &self,
        height: Height,
        report_id: i64,
        index_version: i64,
        run_label: &str,
    ) -> Result<HeightOutcome, IndexerError> {
        let _guard = self.locks.lock(height).await;

        let raw = self
            .retry_handler
            .execute_with_retry_and_logging(
                || self.source.get_height(height),
                &format!("Fetch of height {}", height),
                run_label,
            )
            .await?;
        if raw.block.height != height {
            return Err(IndexerError::Validation(format!(
                "source returned height {} for {}",
                raw.block.height, height
            )));
        }

        let mut syncable = self
            .retry_handler
            .execute_with_retry_and_logging(
                || self.syncables.start(&raw.block, Some(report_id)),
                &format!("Start of height {}", height),
                run_label,
            )
            .await?;

        let era_bounds = self.era_bounds(&raw).await?;
        let built = sequence_builder::build(&raw, &era_bounds)?;
        sequence_builder::check_boundaries(&raw, &built)?;

        let context = self.detection_context(&raw, &built).await?;
        let system_events = system_event_detector::detect(&built, &context);

        let previous_sessions = self.previous_sessions(&built).await?;
        let observations = sequence_builder::observations(&built, &previous_sessions);

        SyncableTracker::mark_processed(&mut syncable, index_version)?;

        let block = built
            .block
            .clone()
            .ok_or_else(|| IndexerError::invariant(height, "no block record was built"))?;
        let time = block.sequence.time;
        let rejected = built.rejected;
        let records = HeightRecords {
            syncable,
            block,
            validators: built.validators,
            transactions: built.transactions,
            events: built.events,
            system_events,
            validator_eras: built.validator_eras,
            account_eras: built.account_eras,
            reward_eras: built.reward_eras,
            validator_sessions: built.validator_sessions,
            observations,
        };

        self.retry_handler
            .execute_with_retry_and_logging(
                || self.store.commit_height(records.clone()),
                &format!("Commit of height {}", height),
                run_label,
            )
            .await?;

        logging::log_debug(&format!(
            "[{}] Height {} committed ({} system events, {} rejected records)",
            run_label,
            height,
            records.system_events.len(),
            rejected
        ));

        Ok(HeightOutcome {
            height,
            time,
            rejected,
        })
    }

    /// Stored bounds of the past eras paid out at this height
    async fn era_bounds(&self, raw: &RawHeight) -> Result<HashMap<Era, EraSequence>, IndexerError> {
        let mut bounds = HashMap::new();
        for era in sequence_builder::payout_eras(raw) {
            if era == raw.block.era {
                continue;
            }
            if let Some(row) = self.store.validator_era_seqs(era).await?.into_iter().next() {
                bounds.insert(era, row.era_sequence);
            }
        }
        Ok(bounds)
    }

    async fn detection_context(
        &self,
        raw: &RawHeight,
        built: &BuiltSequences,
    ) -> Result<DetectionContext, IndexerError> {
        let block = &raw.block;
        let mut context = DetectionContext {
            missed_sessions_threshold: self.missed_sessions_threshold,
            ..Default::default()
        };

        if block.height > 0 {
            let previous = self.store.validator_seqs_at(block.height - 1).await?;
            if !previous.is_empty() {
                context.previous_validators = Some(previous);
            }
        }

        if block.last_in_era && block.era > 0 {
            context.previous_era_validators = self.store.validator_era_seqs(block.era - 1).await?;
            context.previous_era_accounts = self.store.account_era_seqs(block.era - 1).await?;
        }

        if block.last_in_session && self.missed_sessions_threshold > 1 {
            let limit = (self.missed_sessions_threshold - 1) as u64;
            for session in built.validator_sessions.iter().filter(|s| !s.online) {
                let earlier = self
                    .store
                    .recent_validator_session_seqs(&session.stash_account, block.session - 1, limit)
                    .await?;
                context
                    .recent_sessions
                    .insert(session.stash_account.clone(), earlier);
            }
        }

        Ok(context)
    }

    /// Session rows already stored for the sessions this height closes
    async fn previous_sessions(
        &self,
        built: &BuiltSequences,
    ) -> Result<HashMap<PublicKey, ValidatorSessionSeq>, IndexerError> {
        let mut previous = HashMap::new();
        for session in &built.validator_sessions {
            if let Some(stored) = self
                .store
                .validator_session_seq(session.session_sequence.session, &session.stash_account)
                .await?
            {
                previous.insert(session.stash_account.clone(), stored);
            }
        }
        Ok(previous)
    }
}
