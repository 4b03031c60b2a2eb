//! In-process store used by the test suite and for dry runs

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::domain::models::{
    AccountEraSeq, BlockSeq, EventSeq, HeightRecords, Report, ReportKind, RewardEraSeq, RewardKind,
    SummarySet, Syncable, SystemEvent, SystemEventKind, TimeInterval, TransactionSeq, ValidatorAgg,
    ValidatorEraSeq, ValidatorSeq, ValidatorSessionSeq,
};
use crate::domain::types::{Era, Height, PublicKey, Session};
use crate::infrastructure::persistence::error::DbError;
use crate::infrastructure::persistence::store::Store;

/// Derived tables, keyed by each record's natural key
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tables {
    pub blocks: BTreeMap<Height, BlockSeq>,
    pub validators: BTreeMap<(Height, String), ValidatorSeq>,
    pub transactions: BTreeMap<(Height, i64), TransactionSeq>,
    pub events: BTreeMap<(Height, i64), EventSeq>,
    pub system_events: BTreeMap<(Height, String, SystemEventKind), SystemEvent>,
    pub validator_eras: BTreeMap<(Era, String), ValidatorEraSeq>,
    pub account_eras: BTreeMap<(Era, String, String), AccountEraSeq>,
    pub reward_eras: BTreeMap<(Era, String, String, RewardKind), RewardEraSeq>,
    pub validator_sessions: BTreeMap<(Session, String), ValidatorSessionSeq>,
    pub validator_aggs: BTreeMap<String, ValidatorAgg>,
    pub summaries: BTreeMap<(TimeInterval, DateTime<Utc>), SummarySet>,
}

#[derive(Debug, Default)]
struct State {
    tables: Tables,
    syncables: BTreeMap<Height, Syncable>,
    reports: BTreeMap<i64, Report>,
    next_report_id: i64,
    failing_commits: HashSet<Height>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every derived table
    pub async fn tables(&self) -> Tables {
        self.state.read().await.tables.clone()
    }

    pub async fn syncables(&self) -> Vec<Syncable> {
        self.state.read().await.syncables.values().cloned().collect()
    }

    pub async fn reports(&self) -> Vec<Report> {
        self.state.read().await.reports.values().cloned().collect()
    }

    /// Makes every commit of `height` fail with a storage error
    pub async fn fail_commits_at(&self, height: Height) {
        self.state.write().await.failing_commits.insert(height);
    }
}

fn upsert<K: Ord, V>(map: &mut BTreeMap<K, V>, key: K, value: V, update: impl FnOnce(&mut V, V)) {
    match map.get_mut(&key) {
        Some(existing) => update(existing, value),
        None => {
            map.insert(key, value);
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn save_syncable(&self, syncable: &Syncable) -> Result<(), DbError> {
        let mut state = self.state.write().await;
        state.syncables.insert(syncable.height, syncable.clone());
        Ok(())
    }

    async fn get_syncable(&self, height: Height) -> Result<Option<Syncable>, DbError> {
        Ok(self.state.read().await.syncables.get(&height).cloned())
    }

    async fn max_processed_height(&self) -> Result<Option<Height>, DbError> {
        let state = self.state.read().await;
        Ok(state
            .syncables
            .values()
            .filter(|s| s.is_completed())
            .map(|s| s.height)
            .max())
    }

    async fn delete_syncables_up_to(&self, height: Height) -> Result<u64, DbError> {
        let mut state = self.state.write().await;
        let before = state.syncables.len();
        state.syncables.retain(|h, _| *h > height);
        Ok((before - state.syncables.len()) as u64)
    }

    async fn create_report(&self, report: &Report) -> Result<i64, DbError> {
        let mut state = self.state.write().await;
        state.next_report_id += 1;
        let id = state.next_report_id;
        let mut stored = report.clone();
        stored.id = id;
        state.reports.insert(id, stored);
        Ok(id)
    }

    async fn save_report(&self, report: &Report) -> Result<(), DbError> {
        let mut state = self.state.write().await;
        if !state.reports.contains_key(&report.id) {
            return Err(DbError::QueryError(format!("report {} not found", report.id)));
        }
        state.reports.insert(report.id, report.clone());
        Ok(())
    }

    async fn get_report(&self, id: i64) -> Result<Option<Report>, DbError> {
        Ok(self.state.read().await.reports.get(&id).cloned())
    }

    async fn last_completed_report(&self, kind: ReportKind) -> Result<Option<Report>, DbError> {
        let state = self.state.read().await;
        Ok(state
            .reports
            .values()
            .rev()
            .find(|r| r.kind == kind && r.is_completed())
            .cloned())
    }

    async fn in_flight_reports(&self) -> Result<Vec<Report>, DbError> {
        let state = self.state.read().await;
        Ok(state
            .reports
            .values()
            .filter(|r| !r.is_completed())
            .cloned()
            .collect())
    }

    async fn commit_height(&self, records: HeightRecords) -> Result<(), DbError> {
        let mut state = self.state.write().await;
        let height = records.height();
        if state.failing_commits.contains(&height) {
            return Err(DbError::Other(format!("injected commit failure at {}", height)));
        }

        let tables = &mut state.tables;

        tables.blocks.insert(height, records.block);

        tables.validators.retain(|k, _| k.0 != height);
        for seq in records.validators {
            tables
                .validators
                .insert((height, seq.stash_account.0.clone()), seq);
        }
        tables.transactions.retain(|k, _| k.0 != height);
        for seq in records.transactions {
            tables.transactions.insert((height, seq.index), seq);
        }
        tables.events.retain(|k, _| k.0 != height);
        for seq in records.events {
            tables.events.insert((height, seq.index), seq);
        }
        tables.system_events.retain(|k, _| k.0 != height);
        for event in records.system_events {
            tables
                .system_events
                .insert((height, event.actor.0.clone(), event.kind), event);
        }

        for seq in records.validator_eras {
            let key = (seq.era_sequence.era, seq.stash_account.0.clone());
            upsert(&mut tables.validator_eras, key, seq, ValidatorEraSeq::update);
        }
        for seq in records.account_eras {
            let key = (
                seq.era_sequence.era,
                seq.validator_stash_account.0.clone(),
                seq.stash_account.0.clone(),
            );
            upsert(&mut tables.account_eras, key, seq, AccountEraSeq::update);
        }
        for seq in records.reward_eras {
            let key = (
                seq.era_sequence.era,
                seq.validator_stash_account.0.clone(),
                seq.stash_account.0.clone(),
                seq.kind,
            );
            upsert(&mut tables.reward_eras, key, seq, RewardEraSeq::update);
        }
        for seq in records.validator_sessions {
            let key = (seq.session_sequence.session, seq.stash_account.0.clone());
            upsert(&mut tables.validator_sessions, key, seq, ValidatorSessionSeq::update);
        }

        for observation in &records.observations {
            tables
                .validator_aggs
                .entry(observation.stash_account.0.clone())
                .and_modify(|agg| agg.update(observation))
                .or_insert_with(|| ValidatorAgg::from_observation(observation));
        }

        state.syncables.insert(height, records.syncable);
        Ok(())
    }

    async fn validator_seqs_at(&self, height: Height) -> Result<Vec<ValidatorSeq>, DbError> {
        let state = self.state.read().await;
        Ok(state
            .tables
            .validators
            .iter()
            .filter(|(k, _)| k.0 == height)
            .map(|(_, v)| v.clone())
            .collect())
    }

    async fn validator_era_seqs(&self, era: Era) -> Result<Vec<ValidatorEraSeq>, DbError> {
        let state = self.state.read().await;
        Ok(state
            .tables
            .validator_eras
            .iter()
            .filter(|(k, _)| k.0 == era)
            .map(|(_, v)| v.clone())
            .collect())
    }

    async fn account_era_seqs(&self, era: Era) -> Result<Vec<AccountEraSeq>, DbError> {
        let state = self.state.read().await;
        Ok(state
            .tables
            .account_eras
            .iter()
            .filter(|(k, _)| k.0 == era)
            .map(|(_, v)| v.clone())
            .collect())
    }

    async fn validator_session_seq(
        &self,
        session: Session,
        stash: &PublicKey,
    ) -> Result<Option<ValidatorSessionSeq>, DbError> {
        let state = self.state.read().await;
        Ok(state
            .tables
            .validator_sessions
            .get(&(session, stash.0.clone()))
            .cloned())
    }

    async fn recent_validator_session_seqs(
        &self,
        stash: &PublicKey,
        session: Session,
        limit: u64,
    ) -> Result<Vec<ValidatorSessionSeq>, DbError> {
        let state = self.state.read().await;
        let mut rows: Vec<ValidatorSessionSeq> = state
            .tables
            .validator_sessions
            .iter()
            .filter(|(k, _)| k.1 == stash.0 && k.0 <= session)
            .map(|(_, v)| v.clone())
            .collect();
        rows.sort_by(|a, b| b.session_sequence.session.cmp(&a.session_sequence.session));
        rows.truncate(limit as usize);
        Ok(rows)
    }

    async fn validator_agg(&self, stash: &PublicKey) -> Result<Option<ValidatorAgg>, DbError> {
        Ok(self
            .state
            .read()
            .await
            .tables
            .validator_aggs
            .get(&stash.0)
            .cloned())
    }

    async fn validator_aggs(&self) -> Result<Vec<ValidatorAgg>, DbError> {
        Ok(self
            .state
            .read()
            .await
            .tables
            .validator_aggs
            .values()
            .cloned()
            .collect())
    }

    async fn block_seqs_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<BlockSeq>, DbError> {
        let state = self.state.read().await;
        Ok(state
            .tables
            .blocks
            .values()
            .filter(|b| b.sequence.time >= from && b.sequence.time < to)
            .cloned()
            .collect())
    }

    async fn validator_seqs_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ValidatorSeq>, DbError> {
        let state = self.state.read().await;
        Ok(state
            .tables
            .validators
            .values()
            .filter(|v| v.sequence.time >= from && v.sequence.time < to)
            .cloned()
            .collect())
    }

    async fn validator_session_seqs_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ValidatorSessionSeq>, DbError> {
        let state = self.state.read().await;
        let heights: HashSet<Height> = state
            .tables
            .blocks
            .values()
            .filter(|b| b.sequence.time >= from && b.sequence.time < to)
            .map(|b| b.sequence.height)
            .collect();
        Ok(state
            .tables
            .validator_sessions
            .values()
            .filter(|s| heights.contains(&s.session_sequence.end_height))
            .cloned()
            .collect())
    }

    async fn replace_summaries(&self, summaries: SummarySet) -> Result<(), DbError> {
        let mut state = self.state.write().await;
        state.tables.summaries.insert(
            (summaries.time_interval, summaries.time_bucket),
            summaries,
        );
        Ok(())
    }

    async fn get_summaries(
        &self,
        interval: TimeInterval,
        bucket: DateTime<Utc>,
    ) -> Result<Option<SummarySet>, DbError> {
        Ok(self
            .state
            .read()
            .await
            .tables
            .summaries
            .get(&(interval, bucket))
            .cloned())
    }
}
