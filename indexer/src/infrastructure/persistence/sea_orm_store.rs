//! Postgres-backed store built from the repositories

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{DatabaseConnection, TransactionTrait};
use std::fmt;

use crate::domain::models::{
    AccountEraSeq, BlockSeq, HeightRecords, Report, ReportKind, Syncable, SummarySet, TimeInterval,
    ValidatorAgg, ValidatorEraSeq, ValidatorSeq, ValidatorSessionSeq,
};
use crate::domain::types::{Era, Height, PublicKey, Session};
use crate::infrastructure::persistence::error::DbError;
use crate::infrastructure::persistence::repositories::{
    AggregateRepository, Repositories, SequenceRepository, SummaryRepository, SyncableRepository,
};
use crate::infrastructure::persistence::store::Store;

#[derive(Clone)]
pub struct SeaOrmStore {
    conn: DatabaseConnection,
    repositories: Repositories,
}

impl fmt::Debug for SeaOrmStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeaOrmStore").finish_non_exhaustive()
    }
}

impl SeaOrmStore {
    pub fn new(conn: DatabaseConnection, repositories: Repositories) -> Self {
        Self { conn, repositories }
    }
}

#[async_trait]
impl Store for SeaOrmStore {
    async fn save_syncable(&self, syncable: &Syncable) -> Result<(), DbError> {
        self.repositories.syncable.save(syncable).await
    }

    async fn get_syncable(&self, height: Height) -> Result<Option<Syncable>, DbError> {
        self.repositories.syncable.get(height).await
    }

    async fn max_processed_height(&self) -> Result<Option<Height>, DbError> {
        self.repositories.syncable.max_processed_height().await
    }

    async fn delete_syncables_up_to(&self, height: Height) -> Result<u64, DbError> {
        self.repositories.syncable.delete_up_to(height).await
    }

    async fn create_report(&self, report: &Report) -> Result<i64, DbError> {
        self.repositories.report.create(report).await
    }

    async fn save_report(&self, report: &Report) -> Result<(), DbError> {
        self.repositories.report.save(report).await
    }

    async fn get_report(&self, id: i64) -> Result<Option<Report>, DbError> {
        self.repositories.report.get(id).await
    }

    async fn last_completed_report(&self, kind: ReportKind) -> Result<Option<Report>, DbError> {
        self.repositories.report.last_completed(kind).await
    }

    async fn in_flight_reports(&self) -> Result<Vec<Report>, DbError> {
        self.repositories.report.in_flight().await
    }

    async fn commit_height(&self, records: HeightRecords) -> Result<(), DbError> {
        self.conn
            .transaction::<_, (), DbError>(move |txn| {
                Box::pin(async move {
                    SequenceRepository::write_height(txn, &records).await?;
                    AggregateRepository::merge_observations(txn, &records.observations).await?;
                    SyncableRepository::upsert(txn, &records.syncable).await?;
                    Ok(())
                })
            })
            .await?;
        Ok(())
    }

    async fn validator_seqs_at(&self, height: Height) -> Result<Vec<ValidatorSeq>, DbError> {
        self.repositories.sequence.validator_seqs_at(height).await
    }

    async fn validator_era_seqs(&self, era: Era) -> Result<Vec<ValidatorEraSeq>, DbError> {
        self.repositories.sequence.validator_era_seqs(era).await
    }

    async fn account_era_seqs(&self, era: Era) -> Result<Vec<AccountEraSeq>, DbError> {
        self.repositories.sequence.account_era_seqs(era).await
    }

    async fn validator_session_seq(
        &self,
        session: Session,
        stash: &PublicKey,
    ) -> Result<Option<ValidatorSessionSeq>, DbError> {
        self.repositories
            .sequence
            .validator_session_seq(session, stash)
            .await
    }

    async fn recent_validator_session_seqs(
        &self,
        stash: &PublicKey,
        session: Session,
        limit: u64,
    ) -> Result<Vec<ValidatorSessionSeq>, DbError> {
        self.repositories
            .sequence
            .recent_validator_session_seqs(stash, session, limit)
            .await
    }

    async fn validator_agg(&self, stash: &PublicKey) -> Result<Option<ValidatorAgg>, DbError> {
        self.repositories.aggregate.get(stash).await
    }

    async fn validator_aggs(&self) -> Result<Vec<ValidatorAgg>, DbError> {
        self.repositories.aggregate.all().await
    }

    async fn block_seqs_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<BlockSeq>, DbError> {
        self.repositories.sequence.block_seqs_between(from, to).await
    }

    async fn validator_seqs_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ValidatorSeq>, DbError> {
        self.repositories.sequence.validator_seqs_between(from, to).await
    }

    async fn validator_session_seqs_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ValidatorSessionSeq>, DbError> {
        self.repositories
            .sequence
            .validator_session_seqs_between(from, to)
            .await
    }

    async fn replace_summaries(&self, summaries: SummarySet) -> Result<(), DbError> {
        self.conn
            .transaction::<_, (), DbError>(move |txn| {
                Box::pin(async move { SummaryRepository::replace(txn, &summaries).await })
            })
            .await?;
        Ok(())
    }

    async fn get_summaries(
        &self,
        interval: TimeInterval,
        bucket: DateTime<Utc>,
    ) -> Result<Option<SummarySet>, DbError> {
        self.repositories.summary.get(interval, bucket).await
    }
}
