//! Storage seam used by the pipeline, the trackers and the cleanup job

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::models::{
    AccountEraSeq, BlockSeq, HeightRecords, Report, ReportKind, Syncable, SummarySet, TimeInterval,
    ValidatorAgg, ValidatorEraSeq, ValidatorSeq, ValidatorSessionSeq,
};
use crate::domain::types::{Era, Height, PublicKey, Session};
use crate::infrastructure::persistence::error::DbError;

#[async_trait]
pub trait Store: Send + Sync {
    /// Upsert by height
    async fn save_syncable(&self, syncable: &Syncable) -> Result<(), DbError>;

    async fn get_syncable(&self, height: Height) -> Result<Option<Syncable>, DbError>;

    /// Highest completed height
    async fn max_processed_height(&self) -> Result<Option<Height>, DbError>;

    /// Deletes every syncable at or below `height`, returns the number removed
    async fn delete_syncables_up_to(&self, height: Height) -> Result<u64, DbError>;

    /// Inserts a report and returns its id
    async fn create_report(&self, report: &Report) -> Result<i64, DbError>;

    async fn save_report(&self, report: &Report) -> Result<(), DbError>;

    async fn get_report(&self, id: i64) -> Result<Option<Report>, DbError>;

    /// Most recently created report of `kind` that has completed
    async fn last_completed_report(&self, kind: ReportKind) -> Result<Option<Report>, DbError>;

    /// Reports that were begun but not completed
    async fn in_flight_reports(&self) -> Result<Vec<Report>, DbError>;

    /// Writes everything derived from one height atomically
    async fn commit_height(&self, records: HeightRecords) -> Result<(), DbError>;

    async fn validator_seqs_at(&self, height: Height) -> Result<Vec<ValidatorSeq>, DbError>;

    async fn validator_era_seqs(&self, era: Era) -> Result<Vec<ValidatorEraSeq>, DbError>;

    async fn account_era_seqs(&self, era: Era) -> Result<Vec<AccountEraSeq>, DbError>;

    async fn validator_session_seq(
        &self,
        session: Session,
        stash: &PublicKey,
    ) -> Result<Option<ValidatorSessionSeq>, DbError>;

    /// Up to `limit` session rows of `stash` with session `<= session`, newest first
    async fn recent_validator_session_seqs(
        &self,
        stash: &PublicKey,
        session: Session,
        limit: u64,
    ) -> Result<Vec<ValidatorSessionSeq>, DbError>;

    async fn validator_agg(&self, stash: &PublicKey) -> Result<Option<ValidatorAgg>, DbError>;

    async fn validator_aggs(&self) -> Result<Vec<ValidatorAgg>, DbError>;

    /// Block rows with `from <= time < to`
    async fn block_seqs_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<BlockSeq>, DbError>;

    /// Validator rows with `from <= time < to`
    async fn validator_seqs_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ValidatorSeq>, DbError>;

    /// Session rows whose closing block falls in `from <= time < to`
    async fn validator_session_seqs_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ValidatorSessionSeq>, DbError>;

    /// Replaces every summary of the set's bucket
    async fn replace_summaries(&self, summaries: SummarySet) -> Result<(), DbError>;

    async fn get_summaries(
        &self,
        interval: TimeInterval,
        bucket: DateTime<Utc>,
    ) -> Result<Option<SummarySet>, DbError>;
}
