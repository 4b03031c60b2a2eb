//! Repository for hourly and daily summaries

use chrono::{DateTime, Utc};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use std::fmt;

use super::parse_quantity;
use crate::domain::models::{
    BlockSummary, Summary, SummarySet, TimeInterval, ValidatorSessionSeqSummary, ValidatorSummary,
};
use crate::domain::types::PublicKey;
use crate::infrastructure::persistence::entities::{
    block_summaries, validator_session_seq_summaries, validator_summaries,
};
use crate::infrastructure::persistence::error::DbError;

/// Repository for summary operations
#[derive(Clone)]
pub struct SummaryRepository {
    conn: DatabaseConnection,
}

impl fmt::Debug for SummaryRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SummaryRepository").finish_non_exhaustive()
    }
}

impl SummaryRepository {
    /// Create a new SummaryRepository
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Replaces every summary of the set's bucket. Meant to run inside a transaction.
    pub async fn replace<C: ConnectionTrait>(db: &C, set: &SummarySet) -> Result<(), DbError> {
        let interval = set.time_interval.as_str();

        block_summaries::Entity::delete_many()
            .filter(block_summaries::Column::TimeInterval.eq(interval))
            .filter(block_summaries::Column::TimeBucket.eq(set.time_bucket))
            .exec(db)
            .await?;
        validator_summaries::Entity::delete_many()
            .filter(validator_summaries::Column::TimeInterval.eq(interval))
            .filter(validator_summaries::Column::TimeBucket.eq(set.time_bucket))
            .exec(db)
            .await?;
        validator_session_seq_summaries::Entity::delete_many()
            .filter(validator_session_seq_summaries::Column::TimeInterval.eq(interval))
            .filter(validator_session_seq_summaries::Column::TimeBucket.eq(set.time_bucket))
            .exec(db)
            .await?;

        if let Some(block) = &set.block {
            let model = block_summaries::ActiveModel {
                time_interval: Set(interval.to_string()),
                time_bucket: Set(set.time_bucket),
                index_version: Set(block.summary.index_version),
                count: Set(block.count),
                extrinsics_min: Set(block.extrinsics_min),
                extrinsics_avg: Set(block.extrinsics_avg),
                extrinsics_max: Set(block.extrinsics_max),
                extrinsics_signed_avg: Set(block.extrinsics_signed_avg),
            };
            block_summaries::Entity::insert(model).exec(db).await?;
        }

        if !set.validators.is_empty() {
            let models = set.validators.iter().map(|v| validator_summaries::ActiveModel {
                time_interval: Set(interval.to_string()),
                time_bucket: Set(set.time_bucket),
                stash_account: Set(v.stash_account.0.clone()),
                index_version: Set(v.summary.index_version),
                count: Set(v.count),
                active_balance_min: Set(v.active_balance_min.to_string()),
                active_balance_avg: Set(v.active_balance_avg.to_string()),
                active_balance_max: Set(v.active_balance_max.to_string()),
            });
            validator_summaries::Entity::insert_many(models).exec(db).await?;
        }

        if !set.validator_sessions.is_empty() {
            let models = set
                .validator_sessions
                .iter()
                .map(|s| validator_session_seq_summaries::ActiveModel {
                    time_interval: Set(interval.to_string()),
                    time_bucket: Set(set.time_bucket),
                    stash_account: Set(s.stash_account.0.clone()),
                    index_version: Set(s.summary.index_version),
                    count: Set(s.count),
                    online_count: Set(s.online_count),
                    uptime_min: Set(s.uptime_min),
                    uptime_avg: Set(s.uptime_avg),
                    uptime_max: Set(s.uptime_max),
                });
            validator_session_seq_summaries::Entity::insert_many(models)
                .exec(db)
                .await?;
        }

        Ok(())
    }

    pub async fn get(
        &self,
        interval: TimeInterval,
        bucket: DateTime<Utc>,
    ) -> Result<Option<SummarySet>, DbError> {
        let block = block_summaries::Entity::find()
            .filter(block_summaries::Column::TimeInterval.eq(interval.as_str()))
            .filter(block_summaries::Column::TimeBucket.eq(bucket))
            .one(&self.conn)
            .await?;
        let validators = validator_summaries::Entity::find()
            .filter(validator_summaries::Column::TimeInterval.eq(interval.as_str()))
            .filter(validator_summaries::Column::TimeBucket.eq(bucket))
            .order_by_asc(validator_summaries::Column::StashAccount)
            .all(&self.conn)
            .await?;
        let sessions = validator_session_seq_summaries::Entity::find()
            .filter(validator_session_seq_summaries::Column::TimeInterval.eq(interval.as_str()))
            .filter(validator_session_seq_summaries::Column::TimeBucket.eq(bucket))
            .order_by_asc(validator_session_seq_summaries::Column::StashAccount)
            .all(&self.conn)
            .await?;

        if block.is_none() && validators.is_empty() && sessions.is_empty() {
            return Ok(None);
        }

        let block = block.map(|b| BlockSummary {
            summary: Summary::new(b.index_version, interval, bucket),
            count: b.count,
            extrinsics_min: b.extrinsics_min,
            extrinsics_avg: b.extrinsics_avg,
            extrinsics_max: b.extrinsics_max,
            extrinsics_signed_avg: b.extrinsics_signed_avg,
        });

        let validators = validators
            .into_iter()
            .map(|v| {
                Ok(ValidatorSummary {
                    summary: Summary::new(v.index_version, interval, bucket),
                    count: v.count,
                    active_balance_min: parse_quantity(
                        "active_balance_min",
                        &v.active_balance_min,
                    )?,
                    active_balance_avg: parse_quantity(
                        "active_balance_avg",
                        &v.active_balance_avg,
                    )?,
                    active_balance_max: parse_quantity(
                        "active_balance_max",
                        &v.active_balance_max,
                    )?,
                    stash_account: PublicKey(v.stash_account),
                })
            })
            .collect::<Result<Vec<_>, DbError>>()?;

        let validator_sessions = sessions
            .into_iter()
            .map(|s| ValidatorSessionSeqSummary {
                summary: Summary::new(s.index_version, interval, bucket),
                stash_account: PublicKey(s.stash_account),
                count: s.count,
                online_count: s.online_count,
                uptime_min: s.uptime_min,
                uptime_avg: s.uptime_avg,
                uptime_max: s.uptime_max,
            })
            .collect();

        Ok(Some(SummarySet {
            time_interval: interval,
            time_bucket: bucket,
            block,
            validators,
            validator_sessions,
        }))
    }
}
