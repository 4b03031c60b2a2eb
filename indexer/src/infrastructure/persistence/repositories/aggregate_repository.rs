//! Repository for validator aggregates

use sea_orm::{
    ActiveModelTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryOrder, QuerySelect,
    Set,
};
use std::fmt;

use crate::domain::models::{Aggregate, ValidatorAgg, ValidatorObservation};
use crate::domain::types::PublicKey;
use crate::infrastructure::persistence::entities::validator_aggs;
use crate::infrastructure::persistence::error::DbError;

/// Repository for aggregate operations
#[derive(Clone)]
pub struct AggregateRepository {
    conn: DatabaseConnection,
}

impl fmt::Debug for AggregateRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AggregateRepository").finish_non_exhaustive()
    }
}

impl AggregateRepository {
    /// Create a new AggregateRepository
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Folds observations into the stored aggregates.
    ///
    /// Rows are read `FOR UPDATE`, in stash order, so concurrent heights
    /// touching the same validator serialize on the row.
    pub async fn merge_observations<C: ConnectionTrait>(
        db: &C,
        observations: &[ValidatorObservation],
    ) -> Result<(), DbError> {
        let mut ordered: Vec<&ValidatorObservation> = observations.iter().collect();
        ordered.sort_by(|a, b| a.stash_account.0.cmp(&b.stash_account.0));

        for observation in ordered {
            let existing = validator_aggs::Entity::find_by_id(observation.stash_account.0.clone())
                .lock_exclusive()
                .one(db)
                .await?;

            match existing {
                Some(model) => {
                    let mut agg = to_domain(model.clone());
                    agg.update(observation);

                    let mut update_model: validator_aggs::ActiveModel = model.into();
                    apply(&mut update_model, &agg);
                    update_model.update(db).await?;
                }
                None => {
                    let agg = ValidatorAgg::from_observation(observation);
                    let mut new_record = validator_aggs::ActiveModel {
                        stash_account: Set(agg.stash_account.0.clone()),
                        ..Default::default()
                    };
                    apply(&mut new_record, &agg);
                    new_record.insert(db).await?;
                }
            }
        }
        Ok(())
    }

    pub async fn get(&self, stash: &PublicKey) -> Result<Option<ValidatorAgg>, DbError> {
        let result = validator_aggs::Entity::find_by_id(stash.0.clone())
            .one(&self.conn)
            .await?;

        Ok(result.map(to_domain))
    }

    pub async fn all(&self) -> Result<Vec<ValidatorAgg>, DbError> {
        let results = validator_aggs::Entity::find()
            .order_by_asc(validator_aggs::Column::StashAccount)
            .all(&self.conn)
            .await?;

        Ok(results.into_iter().map(to_domain).collect())
    }
}

fn apply(model: &mut validator_aggs::ActiveModel, agg: &ValidatorAgg) {
    model.started_at_height = Set(agg.aggregate.started_at_height);
    model.started_at = Set(agg.aggregate.started_at);
    model.recent_at_height = Set(agg.aggregate.recent_at_height);
    model.recent_at = Set(agg.aggregate.recent_at);
    model.recent_as_validator_height = Set(agg.recent_as_validator_height);
    model.accumulated_uptime = Set(agg.accumulated_uptime);
    model.accumulated_uptime_count = Set(agg.accumulated_uptime_count);
}

fn to_domain(model: validator_aggs::Model) -> ValidatorAgg {
    ValidatorAgg {
        aggregate: Aggregate {
            started_at_height: model.started_at_height,
            started_at: model.started_at,
            recent_at_height: model.recent_at_height,
            recent_at: model.recent_at,
        },
        stash_account: PublicKey(model.stash_account),
        recent_as_validator_height: model.recent_as_validator_height,
        accumulated_uptime: model.accumulated_uptime,
        accumulated_uptime_count: model.accumulated_uptime_count,
    }
}
