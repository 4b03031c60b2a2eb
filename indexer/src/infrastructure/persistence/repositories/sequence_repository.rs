//! Repository for sequence records
//! Per-height rows are replaced wholesale, era and session rows are upserted

use chrono::{DateTime, Utc};
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use std::fmt;

use super::parse_quantity;
use crate::domain::models::{
    AccountEraSeq, BlockSeq, EraSequence, HeightRecords, RewardEraSeq, Sequence, SessionSequence,
    SystemEvent, ValidatorEraSeq, ValidatorSeq, ValidatorSessionSeq,
};
use crate::domain::types::{Era, Height, PublicKey, Session};
use crate::infrastructure::persistence::entities::{
    account_era_seqs, block_seqs, event_seqs, reward_era_seqs, system_events, transaction_seqs,
    validator_era_seqs, validator_seqs, validator_session_seqs,
};
use crate::infrastructure::persistence::error::DbError;

const INSERT_CHUNK: usize = 500;

/// Repository for sequence operations
#[derive(Clone)]
pub struct SequenceRepository {
    conn: DatabaseConnection,
}

impl fmt::Debug for SequenceRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SequenceRepository").finish_non_exhaustive()
    }
}

impl SequenceRepository {
    /// Create a new SequenceRepository
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Writes every sequence of one height. Meant to run inside the height transaction.
    pub async fn write_height<C: ConnectionTrait>(
        db: &C,
        records: &HeightRecords,
    ) -> Result<(), DbError> {
        let height = records.height();

        write_block(db, &records.block).await?;

        validator_seqs::Entity::delete_many()
            .filter(validator_seqs::Column::Height.eq(height))
            .exec(db)
            .await?;
        let models: Vec<validator_seqs::ActiveModel> = records
            .validators
            .iter()
            .map(|v| validator_seqs::ActiveModel {
                height: Set(v.sequence.height),
                stash_account: Set(v.stash_account.0.clone()),
                time: Set(v.sequence.time),
                active_balance: Set(v.active_balance.to_string()),
            })
            .collect();
        for chunk in models.chunks(INSERT_CHUNK) {
            validator_seqs::Entity::insert_many(chunk.to_vec()).exec(db).await?;
        }

        transaction_seqs::Entity::delete_many()
            .filter(transaction_seqs::Column::Height.eq(height))
            .exec(db)
            .await?;
        let models: Vec<transaction_seqs::ActiveModel> = records
            .transactions
            .iter()
            .map(|t| transaction_seqs::ActiveModel {
                height: Set(t.sequence.height),
                index: Set(t.index),
                time: Set(t.sequence.time),
                hash: Set(t.hash.0.clone()),
                method: Set(t.method.clone()),
                section: Set(t.section.clone()),
                args: Set(t.args.clone()),
            })
            .collect();
        for chunk in models.chunks(INSERT_CHUNK) {
            transaction_seqs::Entity::insert_many(chunk.to_vec()).exec(db).await?;
        }

        event_seqs::Entity::delete_many()
            .filter(event_seqs::Column::Height.eq(height))
            .exec(db)
            .await?;
        let models: Vec<event_seqs::ActiveModel> = records
            .events
            .iter()
            .map(|e| event_seqs::ActiveModel {
                height: Set(e.sequence.height),
                index: Set(e.index),
                time: Set(e.sequence.time),
                extrinsic_index: Set(e.extrinsic_index),
                phase: Set(e.phase.clone()),
                method: Set(e.method.clone()),
                section: Set(e.section.clone()),
                data: Set(e.data.clone()),
            })
            .collect();
        for chunk in models.chunks(INSERT_CHUNK) {
            event_seqs::Entity::insert_many(chunk.to_vec()).exec(db).await?;
        }

        write_system_events(db, height, &records.system_events).await?;

        for seq in &records.validator_eras {
            write_validator_era(db, seq).await?;
        }
        for seq in &records.account_eras {
            write_account_era(db, seq).await?;
        }
        for seq in &records.reward_eras {
            write_reward_era(db, seq).await?;
        }
        for seq in &records.validator_sessions {
            write_validator_session(db, seq).await?;
        }

        Ok(())
    }

    pub async fn validator_seqs_at(&self, height: Height) -> Result<Vec<ValidatorSeq>, DbError> {
        validator_seqs::Entity::find()
            .filter(validator_seqs::Column::Height.eq(height))
            .order_by_asc(validator_seqs::Column::StashAccount)
            .all(&self.conn)
            .await?
            .into_iter()
            .map(validator_to_domain)
            .collect()
    }

    pub async fn validator_era_seqs(&self, era: Era) -> Result<Vec<ValidatorEraSeq>, DbError> {
        validator_era_seqs::Entity::find()
            .filter(validator_era_seqs::Column::Era.eq(era))
            .order_by_asc(validator_era_seqs::Column::Index)
            .all(&self.conn)
            .await?
            .into_iter()
            .map(validator_era_to_domain)
            .collect()
    }

    pub async fn account_era_seqs(&self, era: Era) -> Result<Vec<AccountEraSeq>, DbError> {
        account_era_seqs::Entity::find()
            .filter(account_era_seqs::Column::Era.eq(era))
            .all(&self.conn)
            .await?
            .into_iter()
            .map(account_era_to_domain)
            .collect()
    }

    pub async fn validator_session_seq(
        &self,
        session: Session,
        stash: &PublicKey,
    ) -> Result<Option<ValidatorSessionSeq>, DbError> {
        let result = validator_session_seqs::Entity::find_by_id((session, stash.0.clone()))
            .one(&self.conn)
            .await?;

        Ok(result.map(validator_session_to_domain))
    }

    /// Up to `limit` session rows of `stash` with session `<= session`, newest first
    pub async fn recent_validator_session_seqs(
        &self,
        stash: &PublicKey,
        session: Session,
        limit: u64,
    ) -> Result<Vec<ValidatorSessionSeq>, DbError> {
        let results = validator_session_seqs::Entity::find()
            .filter(validator_session_seqs::Column::StashAccount.eq(stash.0.clone()))
            .filter(validator_session_seqs::Column::Session.lte(session))
            .order_by_desc(validator_session_seqs::Column::Session)
            .limit(limit)
            .all(&self.conn)
            .await?;

        Ok(results.into_iter().map(validator_session_to_domain).collect())
    }

    pub async fn block_seqs_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<BlockSeq>, DbError> {
        let results = block_seqs::Entity::find()
            .filter(block_seqs::Column::Time.gte(from))
            .filter(block_seqs::Column::Time.lt(to))
            .order_by_asc(block_seqs::Column::Height)
            .all(&self.conn)
            .await?;

        Ok(results.into_iter().map(block_to_domain).collect())
    }

    pub async fn validator_seqs_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ValidatorSeq>, DbError> {
        validator_seqs::Entity::find()
            .filter(validator_seqs::Column::Time.gte(from))
            .filter(validator_seqs::Column::Time.lt(to))
            .all(&self.conn)
            .await?
            .into_iter()
            .map(validator_to_domain)
            .collect()
    }

    /// Session rows whose closing block lies in `[from, to)`
    pub async fn validator_session_seqs_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ValidatorSessionSeq>, DbError> {
        let heights: Vec<Height> = self
            .block_seqs_between(from, to)
            .await?
            .into_iter()
            .map(|b| b.sequence.height)
            .collect();
        if heights.is_empty() {
            return Ok(Vec::new());
        }

        let results = validator_session_seqs::Entity::find()
            .filter(validator_session_seqs::Column::EndHeight.is_in(heights))
            .all(&self.conn)
            .await?;

        Ok(results.into_iter().map(validator_session_to_domain).collect())
    }
}

async fn write_block<C: ConnectionTrait>(db: &C, block: &BlockSeq) -> Result<(), DbError> {
    let model = block_seqs::ActiveModel {
        height: Set(block.sequence.height),
        time: Set(block.sequence.time),
        extrinsics_count: Set(block.extrinsics_count),
        extrinsics_signed_count: Set(block.extrinsics_signed_count),
        extrinsics_unsigned_count: Set(block.extrinsics_unsigned_count),
    };
    block_seqs::Entity::insert(model)
        .on_conflict(
            OnConflict::column(block_seqs::Column::Height)
                .update_columns([
                    block_seqs::Column::Time,
                    block_seqs::Column::ExtrinsicsCount,
                    block_seqs::Column::ExtrinsicsSignedCount,
                    block_seqs::Column::ExtrinsicsUnsignedCount,
                ])
                .to_owned(),
        )
        .exec(db)
        .await?;
    Ok(())
}

async fn write_system_events<C: ConnectionTrait>(
    db: &C,
    height: Height,
    events: &[SystemEvent],
) -> Result<(), DbError> {
    system_events::Entity::delete_many()
        .filter(system_events::Column::Height.eq(height))
        .exec(db)
        .await?;

    let models: Vec<system_events::ActiveModel> = events
        .iter()
        .map(|e| system_events::ActiveModel {
            height: Set(e.height),
            actor: Set(e.actor.0.clone()),
            kind: Set(e.kind.as_str().to_string()),
            time: Set(e.time),
            data: Set(e.data.clone()),
        })
        .collect();
    for chunk in models.chunks(INSERT_CHUNK) {
        system_events::Entity::insert_many(chunk.to_vec()).exec(db).await?;
    }
    Ok(())
}

async fn write_validator_era<C: ConnectionTrait>(
    db: &C,
    seq: &ValidatorEraSeq,
) -> Result<(), DbError> {
    let session_accounts = serde_json::to_value(&seq.session_accounts)
        .map_err(|e| DbError::Other(format!("session accounts: {}", e)))?;
    let model = validator_era_seqs::ActiveModel {
        era: Set(seq.era_sequence.era),
        stash_account: Set(seq.stash_account.0.clone()),
        start_height: Set(seq.era_sequence.start_height),
        end_height: Set(seq.era_sequence.end_height),
        index: Set(seq.index),
        controller_account: Set(seq.controller_account.0.clone()),
        session_accounts: Set(session_accounts),
        total_stake: Set(seq.total_stake.to_string()),
        own_stake: Set(seq.own_stake.to_string()),
        stakers_stake: Set(seq.stakers_stake.to_string()),
        reward_points: Set(seq.reward_points),
        commission: Set(seq.commission),
        stakers_count: Set(seq.stakers_count),
    };
    validator_era_seqs::Entity::insert(model)
        .on_conflict(
            OnConflict::columns([
                validator_era_seqs::Column::Era,
                validator_era_seqs::Column::StashAccount,
            ])
            .update_columns([
                validator_era_seqs::Column::StartHeight,
                validator_era_seqs::Column::EndHeight,
                validator_era_seqs::Column::Index,
                validator_era_seqs::Column::ControllerAccount,
                validator_era_seqs::Column::SessionAccounts,
                validator_era_seqs::Column::TotalStake,
                validator_era_seqs::Column::OwnStake,
                validator_era_seqs::Column::StakersStake,
                validator_era_seqs::Column::RewardPoints,
                validator_era_seqs::Column::Commission,
                validator_era_seqs::Column::StakersCount,
            ])
            .to_owned(),
        )
        .exec(db)
        .await?;
    Ok(())
}

async fn write_account_era<C: ConnectionTrait>(db: &C, seq: &AccountEraSeq) -> Result<(), DbError> {
    let model = account_era_seqs::ActiveModel {
        era: Set(seq.era_sequence.era),
        validator_stash_account: Set(seq.validator_stash_account.0.clone()),
        stash_account: Set(seq.stash_account.0.clone()),
        start_height: Set(seq.era_sequence.start_height),
        end_height: Set(seq.era_sequence.end_height),
        controller_account: Set(seq.controller_account.0.clone()),
        validator_controller_account: Set(seq.validator_controller_account.0.clone()),
        stake: Set(seq.stake.to_string()),
    };
    account_era_seqs::Entity::insert(model)
        .on_conflict(
            OnConflict::columns([
                account_era_seqs::Column::Era,
                account_era_seqs::Column::ValidatorStashAccount,
                account_era_seqs::Column::StashAccount,
            ])
            .update_columns([
                account_era_seqs::Column::StartHeight,
                account_era_seqs::Column::EndHeight,
                account_era_seqs::Column::ControllerAccount,
                account_era_seqs::Column::ValidatorControllerAccount,
                account_era_seqs::Column::Stake,
            ])
            .to_owned(),
        )
        .exec(db)
        .await?;
    Ok(())
}

async fn write_reward_era<C: ConnectionTrait>(db: &C, seq: &RewardEraSeq) -> Result<(), DbError> {
    let model = reward_era_seqs::ActiveModel {
        era: Set(seq.era_sequence.era),
        validator_stash_account: Set(seq.validator_stash_account.0.clone()),
        stash_account: Set(seq.stash_account.0.clone()),
        kind: Set(seq.kind.as_str().to_string()),
        start_height: Set(seq.era_sequence.start_height),
        end_height: Set(seq.era_sequence.end_height),
        amount: Set(seq.amount.to_string()),
        claimed: Set(seq.claimed),
    };
    reward_era_seqs::Entity::insert(model)
        .on_conflict(
            OnConflict::columns([
                reward_era_seqs::Column::Era,
                reward_era_seqs::Column::ValidatorStashAccount,
                reward_era_seqs::Column::StashAccount,
                reward_era_seqs::Column::Kind,
            ])
            .update_columns([
                reward_era_seqs::Column::StartHeight,
                reward_era_seqs::Column::EndHeight,
                reward_era_seqs::Column::Amount,
                reward_era_seqs::Column::Claimed,
            ])
            .to_owned(),
        )
        .exec(db)
        .await?;
    Ok(())
}

async fn write_validator_session<C: ConnectionTrait>(
    db: &C,
    seq: &ValidatorSessionSeq,
) -> Result<(), DbError> {
    let model = validator_session_seqs::ActiveModel {
        session: Set(seq.session_sequence.session),
        stash_account: Set(seq.stash_account.0.clone()),
        start_height: Set(seq.session_sequence.start_height),
        end_height: Set(seq.session_sequence.end_height),
        online: Set(seq.online),
    };
    validator_session_seqs::Entity::insert(model)
        .on_conflict(
            OnConflict::columns([
                validator_session_seqs::Column::Session,
                validator_session_seqs::Column::StashAccount,
            ])
            .update_columns([
                validator_session_seqs::Column::StartHeight,
                validator_session_seqs::Column::EndHeight,
                validator_session_seqs::Column::Online,
            ])
            .to_owned(),
        )
        .exec(db)
        .await?;
    Ok(())
}

fn block_to_domain(model: block_seqs::Model) -> BlockSeq {
    BlockSeq {
        sequence: Sequence::new(model.height, model.time),
        extrinsics_count: model.extrinsics_count,
        extrinsics_signed_count: model.extrinsics_signed_count,
        extrinsics_unsigned_count: model.extrinsics_unsigned_count,
    }
}

fn validator_to_domain(model: validator_seqs::Model) -> Result<ValidatorSeq, DbError> {
    Ok(ValidatorSeq {
        sequence: Sequence::new(model.height, model.time),
        active_balance: parse_quantity("active_balance", &model.active_balance)?,
        stash_account: PublicKey(model.stash_account),
    })
}

fn validator_era_to_domain(model: validator_era_seqs::Model) -> Result<ValidatorEraSeq, DbError> {
    let session_accounts: Vec<PublicKey> = serde_json::from_value(model.session_accounts)
        .map_err(|e| DbError::CorruptRow(format!("session_accounts: {}", e)))?;

    Ok(ValidatorEraSeq {
        era_sequence: EraSequence::new(model.era, model.start_height, model.end_height),
        index: model.index,
        stash_account: PublicKey(model.stash_account),
        controller_account: PublicKey(model.controller_account),
        session_accounts,
        total_stake: parse_quantity("total_stake", &model.total_stake)?,
        own_stake: parse_quantity("own_stake", &model.own_stake)?,
        stakers_stake: parse_quantity("stakers_stake", &model.stakers_stake)?,
        reward_points: model.reward_points,
        commission: model.commission,
        stakers_count: model.stakers_count,
    })
}

fn account_era_to_domain(model: account_era_seqs::Model) -> Result<AccountEraSeq, DbError> {
    Ok(AccountEraSeq {
        era_sequence: EraSequence::new(model.era, model.start_height, model.end_height),
        stake: parse_quantity("stake", &model.stake)?,
        stash_account: PublicKey(model.stash_account),
        controller_account: PublicKey(model.controller_account),
        validator_stash_account: PublicKey(model.validator_stash_account),
        validator_controller_account: PublicKey(model.validator_controller_account),
    })
}

fn validator_session_to_domain(model: validator_session_seqs::Model) -> ValidatorSessionSeq {
    ValidatorSessionSeq {
        session_sequence: SessionSequence::new(model.session, model.start_height, model.end_height),
        stash_account: PublicKey(model.stash_account),
        online: model.online,
    }
}
