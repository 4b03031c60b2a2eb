//! Repository for syncables
//! One progress marker per height, upserted by height

use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use std::fmt;

use crate::domain::models::{Syncable, SyncableStatus};
use crate::domain::types::Height;
use crate::infrastructure::persistence::entities::syncables;
use crate::infrastructure::persistence::error::DbError;

/// Repository for syncable operations
#[derive(Clone)]
pub struct SyncableRepository {
    conn: DatabaseConnection,
}

impl fmt::Debug for SyncableRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncableRepository").finish_non_exhaustive()
    }
}

impl SyncableRepository {
    /// Create a new SyncableRepository
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn save(&self, syncable: &Syncable) -> Result<(), DbError> {
        Self::upsert(&self.conn, syncable).await
    }

    /// Insert or overwrite the syncable of `syncable.height`
    pub async fn upsert<C: ConnectionTrait>(db: &C, syncable: &Syncable) -> Result<(), DbError> {
        let model = syncables::ActiveModel {
            height: Set(syncable.height),
            time: Set(syncable.time),
            spec_version: Set(syncable.spec_version.clone()),
            chain_uid: Set(syncable.chain_uid.clone()),
            session: Set(syncable.session),
            era: Set(syncable.era),
            last_in_session: Set(syncable.last_in_session),
            last_in_era: Set(syncable.last_in_era),
            index_version: Set(syncable.index_version),
            status: Set(syncable.status.as_str().to_string()),
            report_id: Set(syncable.report_id),
            started_at: Set(syncable.started_at),
            processed_at: Set(syncable.processed_at),
            duration_ms: Set(syncable.duration_ms),
        };

        syncables::Entity::insert(model)
            .on_conflict(
                OnConflict::column(syncables::Column::Height)
                    .update_columns([
                        syncables::Column::Time,
                        syncables::Column::SpecVersion,
                        syncables::Column::ChainUid,
                        syncables::Column::Session,
                        syncables::Column::Era,
                        syncables::Column::LastInSession,
                        syncables::Column::LastInEra,
                        syncables::Column::IndexVersion,
                        syncables::Column::Status,
                        syncables::Column::ReportId,
                        syncables::Column::StartedAt,
                        syncables::Column::ProcessedAt,
                        syncables::Column::DurationMs,
                    ])
                    .to_owned(),
            )
            .exec(db)
            .await?;
        Ok(())
    }

    pub async fn get(&self, height: Height) -> Result<Option<Syncable>, DbError> {
        syncables::Entity::find_by_id(height)
            .one(&self.conn)
            .await?
            .map(to_domain)
            .transpose()
    }

    /// Highest completed height
    pub async fn max_processed_height(&self) -> Result<Option<Height>, DbError> {
        let result = syncables::Entity::find()
            .filter(syncables::Column::Status.eq(SyncableStatus::Completed.as_str()))
            .order_by_desc(syncables::Column::Height)
            .one(&self.conn)
            .await?;

        Ok(result.map(|s| s.height))
    }

    /// Delete every syncable at or below `height`
    pub async fn delete_up_to(&self, height: Height) -> Result<u64, DbError> {
        let result = syncables::Entity::delete_many()
            .filter(syncables::Column::Height.lte(height))
            .exec(&self.conn)
            .await?;

        Ok(result.rows_affected)
    }
}

fn to_domain(model: syncables::Model) -> Result<Syncable, DbError> {
    let status = SyncableStatus::parse(&model.status).ok_or_else(|| {
        DbError::CorruptRow(format!(
            "syncable {} has unknown status {}",
            model.height, model.status
        ))
    })?;

    Ok(Syncable {
        height: model.height,
        time: model.time,
        spec_version: model.spec_version,
        chain_uid: model.chain_uid,
        session: model.session,
        era: model.era,
        last_in_session: model.last_in_session,
        last_in_era: model.last_in_era,
        index_version: model.index_version,
        status,
        report_id: model.report_id,
        started_at: model.started_at,
        processed_at: model.processed_at,
        duration_ms: model.duration_ms,
    })
}
