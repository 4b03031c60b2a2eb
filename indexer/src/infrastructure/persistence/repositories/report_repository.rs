//! Repository for run reports

use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use std::fmt;

use crate::domain::models::{Report, ReportKind};
use crate::infrastructure::persistence::entities::reports;
use crate::infrastructure::persistence::error::DbError;

/// Repository for report operations
#[derive(Clone)]
pub struct ReportRepository {
    conn: DatabaseConnection,
}

impl fmt::Debug for ReportRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReportRepository").finish_non_exhaustive()
    }
}

impl ReportRepository {
    /// Create a new ReportRepository
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Insert a report and return the id assigned by the database
    pub async fn create(&self, report: &Report) -> Result<i64, DbError> {
        let model = reports::ActiveModel {
            kind: Set(report.kind.as_str().to_string()),
            index_version: Set(report.index_version),
            start_height: Set(report.start_height),
            end_height: Set(report.end_height),
            success_count: Set(report.success_count),
            error_count: Set(report.error_count),
            error_msg: Set(report.error_msg.clone()),
            duration_ms: Set(report.duration_ms),
            last_good_height: Set(report.last_good_height),
            created_at: Set(report.created_at),
            completed_at: Set(report.completed_at),
            ..Default::default()
        };
        let inserted = model.insert(&self.conn).await?;
        Ok(inserted.id)
    }

    /// Overwrite the stored report with the same id
    pub async fn save(&self, report: &Report) -> Result<(), DbError> {
        let existing = reports::Entity::find_by_id(report.id)
            .one(&self.conn)
            .await?
            .ok_or_else(|| DbError::QueryError(format!("report {} not found", report.id)))?;

        let mut update_model: reports::ActiveModel = existing.into();
        update_model.success_count = Set(report.success_count);
        update_model.error_count = Set(report.error_count);
        update_model.error_msg = Set(report.error_msg.clone());
        update_model.duration_ms = Set(report.duration_ms);
        update_model.last_good_height = Set(report.last_good_height);
        update_model.completed_at = Set(report.completed_at);
        update_model.update(&self.conn).await?;

        Ok(())
    }

    pub async fn get(&self, id: i64) -> Result<Option<Report>, DbError> {
        reports::Entity::find_by_id(id)
            .one(&self.conn)
            .await?
            .map(to_domain)
            .transpose()
    }

    /// Most recent completed report of `kind`
    pub async fn last_completed(&self, kind: ReportKind) -> Result<Option<Report>, DbError> {
        reports::Entity::find()
            .filter(reports::Column::Kind.eq(kind.as_str()))
            .filter(reports::Column::CompletedAt.is_not_null())
            .order_by_desc(reports::Column::Id)
            .one(&self.conn)
            .await?
            .map(to_domain)
            .transpose()
    }

    /// Reports begun but not completed
    pub async fn in_flight(&self) -> Result<Vec<Report>, DbError> {
        reports::Entity::find()
            .filter(reports::Column::CompletedAt.is_null())
            .order_by_asc(reports::Column::Id)
            .all(&self.conn)
            .await?
            .into_iter()
            .map(to_domain)
            .collect()
    }
}

fn to_domain(model: reports::Model) -> Result<Report, DbError> {
    let kind = ReportKind::parse(&model.kind).ok_or_else(|| {
        DbError::CorruptRow(format!("report {} has unknown kind {}", model.id, model.kind))
    })?;

    Ok(Report {
        id: model.id,
        kind,
        index_version: model.index_version,
        start_height: model.start_height,
        end_height: model.end_height,
        success_count: model.success_count,
        error_count: model.error_count,
        error_msg: model.error_msg,
        duration_ms: model.duration_ms,
        last_good_height: model.last_good_height,
        created_at: model.created_at,
        completed_at: model.completed_at,
    })
}
