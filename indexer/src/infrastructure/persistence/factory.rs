use sea_orm::DatabaseConnection;

use crate::infrastructure::persistence::connection::DbPool;
use crate::infrastructure::persistence::repositories::{
    AggregateRepository, ReportRepository, Repositories, SequenceRepository, SummaryRepository,
    SyncableRepository,
};
use crate::infrastructure::persistence::sea_orm_store::SeaOrmStore;

/// Factory for creating repositories
pub struct RepositoryFactory;

impl RepositoryFactory {
    /// Create all repositories
    pub fn create_repositories(db_pool: &DbPool) -> Repositories {
        let conn = db_pool.get_connection().clone();

        Repositories::new(
            Self::create_aggregate_repository(conn.clone()),
            Self::create_report_repository(conn.clone()),
            Self::create_sequence_repository(conn.clone()),
            Self::create_summary_repository(conn.clone()),
            Self::create_syncable_repository(conn),
        )
    }

    /// Create the store the pipeline writes through
    pub fn create_store(db_pool: &DbPool) -> SeaOrmStore {
        SeaOrmStore::new(
            db_pool.get_connection().clone(),
            Self::create_repositories(db_pool),
        )
    }

    /// Create an aggregate repository
    pub fn create_aggregate_repository(conn: DatabaseConnection) -> AggregateRepository {
        AggregateRepository::new(conn)
    }

    /// Create a report repository
    pub fn create_report_repository(conn: DatabaseConnection) -> ReportRepository {
        ReportRepository::new(conn)
    }

    /// Create a sequence repository
    pub fn create_sequence_repository(conn: DatabaseConnection) -> SequenceRepository {
        SequenceRepository::new(conn)
    }

    /// Create a summary repository
    pub fn create_summary_repository(conn: DatabaseConnection) -> SummaryRepository {
        SummaryRepository::new(conn)
    }

    /// Create a syncable repository
    pub fn create_syncable_repository(conn: DatabaseConnection) -> SyncableRepository {
        SyncableRepository::new(conn)
    }
}
