pub mod aggregate_repository;
pub mod report_repository;
pub mod sequence_repository;
pub mod summary_repository;
pub mod syncable_repository;

pub use aggregate_repository::AggregateRepository;
pub use report_repository::ReportRepository;
pub use sequence_repository::SequenceRepository;
pub use summary_repository::SummaryRepository;
pub use syncable_repository::SyncableRepository;

use crate::domain::types::Quantity;
use crate::infrastructure::persistence::error::DbError;

/// Collection of all repositories
#[derive(Clone, Debug)]
pub struct Repositories {
    /// Repository for validator aggregates
    pub aggregate: AggregateRepository,
    /// Repository for run reports
    pub report: ReportRepository,
    /// Repository for sequence records
    pub sequence: SequenceRepository,
    /// Repository for summaries
    pub summary: SummaryRepository,
    /// Repository for syncables
    pub syncable: SyncableRepository,
}

impl Repositories {
    /// Create a new Repositories instance
    pub fn new(
        aggregate: AggregateRepository,
        report: ReportRepository,
        sequence: SequenceRepository,
        summary: SummaryRepository,
        syncable: SyncableRepository,
    ) -> Self {
        Self {
            aggregate,
            report,
            sequence,
            summary,
            syncable,
        }
    }
}

/// Quantities are stored as decimal text
pub(crate) fn parse_quantity(field: &str, value: &str) -> Result<Quantity, DbError> {
    value
        .parse()
        .map_err(|e| DbError::CorruptRow(format!("{} {:?}: {}", field, value, e)))
}
