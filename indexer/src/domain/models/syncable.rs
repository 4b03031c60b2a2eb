use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::types::{Era, Height, Session};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncableStatus {
    Running,
    Completed,
}

impl SyncableStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncableStatus::Running => "running",
            SyncableStatus::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "running" => Some(SyncableStatus::Running),
            "completed" => Some(SyncableStatus::Completed),
            _ => None,
        }
    }
}

/// Progress marker for one height
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Syncable {
    pub height: Height,
    pub time: DateTime<Utc>,
    pub spec_version: String,
    pub chain_uid: String,
    pub session: Session,
    pub era: Era,
    pub last_in_session: bool,
    pub last_in_era: bool,
    pub index_version: i64,
    pub status: SyncableStatus,

    /// Run that last touched this height
    pub report_id: Option<i64>,
    pub started_at: DateTime<Utc>,

    /// Set only on the running → completed transition
    pub processed_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
}

impl Syncable {
    pub fn is_completed(&self) -> bool {
        self.status == SyncableStatus::Completed
    }

    pub fn valid(&self) -> bool {
        let timing_consistent = match self.status {
            SyncableStatus::Running => self.processed_at.is_none() && self.duration_ms.is_none(),
            SyncableStatus::Completed => self.processed_at.is_some() && self.duration_ms.is_some(),
        };
        self.height >= 0 && self.session >= 0 && self.era >= 0 && timing_consistent
    }
}
