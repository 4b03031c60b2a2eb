use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::types::Height;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    Index,
    ParallelReindex,
    SequentialReindex,
}

impl ReportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportKind::Index => "index",
            ReportKind::ParallelReindex => "parallel_reindex",
            ReportKind::SequentialReindex => "sequential_reindex",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "index" => Some(ReportKind::Index),
            "parallel_reindex" => Some(ReportKind::ParallelReindex),
            "sequential_reindex" => Some(ReportKind::SequentialReindex),
            _ => None,
        }
    }
}

/// Lifecycle of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Pending,
    Running,
    Completed,
    Failed,
}

/// Audit record for one pipeline run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    /// Assigned by the store; zero until persisted
    pub id: i64,
    pub kind: ReportKind,
    pub index_version: i64,
    pub start_height: Height,
    pub end_height: Height,
    pub success_count: Option<i64>,
    pub error_count: Option<i64>,
    pub error_msg: Option<String>,
    pub duration_ms: Option<i64>,

    /// Last height of the run's unbroken run of successes, the index resume point
    pub last_good_height: Option<Height>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Report {
    pub fn new(
        kind: ReportKind,
        index_version: i64,
        start_height: Height,
        end_height: Height,
    ) -> Self {
        Self {
            id: 0,
            kind,
            index_version,
            start_height,
            end_height,
            success_count: None,
            error_count: None,
            error_msg: None,
            duration_ms: None,
            last_good_height: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }

    pub fn state(&self) -> RunState {
        if self.id == 0 {
            RunState::Pending
        } else if self.completed_at.is_none() {
            RunState::Running
        } else if self.error_msg.is_some() {
            RunState::Failed
        } else {
            RunState::Completed
        }
    }

    /// First height the next forward run should process
    pub fn resume_height(&self) -> Height {
        match self.last_good_height {
            Some(height) => height + 1,
            None => self.start_height,
        }
    }
}
