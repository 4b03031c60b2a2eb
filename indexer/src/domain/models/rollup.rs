use chrono::{DateTime, Utc};

use super::block::BlockSummary;
use super::sequence::TimeInterval;
use super::validator::{ValidatorSessionSeqSummary, ValidatorSummary};

/// All summaries of one time bucket; stored by replacing the bucket wholesale
#[derive(Debug, Clone, PartialEq)]
pub struct SummarySet {
    pub time_interval: TimeInterval,
    pub time_bucket: DateTime<Utc>,
    pub block: Option<BlockSummary>,
    pub validators: Vec<ValidatorSummary>,
    pub validator_sessions: Vec<ValidatorSessionSeqSummary>,
}
