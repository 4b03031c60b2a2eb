use serde::{Deserialize, Serialize};

use super::sequence::{Sequence, Summary};

/// One row per block height
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSeq {
    pub sequence: Sequence,

    /// Total number of extrinsics in the block
    pub extrinsics_count: i64,

    /// Number of signed extrinsics
    pub extrinsics_signed_count: i64,

    /// Number of unsigned extrinsics (inherents)
    pub extrinsics_unsigned_count: i64,
}

impl BlockSeq {
    pub fn valid(&self) -> bool {
        self.sequence.valid()
            && self.extrinsics_count >= 0
            && self.extrinsics_signed_count >= 0
            && self.extrinsics_unsigned_count >= 0
    }

    pub fn equal(&self, other: &BlockSeq) -> bool {
        self.sequence.equal(&other.sequence)
    }

    pub fn update(&mut self, other: BlockSeq) {
        self.extrinsics_count = other.extrinsics_count;
        self.extrinsics_signed_count = other.extrinsics_signed_count;
        self.extrinsics_unsigned_count = other.extrinsics_unsigned_count;
    }
}

/// Hourly or daily rollup over block rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockSummary {
    pub summary: Summary,
    pub count: i64,
    pub extrinsics_min: i64,
    pub extrinsics_avg: f64,
    pub extrinsics_max: i64,
    pub extrinsics_signed_avg: f64,
}

impl BlockSummary {
    pub fn valid(&self) -> bool {
        self.summary.valid() && self.count >= 0 && self.extrinsics_min <= self.extrinsics_max
    }

    pub fn equal(&self, other: &BlockSummary) -> bool {
        self.summary.equal(&other.summary)
    }
}
