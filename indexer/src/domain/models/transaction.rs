use serde::{Deserialize, Serialize};

use super::sequence::Sequence;
use crate::domain::types::{Hash, Payload};

/// Extrinsic included in a block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionSeq {
    pub sequence: Sequence,

    /// Position of the extrinsic in the block
    pub index: i64,

    /// Extrinsic hash
    pub hash: Hash,

    /// Call name, e.g. `bond`
    pub method: String,

    /// Pallet name, e.g. `staking`
    pub section: String,

    /// Decoded call arguments
    pub args: Payload,
}

impl TransactionSeq {
    pub fn valid(&self) -> bool {
        self.sequence.valid() && self.index >= 0 && self.hash.valid()
    }

    pub fn equal(&self, other: &TransactionSeq) -> bool {
        self.sequence.equal(&other.sequence) && self.index == other.index
    }

    pub fn update(&mut self, other: TransactionSeq) {
        *self = other;
    }
}
