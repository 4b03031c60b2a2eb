use serde::{Deserialize, Serialize};

use super::sequence::EraSequence;
use crate::domain::types::{PublicKey, Quantity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RewardKind {
    Commission,
    Reward,
}

impl RewardKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RewardKind::Commission => "commission",
            RewardKind::Reward => "reward",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "commission" => Some(RewardKind::Commission),
            "reward" => Some(RewardKind::Reward),
            _ => None,
        }
    }
}

/// Staking payout for one account in one era
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardEraSeq {
    pub era_sequence: EraSequence,
    pub stash_account: PublicKey,
    pub validator_stash_account: PublicKey,
    pub amount: Quantity,
    pub kind: RewardKind,
    pub claimed: bool,
}

impl RewardEraSeq {
    pub fn valid(&self) -> bool {
        self.era_sequence.valid()
            && self.stash_account.valid()
            && self.validator_stash_account.valid()
            && self.amount.valid()
    }

    pub fn equal(&self, other: &RewardEraSeq) -> bool {
        self.era_sequence.era == other.era_sequence.era
            && self.stash_account == other.stash_account
            && self.validator_stash_account == other.validator_stash_account
            && self.kind == other.kind
    }

    pub fn update(&mut self, other: RewardEraSeq) {
        *self = other;
    }
}
