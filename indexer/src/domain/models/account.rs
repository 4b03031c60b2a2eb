use serde::{Deserialize, Serialize};

use super::sequence::EraSequence;
use crate::domain::types::{PublicKey, Quantity};

/// Nominator stake behind one validator for one era
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountEraSeq {
    pub era_sequence: EraSequence,

    /// Nominator stash
    pub stash_account: PublicKey,

    /// Nominator controller
    pub controller_account: PublicKey,

    /// Validator being nominated
    pub validator_stash_account: PublicKey,
    pub validator_controller_account: PublicKey,

    pub stake: Quantity,
}

impl AccountEraSeq {
    pub fn valid(&self) -> bool {
        self.era_sequence.valid()
            && self.stash_account.valid()
            && self.validator_stash_account.valid()
            && self.stake.valid()
    }

    pub fn equal(&self, other: &AccountEraSeq) -> bool {
        self.era_sequence.era == other.era_sequence.era
            && self.stash_account == other.stash_account
            && self.validator_stash_account == other.validator_stash_account
            && self.controller_account == other.controller_account
    }

    pub fn update(&mut self, other: AccountEraSeq) {
        *self = other;
    }
}
