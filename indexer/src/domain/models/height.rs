use super::account::AccountEraSeq;
use super::block::BlockSeq;
use super::event::EventSeq;
use super::reward::RewardEraSeq;
use super::syncable::Syncable;
use super::system_event::SystemEvent;
use super::transaction::TransactionSeq;
use super::validator::{ValidatorEraSeq, ValidatorObservation, ValidatorSeq, ValidatorSessionSeq};
use crate::domain::types::Height;

/// Everything derived from one height, committed as a single unit.
///
/// Per-height rows replace whatever was stored for the height before;
/// era and session rows are upserted by their natural key; observations are
/// merged into the validator aggregates.
#[derive(Debug, Clone)]
pub struct HeightRecords {
    pub syncable: Syncable,
    pub block: BlockSeq,
    pub validators: Vec<ValidatorSeq>,
    pub transactions: Vec<TransactionSeq>,
    pub events: Vec<EventSeq>,
    pub system_events: Vec<SystemEvent>,
    pub validator_eras: Vec<ValidatorEraSeq>,
    pub account_eras: Vec<AccountEraSeq>,
    pub reward_eras: Vec<RewardEraSeq>,
    pub validator_sessions: Vec<ValidatorSessionSeq>,
    pub observations: Vec<ValidatorObservation>,
}

impl HeightRecords {
    pub fn height(&self) -> Height {
        self.syncable.height
    }
}
