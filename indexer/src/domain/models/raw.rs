//! Decoded chain data as handed over by the block source

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::types::{Era, Hash, Height, Payload, PublicKey, Quantity, Session};

/// Everything fetched for one height
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawHeight {
    pub block: RawBlock,
    #[serde(default)]
    pub validators: Vec<RawValidator>,
    #[serde(default)]
    pub events: Vec<RawEvent>,
    #[serde(default)]
    pub extrinsics: Vec<RawExtrinsic>,
}

/// Block header plus the epoch position of the block
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawBlock {
    pub height: Height,
    pub time: DateTime<Utc>,
    pub hash: Hash,
    pub spec_version: String,
    pub chain_uid: String,
    pub session: Session,
    pub era: Era,
    #[serde(default)]
    pub last_in_session: bool,
    #[serde(default)]
    pub last_in_era: bool,
    /// First height of the session this block belongs to
    pub session_start_height: Height,
    /// First height of the era this block belongs to
    pub era_start_height: Height,
}

/// Snapshot of one active validator at a height
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawValidator {
    pub stash: PublicKey,
    pub controller: PublicKey,
    #[serde(default)]
    pub session_accounts: Vec<PublicKey>,
    pub total_stake: Quantity,
    pub own_stake: Quantity,
    pub active_balance: Quantity,
    #[serde(default)]
    pub reward_points: i64,
    /// Commission in parts per billion
    #[serde(default)]
    pub commission: i64,
    #[serde(default)]
    pub online: bool,
    #[serde(default)]
    pub stakers: Vec<RawStaker>,
}

/// Nominator backing a validator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawStaker {
    pub stash: PublicKey,
    pub controller: PublicKey,
    pub stake: Quantity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEvent {
    pub index: i64,
    #[serde(default)]
    pub extrinsic_index: i64,
    pub phase: String,
    pub method: String,
    pub section: String,
    #[serde(default)]
    pub data: Payload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawExtrinsic {
    pub index: i64,
    pub hash: Hash,
    pub method: String,
    pub section: String,
    #[serde(default)]
    pub args: Payload,
    #[serde(default)]
    pub is_signed: bool,
}
