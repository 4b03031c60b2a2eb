//! Chain events and on-demand decoding of their payloads

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::sequence::Sequence;
use crate::domain::errors::DecodeError;
use crate::domain::types::{Payload, PublicKey, Quantity};

const REWARD_METHOD: &str = "Reward";
const STAKING_SECTION: &str = "staking";
const ACCOUNT_ID: &str = "AccountId";
const BALANCE: &str = "Balance";

/// Event emitted in a block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSeq {
    pub sequence: Sequence,
    pub index: i64,
    pub extrinsic_index: i64,
    pub phase: String,
    pub method: String,
    pub section: String,

    /// Opaque payload, decoded lazily through [`EventSeq::decode_data`]
    pub data: Payload,
}

/// One `{name, value}` pair of an event payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedValue {
    pub name: String,
    pub value: Value,
}

impl NamedValue {
    /// Strings are taken verbatim, numbers by their decimal form
    pub fn value_text(&self) -> Option<String> {
        match &self.value {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

impl EventSeq {
    pub fn valid(&self) -> bool {
        self.sequence.valid() && self.index >= 0
    }

    pub fn equal(&self, other: &EventSeq) -> bool {
        self.sequence.equal(&other.sequence) && self.index == other.index
    }

    pub fn update(&mut self, other: EventSeq) {
        *self = other;
    }

    pub fn is_reward(&self) -> bool {
        self.method == REWARD_METHOD && self.section == STAKING_SECTION
    }

    /// Decodes the payload as a list of named values
    pub fn decode_data(&self) -> Result<Vec<NamedValue>, DecodeError> {
        serde_json::from_value(self.data.clone()).map_err(|e| DecodeError::InvalidValue {
            field: "data".to_string(),
            reason: e.to_string(),
        })
    }

    /// Extracts `(stash, amount)` from a `staking.Reward` event.
    ///
    /// Pair order does not matter. Each of `AccountId` and `Balance` must
    /// appear exactly once and the balance must parse; anything else fails
    /// the whole extraction.
    pub fn extract_reward(&self) -> Result<(PublicKey, Quantity), DecodeError> {
        if !self.is_reward() {
            return Err(DecodeError::IncompatibleType {
                section: self.section.clone(),
                method: self.method.clone(),
            });
        }

        let pairs = self.decode_data()?;
        let account = single_pair(&pairs, ACCOUNT_ID)?;
        let balance = single_pair(&pairs, BALANCE)?;

        let stash = account
            .value_text()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| invalid(ACCOUNT_ID, "expected a non-empty string"))?;

        let amount_text = balance
            .value_text()
            .ok_or_else(|| invalid(BALANCE, "expected a string or number"))?;
        let amount =
            Quantity::from_str(&amount_text).map_err(|e| invalid(BALANCE, &e.to_string()))?;
        if !amount.valid() {
            return Err(invalid(BALANCE, "negative amount"));
        }

        Ok((PublicKey(stash), amount))
    }
}

fn single_pair<'a>(pairs: &'a [NamedValue], name: &str) -> Result<&'a NamedValue, DecodeError> {
    let mut matching = pairs.iter().filter(|p| p.name == name);
    let first = matching
        .next()
        .ok_or_else(|| DecodeError::MissingField(name.to_string()))?;
    if matching.next().is_some() {
        return Err(invalid(name, "appears more than once"));
    }
    Ok(first)
}

fn invalid(field: &str, reason: &str) -> DecodeError {
    DecodeError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn event(method: &str, section: &str, data: Value) -> EventSeq {
        EventSeq {
            sequence: Sequence::new(10, Utc.timestamp_opt(1_600_000_000, 0).unwrap()),
            index: 0,
            extrinsic_index: 0,
            phase: "ApplyExtrinsic".into(),
            method: method.into(),
            section: section.into(),
            data,
        }
    }

    #[test]
    fn extracts_stash_and_amount() {
        let e = event(
            "Reward",
            "staking",
            json!([{"name": "AccountId", "value": "5Abc"}, {"name": "Balance", "value": "1000"}]),
        );
        let (stash, amount) = e.extract_reward().unwrap();
        assert_eq!(stash, PublicKey("5Abc".into()));
        assert_eq!(amount, Quantity::from(1000i64));
    }

    #[test]
    fn pair_order_does_not_matter() {
        let e = event(
            "Reward",
            "staking",
            json!([{"name": "Balance", "value": 77}, {"name": "AccountId", "value": "5Abc"}]),
        );
        assert_eq!(e.extract_reward().unwrap().1, Quantity::from(77i64));
    }

    #[test]
    fn missing_account_is_a_decoding_error() {
        let e = event("Reward", "staking", json!([{"name": "Balance", "value": "1000"}]));
        assert_eq!(
            e.extract_reward(),
            Err(DecodeError::MissingField("AccountId".into()))
        );
    }

    #[test]
    fn unparsable_balance_fails_fast() {
        let e = event(
            "Reward",
            "staking",
            json!([{"name": "AccountId", "value": "5Abc"}, {"name": "Balance", "value": "lots"}]),
        );
        assert!(matches!(
            e.extract_reward(),
            Err(DecodeError::InvalidValue { ref field, .. }) if field == "Balance"
        ));
    }

    #[test]
    fn other_methods_are_incompatible() {
        let e = event("Bonded", "staking", json!([]));
        assert!(matches!(
            e.extract_reward(),
            Err(DecodeError::IncompatibleType { .. })
        ));
    }
}
