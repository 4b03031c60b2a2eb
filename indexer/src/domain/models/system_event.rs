//! Derived notable events about validators and their delegations

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::types::{Height, Payload, PublicKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemEventKind {
    ActiveBalanceChange1,
    ActiveBalanceChange2,
    ActiveBalanceChange3,
    CommissionChange1,
    CommissionChange2,
    CommissionChange3,
    JoinedActiveSet,
    LeftActiveSet,
    MissedNConsecutive,
    DelegationJoined,
    DelegationLeft,
}

impl SystemEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SystemEventKind::ActiveBalanceChange1 => "active_balance_change_1",
            SystemEventKind::ActiveBalanceChange2 => "active_balance_change_2",
            SystemEventKind::ActiveBalanceChange3 => "active_balance_change_3",
            SystemEventKind::CommissionChange1 => "commission_change_1",
            SystemEventKind::CommissionChange2 => "commission_change_2",
            SystemEventKind::CommissionChange3 => "commission_change_3",
            SystemEventKind::JoinedActiveSet => "joined_active_set",
            SystemEventKind::LeftActiveSet => "left_active_set",
            SystemEventKind::MissedNConsecutive => "missed_n_consecutive",
            SystemEventKind::DelegationJoined => "delegation_joined",
            SystemEventKind::DelegationLeft => "delegation_left",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        serde_json::from_value(Value::String(value.to_string())).ok()
    }
}

/// Known payload shapes of a system event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SystemEventData {
    PercentChange {
        before: String,
        after: String,
        change: f64,
    },
    DelegationChange {
        account: String,
        validator: String,
    },
    MissedNofM {
        missed: i64,
        of: i64,
    },
    /// Anything this version does not know about
    Raw(Value),
}

impl SystemEventData {
    pub fn to_payload(&self) -> Payload {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemEvent {
    pub height: Height,
    pub time: DateTime<Utc>,
    pub actor: PublicKey,
    pub kind: SystemEventKind,
    pub data: Payload,
}

impl SystemEvent {
    pub fn new(
        height: Height,
        time: DateTime<Utc>,
        actor: PublicKey,
        kind: SystemEventKind,
        data: SystemEventData,
    ) -> Self {
        Self {
            height,
            time,
            actor,
            kind,
            data: data.to_payload(),
        }
    }

    pub fn valid(&self) -> bool {
        self.height >= 0 && self.actor.valid()
    }

    pub fn equal(&self, other: &SystemEvent) -> bool {
        self.height == other.height && self.actor == other.actor && self.kind == other.kind
    }

    pub fn update(&mut self, other: SystemEvent) {
        *self = other;
    }

    /// Decodes the stored payload; unknown shapes come back as `Raw`
    pub fn decode_data(&self) -> SystemEventData {
        serde_json::from_value(self.data.clone())
            .unwrap_or_else(|_| SystemEventData::Raw(self.data.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn kind_names_round_trip() {
        for kind in [
            SystemEventKind::ActiveBalanceChange3,
            SystemEventKind::MissedNConsecutive,
            SystemEventKind::DelegationLeft,
        ] {
            assert_eq!(SystemEventKind::parse(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn identity_is_height_actor_and_kind() {
        let at = Utc.timestamp_opt(1_600_000_000, 0).unwrap();
        let event = |height: Height, actor: &str, kind: SystemEventKind, missed: i64| {
            SystemEvent::new(
                height,
                at,
                PublicKey(actor.into()),
                kind,
                SystemEventData::MissedNofM { missed, of: 3 },
            )
        };
        let seq = event(5, "v", SystemEventKind::MissedNConsecutive, 3);
        assert!(seq.equal(&event(5, "v", SystemEventKind::MissedNConsecutive, 2)));
        assert!(!seq.equal(&event(6, "v", SystemEventKind::MissedNConsecutive, 3)));
        assert!(!seq.equal(&event(5, "w", SystemEventKind::MissedNConsecutive, 3)));
        assert!(!seq.equal(&event(5, "v", SystemEventKind::LeftActiveSet, 3)));
    }

    #[test]
    fn payloads_decode_to_their_shape() {
        let at = Utc.timestamp_opt(1_600_000_000, 0).unwrap();
        let missed = SystemEvent::new(
            5,
            at,
            PublicKey("v".into()),
            SystemEventKind::MissedNConsecutive,
            SystemEventData::MissedNofM { missed: 3, of: 3 },
        );
        assert_eq!(missed.decode_data(), SystemEventData::MissedNofM { missed: 3, of: 3 });

        let unknown = SystemEvent {
            data: json!({"something": "else"}),
            ..missed
        };
        assert!(matches!(unknown.decode_data(), SystemEventData::Raw(_)));
    }
}
