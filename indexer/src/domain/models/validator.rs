//! Validator records: per-height, per-era, per-session, running aggregate and rollups

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::sequence::{Aggregate, EraSequence, Sequence, SessionSequence, Summary};
use crate::domain::types::{Height, PublicKey, Quantity};

/// Active validator seen at a height
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorSeq {
    pub sequence: Sequence,
    pub stash_account: PublicKey,
    pub active_balance: Quantity,
}

impl ValidatorSeq {
    pub fn valid(&self) -> bool {
        self.sequence.valid() && self.stash_account.valid() && self.active_balance.valid()
    }

    pub fn equal(&self, other: &ValidatorSeq) -> bool {
        self.sequence.equal(&other.sequence) && self.stash_account == other.stash_account
    }

    pub fn update(&mut self, other: ValidatorSeq) {
        self.active_balance = other.active_balance;
    }
}

/// Validator state recorded once per era, at the era's last height
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorEraSeq {
    pub era_sequence: EraSequence,

    /// Position of the validator in the era's active set
    pub index: i64,
    pub stash_account: PublicKey,
    pub controller_account: PublicKey,
    pub session_accounts: Vec<PublicKey>,
    pub total_stake: Quantity,
    pub own_stake: Quantity,
    pub stakers_stake: Quantity,
    pub reward_points: i64,

    /// Parts per billion
    pub commission: i64,
    pub stakers_count: i64,
}

impl ValidatorEraSeq {
    pub fn valid(&self) -> bool {
        self.era_sequence.valid()
            && self.stash_account.valid()
            && self.total_stake.valid()
            && self.own_stake.valid()
            && self.stakers_stake.valid()
            && self.reward_points >= 0
            && self.commission >= 0
            && self.stakers_count >= 0
    }

    pub fn equal(&self, other: &ValidatorEraSeq) -> bool {
        self.era_sequence.era == other.era_sequence.era && self.stash_account == other.stash_account
    }

    pub fn update(&mut self, other: ValidatorEraSeq) {
        *self = other;
    }

    /// Commission expressed in percent
    pub fn commission_percent(&self) -> f64 {
        self.commission as f64 / 10_000_000.0
    }
}

/// Validator liveness for one session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorSessionSeq {
    pub session_sequence: SessionSequence,
    pub stash_account: PublicKey,
    pub online: bool,
}

impl ValidatorSessionSeq {
    pub fn valid(&self) -> bool {
        self.session_sequence.valid() && self.stash_account.valid()
    }

    pub fn equal(&self, other: &ValidatorSessionSeq) -> bool {
        self.session_sequence.session == other.session_sequence.session
            && self.stash_account == other.stash_account
    }

    pub fn update(&mut self, other: ValidatorSessionSeq) {
        *self = other;
    }
}

/// Contribution of one height to a validator aggregate.
///
/// Uptime fields are deltas against whatever was stored for the same session
/// before, so re-applying an observation for an already indexed height adds
/// nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorObservation {
    pub stash_account: PublicKey,
    pub height: Height,
    pub time: DateTime<Utc>,
    pub as_validator: bool,
    pub uptime_delta: i64,
    pub uptime_count_delta: i64,
}

/// Long-lived per-validator running aggregate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorAgg {
    pub aggregate: Aggregate,
    pub stash_account: PublicKey,
    pub recent_as_validator_height: Height,

    /// Number of sessions the validator was online
    pub accumulated_uptime: i64,

    /// Number of sessions observed
    pub accumulated_uptime_count: i64,
}

impl ValidatorAgg {
    pub fn from_observation(observation: &ValidatorObservation) -> Self {
        let mut agg = Self {
            aggregate: Aggregate::new(observation.height, observation.time),
            stash_account: observation.stash_account.clone(),
            recent_as_validator_height: 0,
            accumulated_uptime: 0,
            accumulated_uptime_count: 0,
        };
        agg.update(observation);
        agg
    }

    pub fn valid(&self) -> bool {
        self.aggregate.valid()
            && self.stash_account.valid()
            && self.recent_as_validator_height >= 0
            && self.accumulated_uptime >= 0
            && self.accumulated_uptime <= self.accumulated_uptime_count
    }

    pub fn equal(&self, other: &ValidatorAgg) -> bool {
        self.stash_account == other.stash_account
    }

    /// Order-independent fold: maxima for recency, sums for uptime
    pub fn update(&mut self, observation: &ValidatorObservation) {
        self.aggregate.merge(observation.height, observation.time);
        if observation.as_validator && observation.height > self.recent_as_validator_height {
            self.recent_as_validator_height = observation.height;
        }
        self.accumulated_uptime += observation.uptime_delta;
        self.accumulated_uptime_count += observation.uptime_count_delta;
    }

    pub fn uptime(&self) -> Option<f64> {
        if self.accumulated_uptime_count == 0 {
            return None;
        }
        Some(self.accumulated_uptime as f64 / self.accumulated_uptime_count as f64)
    }
}

/// Hourly or daily rollup of one validator's active balance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorSummary {
    pub summary: Summary,
    pub stash_account: PublicKey,
    pub count: i64,
    pub active_balance_min: Quantity,
    pub active_balance_avg: Quantity,
    pub active_balance_max: Quantity,
}

impl ValidatorSummary {
    pub fn valid(&self) -> bool {
        self.summary.valid()
            && self.stash_account.valid()
            && self.active_balance_min.valid()
            && self.active_balance_min <= self.active_balance_max
    }

    pub fn equal(&self, other: &ValidatorSummary) -> bool {
        self.summary.equal(&other.summary) && self.stash_account == other.stash_account
    }
}

/// Hourly or daily rollup of one validator's session uptime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatorSessionSeqSummary {
    pub summary: Summary,
    pub stash_account: PublicKey,
    pub count: i64,
    pub online_count: i64,
    pub uptime_min: f64,
    pub uptime_avg: f64,
    pub uptime_max: f64,
}

impl ValidatorSessionSeqSummary {
    pub fn valid(&self) -> bool {
        self.summary.valid() && self.stash_account.valid() && self.online_count <= self.count
    }

    pub fn equal(&self, other: &ValidatorSessionSeqSummary) -> bool {
        self.summary.equal(&other.summary) && self.stash_account == other.stash_account
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn observation(height: Height, uptime_delta: i64, count_delta: i64) -> ValidatorObservation {
        ValidatorObservation {
            stash_account: PublicKey("5Stash".into()),
            height,
            time: Utc.timestamp_opt(1_600_000_000 + height * 6, 0).unwrap(),
            as_validator: true,
            uptime_delta,
            uptime_count_delta: count_delta,
        }
    }

    fn fold(order: &[usize], observations: &[ValidatorObservation]) -> ValidatorAgg {
        let mut agg = ValidatorAgg::from_observation(&observations[order[0]]);
        for &i in &order[1..] {
            agg.update(&observations[i]);
        }
        agg
    }

    #[test]
    fn any_permutation_converges() {
        let observations = vec![
            observation(100, 1, 1),
            observation(105, 0, 1),
            observation(110, 0, 0),
            observation(120, 1, 1),
        ];
        let orders: [[usize; 4]; 4] = [[0, 1, 2, 3], [3, 2, 1, 0], [2, 0, 3, 1], [1, 3, 0, 2]];
        let expected = fold(&orders[0], &observations);
        for order in &orders[1..] {
            assert_eq!(fold(order, &observations), expected);
        }
        assert_eq!(expected.aggregate.recent_at_height, 120);
        assert_eq!(expected.aggregate.started_at_height, 100);
        assert_eq!(expected.accumulated_uptime, 2);
        assert_eq!(expected.accumulated_uptime_count, 3);
    }

    #[test]
    fn replayed_observation_with_zero_delta_changes_nothing() {
        let mut agg = ValidatorAgg::from_observation(&observation(100, 1, 1));
        let before = agg.clone();
        agg.update(&observation(100, 0, 0));
        assert_eq!(agg, before);
    }

    fn era_seq(era: i64, stash: &str, total_stake: i64) -> ValidatorEraSeq {
        ValidatorEraSeq {
            era_sequence: EraSequence::new(era, 1, 10),
            index: 0,
            stash_account: PublicKey(stash.into()),
            controller_account: PublicKey("c".into()),
            session_accounts: vec![],
            total_stake: Quantity::from(total_stake),
            own_stake: Quantity::zero(),
            stakers_stake: Quantity::zero(),
            reward_points: 0,
            commission: 0,
            stakers_count: 0,
        }
    }

    #[test]
    fn validator_seq_identity_ignores_balance() {
        let at = Utc.timestamp_opt(1_600_000_000, 0).unwrap();
        let seq = ValidatorSeq {
            sequence: Sequence::new(10, at),
            stash_account: PublicKey("a".into()),
            active_balance: Quantity::from(100i64),
        };
        let rebalanced = ValidatorSeq {
            active_balance: Quantity::from(999i64),
            ..seq.clone()
        };
        assert!(seq.equal(&rebalanced));

        let other_stash = ValidatorSeq {
            stash_account: PublicKey("b".into()),
            ..seq.clone()
        };
        assert!(!seq.equal(&other_stash));
        let other_height = ValidatorSeq {
            sequence: Sequence::new(11, at),
            ..seq.clone()
        };
        assert!(!seq.equal(&other_height));
    }

    #[test]
    fn validator_era_identity_is_era_and_stash() {
        let seq = era_seq(4, "a", 100);
        let mut restaked = era_seq(4, "a", 700);
        restaked.era_sequence = EraSequence::new(4, 2, 12);
        restaked.index = 3;
        assert!(seq.equal(&restaked));
        assert!(!seq.equal(&era_seq(5, "a", 100)));
        assert!(!seq.equal(&era_seq(4, "b", 100)));
    }

    #[test]
    fn commission_converts_parts_per_billion_to_percent() {
        let seq = ValidatorEraSeq {
            era_sequence: EraSequence::new(1, 1, 10),
            index: 0,
            stash_account: PublicKey("a".into()),
            controller_account: PublicKey("b".into()),
            session_accounts: vec![],
            total_stake: Quantity::zero(),
            own_stake: Quantity::zero(),
            stakers_stake: Quantity::zero(),
            reward_points: 0,
            commission: 50_000_000,
            stakers_count: 0,
        };
        assert!((seq.commission_percent() - 5.0).abs() < f64::EPSILON);
    }
}
