//! Derives system events by comparing a height with what was stored before it

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use super::sequence_builder::BuiltSequences;
use crate::domain::models::{
    AccountEraSeq, SystemEvent, SystemEventData, SystemEventKind, ValidatorEraSeq, ValidatorSeq,
    ValidatorSessionSeq,
};
use crate::domain::types::{Height, PublicKey, Quantity};

/// Percent thresholds of the three change tiers, highest first
const CHANGE_TIERS: [(f64, usize); 3] = [(10.0, 3), (1.0, 2), (0.1, 1)];

/// Stored state the detector compares against
#[derive(Debug, Clone, Default)]
pub struct DetectionContext {
    /// Validators of the previous height, `None` when that height is not stored
    pub previous_validators: Option<Vec<ValidatorSeq>>,

    /// Validator rows of the previous era
    pub previous_era_validators: Vec<ValidatorEraSeq>,

    /// Nominations of the previous era
    pub previous_era_accounts: Vec<AccountEraSeq>,

    /// Stored sessions preceding the current one, newest first, per stash
    pub recent_sessions: HashMap<PublicKey, Vec<ValidatorSessionSeq>>,

    pub missed_sessions_threshold: usize,
}

/// Runs every rule and returns one event per `(actor, kind)`
pub fn detect(built: &BuiltSequences, ctx: &DetectionContext) -> Vec<SystemEvent> {
    let Some(block) = &built.block else {
        return Vec::new();
    };
    let height = block.sequence.height;
    let time = block.sequence.time;

    let mut events = Vec::new();
    if let Some(previous) = &ctx.previous_validators {
        active_balance_changes(height, time, &built.validators, previous, &mut events);
        active_set_changes(height, time, &built.validators, previous, &mut events);
    }
    if !built.validator_eras.is_empty() && !ctx.previous_era_validators.is_empty() {
        commission_changes(
            height,
            time,
            &built.validator_eras,
            &ctx.previous_era_validators,
            &mut events,
        );
    }
    if !built.validator_eras.is_empty() && !ctx.previous_era_accounts.is_empty() {
        delegation_changes(
            height,
            time,
            &built.account_eras,
            &ctx.previous_era_accounts,
            &mut events,
        );
    }
    if ctx.missed_sessions_threshold > 0 {
        missed_sessions(height, time, &built.validator_sessions, ctx, &mut events);
    }

    let mut seen = HashSet::new();
    events.retain(|e: &SystemEvent| seen.insert((e.actor.clone(), e.kind)));
    events
}

/// Tier reached by a change of `percent`, if any
pub fn change_tier(percent: f64) -> Option<usize> {
    CHANGE_TIERS
        .iter()
        .find(|(threshold, _)| percent >= *threshold)
        .map(|(_, tier)| *tier)
}

fn percent_change(before: &Quantity, after: &Quantity) -> Option<f64> {
    if before.is_zero() {
        return None;
    }
    let before = before.to_f64();
    Some((after.to_f64() - before).abs() / before * 100.0)
}

fn active_balance_changes(
    height: Height,
    time: DateTime<Utc>,
    current: &[ValidatorSeq],
    previous: &[ValidatorSeq],
    events: &mut Vec<SystemEvent>,
) {
    let previous: HashMap<&PublicKey, &Quantity> = previous
        .iter()
        .map(|v| (&v.stash_account, &v.active_balance))
        .collect();

    for validator in current {
        let Some(before) = previous.get(&validator.stash_account) else {
            continue;
        };
        let Some(change) = percent_change(before, &validator.active_balance) else {
            continue;
        };
        let kind = match change_tier(change) {
            Some(3) => SystemEventKind::ActiveBalanceChange3,
            Some(2) => SystemEventKind::ActiveBalanceChange2,
            Some(_) => SystemEventKind::ActiveBalanceChange1,
            None => continue,
        };
        events.push(SystemEvent::new(
            height,
            time,
            validator.stash_account.clone(),
            kind,
            SystemEventData::PercentChange {
                before: before.to_string(),
                after: validator.active_balance.to_string(),
                change,
            },
        ));
    }
}

fn active_set_changes(
    height: Height,
    time: DateTime<Utc>,
    current: &[ValidatorSeq],
    previous: &[ValidatorSeq],
    events: &mut Vec<SystemEvent>,
) {
    let now: HashSet<&PublicKey> = current.iter().map(|v| &v.stash_account).collect();
    let before: HashSet<&PublicKey> = previous.iter().map(|v| &v.stash_account).collect();

    for stash in current.iter().map(|v| &v.stash_account) {
        if !before.contains(stash) {
            events.push(SystemEvent::new(
                height,
                time,
                stash.clone(),
                SystemEventKind::JoinedActiveSet,
                SystemEventData::Raw(serde_json::Value::Null),
            ));
        }
    }
    for stash in previous.iter().map(|v| &v.stash_account) {
        if !now.contains(stash) {
            events.push(SystemEvent::new(
                height,
                time,
                stash.clone(),
                SystemEventKind::LeftActiveSet,
                SystemEventData::Raw(serde_json::Value::Null),
            ));
        }
    }
}

fn commission_changes(
    height: Height,
    time: DateTime<Utc>,
    current: &[ValidatorEraSeq],
    previous: &[ValidatorEraSeq],
    events: &mut Vec<SystemEvent>,
) {
    let previous: HashMap<&PublicKey, &ValidatorEraSeq> =
        previous.iter().map(|v| (&v.stash_account, v)).collect();

    for validator in current {
        let Some(before) = previous.get(&validator.stash_account) else {
            continue;
        };
        let change = (validator.commission_percent() - before.commission_percent()).abs();
        let kind = match change_tier(change) {
            Some(3) => SystemEventKind::CommissionChange3,
            Some(2) => SystemEventKind::CommissionChange2,
            Some(_) => SystemEventKind::CommissionChange1,
            None => continue,
        };
        events.push(SystemEvent::new(
            height,
            time,
            validator.stash_account.clone(),
            kind,
            SystemEventData::PercentChange {
                before: before.commission_percent().to_string(),
                after: validator.commission_percent().to_string(),
                change,
            },
        ));
    }
}

fn delegation_changes(
    height: Height,
    time: DateTime<Utc>,
    current: &[AccountEraSeq],
    previous: &[AccountEraSeq],
    events: &mut Vec<SystemEvent>,
) {
    let pair = |a: &AccountEraSeq| (a.stash_account.clone(), a.validator_stash_account.clone());
    let now: HashSet<(PublicKey, PublicKey)> = current.iter().map(pair).collect();
    let before: HashSet<(PublicKey, PublicKey)> = previous.iter().map(pair).collect();

    let mut push = |(account, validator): &(PublicKey, PublicKey), kind| {
        events.push(SystemEvent::new(
            height,
            time,
            account.clone(),
            kind,
            SystemEventData::DelegationChange {
                account: account.0.clone(),
                validator: validator.0.clone(),
            },
        ));
    };

    for key in current.iter().map(pair).filter(|k| !before.contains(k)) {
        push(&key, SystemEventKind::DelegationJoined);
    }
    for key in previous.iter().map(pair).filter(|k| !now.contains(k)) {
        push(&key, SystemEventKind::DelegationLeft);
    }
}

fn missed_sessions(
    height: Height,
    time: DateTime<Utc>,
    sessions: &[ValidatorSessionSeq],
    ctx: &DetectionContext,
    events: &mut Vec<SystemEvent>,
) {
    let needed = ctx.missed_sessions_threshold;
    for session in sessions.iter().filter(|s| !s.online) {
        let earlier = ctx
            .recent_sessions
            .get(&session.stash_account)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let missed = 1 + earlier
            .iter()
            .filter(|s| s.session_sequence.session < session.session_sequence.session)
            .take(needed.saturating_sub(1))
            .take_while(|s| !s.online)
            .count();
        if missed < needed {
            continue;
        }
        events.push(SystemEvent::new(
            height,
            time,
            session.stash_account.clone(),
            SystemEventKind::MissedNConsecutive,
            SystemEventData::MissedNofM {
                missed: missed as i64,
                of: needed as i64,
            },
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{BlockSeq, EraSequence, Sequence, SessionSequence};
    use chrono::TimeZone;

    fn key(s: &str) -> PublicKey {
        PublicKey(s.to_string())
    }

    fn at(height: Height) -> Sequence {
        Sequence::new(height, Utc.timestamp_opt(1_600_000_000 + height * 6, 0).unwrap())
    }

    fn validator(height: Height, stash: &str, balance: i64) -> ValidatorSeq {
        ValidatorSeq {
            sequence: at(height),
            stash_account: key(stash),
            active_balance: Quantity::from(balance),
        }
    }

    fn built_at(height: Height) -> BuiltSequences {
        BuiltSequences {
            block: Some(BlockSeq {
                sequence: at(height),
                extrinsics_count: 0,
                extrinsics_signed_count: 0,
                extrinsics_unsigned_count: 0,
            }),
            ..Default::default()
        }
    }

    fn kinds(events: &[SystemEvent], actor: &str) -> Vec<SystemEventKind> {
        events
            .iter()
            .filter(|e| e.actor == key(actor))
            .map(|e| e.kind)
            .collect()
    }

    #[test]
    fn tiers_pick_the_highest_threshold_reached() {
        assert_eq!(change_tier(0.05), None);
        assert_eq!(change_tier(0.1), Some(1));
        assert_eq!(change_tier(5.0), Some(2));
        assert_eq!(change_tier(25.0), Some(3));
    }

    #[test]
    fn balance_and_set_changes_against_previous_height() {
        let mut built = built_at(11);
        built.validators = vec![
            validator(11, "A", 1_000_500),
            validator(11, "B", 1_200_000),
            validator(11, "C", 10),
        ];
        let ctx = DetectionContext {
            previous_validators: Some(vec![
                validator(10, "A", 1_000_000),
                validator(10, "B", 1_000_000),
                validator(10, "D", 10),
            ]),
            ..Default::default()
        };

        let events = detect(&built, &ctx);
        assert!(kinds(&events, "A").is_empty());
        assert_eq!(kinds(&events, "B"), vec![SystemEventKind::ActiveBalanceChange3]);
        assert_eq!(kinds(&events, "C"), vec![SystemEventKind::JoinedActiveSet]);
        assert_eq!(kinds(&events, "D"), vec![SystemEventKind::LeftActiveSet]);

        match events[0].decode_data() {
            SystemEventData::PercentChange { before, after, .. } => {
                assert_eq!(before, "1000000");
                assert_eq!(after, "1200000");
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn unknown_previous_height_emits_nothing() {
        let mut built = built_at(11);
        built.validators = vec![validator(11, "A", 5)];
        assert!(detect(&built, &DetectionContext::default()).is_empty());
    }

    #[test]
    fn missed_sessions_fire_once_threshold_is_reached() {
        let session = |n: i64, stash: &str, online: bool| ValidatorSessionSeq {
            session_sequence: SessionSequence::new(n, n * 10, n * 10 + 9),
            stash_account: key(stash),
            online,
        };
        let mut built = built_at(39);
        built.validator_sessions = vec![session(3, "A", false), session(3, "B", false)];

        let mut recent = HashMap::new();
        recent.insert(key("A"), vec![session(2, "A", false), session(1, "A", false)]);
        recent.insert(key("B"), vec![session(2, "B", false), session(1, "B", true)]);
        let ctx = DetectionContext {
            recent_sessions: recent,
            missed_sessions_threshold: 3,
            ..Default::default()
        };

        let events = detect(&built, &ctx);
        assert_eq!(kinds(&events, "A"), vec![SystemEventKind::MissedNConsecutive]);
        assert!(kinds(&events, "B").is_empty());
        assert_eq!(
            events[0].decode_data(),
            SystemEventData::MissedNofM { missed: 3, of: 3 }
        );
    }

    #[test]
    fn era_boundary_compares_commission_and_nominations() {
        let era_row = |era: i64, commission: i64| ValidatorEraSeq {
            era_sequence: EraSequence::new(era, era * 100, era * 100 + 99),
            index: 0,
            stash_account: key("V"),
            controller_account: key("VC"),
            session_accounts: vec![],
            total_stake: Quantity::zero(),
            own_stake: Quantity::zero(),
            stakers_stake: Quantity::zero(),
            reward_points: 0,
            commission,
            stakers_count: 0,
        };
        let nomination = |era: i64, stash: &str| AccountEraSeq {
            era_sequence: EraSequence::new(era, era * 100, era * 100 + 99),
            stash_account: key(stash),
            controller_account: key("NC"),
            validator_stash_account: key("V"),
            validator_controller_account: key("VC"),
            stake: Quantity::from(1i64),
        };

        let mut built = built_at(299);
        built.validator_eras = vec![era_row(2, 30_000_000)];
        built.account_eras = vec![nomination(2, "N1"), nomination(2, "N3")];
        let ctx = DetectionContext {
            previous_era_validators: vec![era_row(1, 10_000_000)],
            previous_era_accounts: vec![nomination(1, "N1"), nomination(1, "N2")],
            ..Default::default()
        };

        let events = detect(&built, &ctx);
        assert_eq!(kinds(&events, "V"), vec![SystemEventKind::CommissionChange2]);
        assert_eq!(kinds(&events, "N3"), vec![SystemEventKind::DelegationJoined]);
        assert_eq!(kinds(&events, "N2"), vec![SystemEventKind::DelegationLeft]);
        assert!(kinds(&events, "N1").is_empty());
    }
}
