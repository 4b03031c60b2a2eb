//! Turns the raw data of one height into sequence records

use std::collections::{BTreeSet, HashMap};

use serde_json::Value;

use crate::domain::errors::IndexerError;
use crate::domain::models::{
    AccountEraSeq, BlockSeq, EraSequence, EventSeq, RawHeight, RewardEraSeq, RewardKind, Sequence,
    SessionSequence, TransactionSeq, ValidatorEraSeq, ValidatorObservation, ValidatorSeq,
    ValidatorSessionSeq,
};
use crate::domain::types::{Era, Height, PublicKey, Quantity};
use crate::utils::logging;

const PAYOUT_SECTION: &str = "staking";
const PAYOUT_METHODS: [&str; 2] = ["payoutStakers", "payout_stakers"];
const BATCH_SECTION: &str = "utility";
const BATCH_METHODS: [&str; 5] = ["batch", "batchAll", "batch_all", "forceBatch", "force_batch"];

/// Records built for one height, before aggregation and commit
#[derive(Debug, Clone, Default)]
pub struct BuiltSequences {
    pub block: Option<BlockSeq>,
    pub validators: Vec<ValidatorSeq>,
    pub transactions: Vec<TransactionSeq>,
    pub events: Vec<EventSeq>,
    pub validator_eras: Vec<ValidatorEraSeq>,
    pub account_eras: Vec<AccountEraSeq>,
    pub reward_eras: Vec<RewardEraSeq>,
    pub validator_sessions: Vec<ValidatorSessionSeq>,

    /// Records dropped because they failed validation
    pub rejected: i64,
}

/// Payout target named by a `staking.payoutStakers` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayoutCall {
    pub validator_stash: PublicKey,
    pub era: Era,
}

/// Eras whose bounds are needed to date the rewards paid out at this height
pub fn payout_eras(raw: &RawHeight) -> BTreeSet<Era> {
    payout_calls(raw)
        .values()
        .flat_map(|calls| calls.iter().map(|c| c.era))
        .collect()
}

/// Builds every sequence record for `raw`.
///
/// `era_bounds` holds the stored bounds of past eras referenced by payouts.
/// Invalid individual records are dropped and counted in `rejected`; an
/// invalid block fails the whole height.
pub fn build(
    raw: &RawHeight,
    era_bounds: &HashMap<Era, EraSequence>,
) -> Result<BuiltSequences, IndexerError> {
    let block = &raw.block;
    if block.height < 0 {
        return Err(IndexerError::Validation(format!(
            "negative height {}",
            block.height
        )));
    }
    let sequence = Sequence::new(block.height, block.time);
    let mut built = BuiltSequences::default();

    let signed = raw.extrinsics.iter().filter(|e| e.is_signed).count() as i64;
    let total = raw.extrinsics.len() as i64;
    let block_seq = BlockSeq {
        sequence: sequence.clone(),
        extrinsics_count: total,
        extrinsics_signed_count: signed,
        extrinsics_unsigned_count: total - signed,
    };
    if !block_seq.valid() {
        return Err(IndexerError::Validation(format!(
            "invalid block record at height {}",
            block.height
        )));
    }
    built.block = Some(block_seq);

    for validator in &raw.validators {
        let seq = ValidatorSeq {
            sequence: sequence.clone(),
            stash_account: validator.stash.clone(),
            active_balance: validator.active_balance.clone(),
        };
        keep(
            &mut built.validators,
            seq,
            ValidatorSeq::valid,
            &mut built.rejected,
            "validator",
            block.height,
        );
    }

    for extrinsic in &raw.extrinsics {
        let seq = TransactionSeq {
            sequence: sequence.clone(),
            index: extrinsic.index,
            hash: extrinsic.hash.clone(),
            method: extrinsic.method.clone(),
            section: extrinsic.section.clone(),
            args: extrinsic.args.clone(),
        };
        keep(
            &mut built.transactions,
            seq,
            TransactionSeq::valid,
            &mut built.rejected,
            "transaction",
            block.height,
        );
    }

    for event in &raw.events {
        let seq = EventSeq {
            sequence: sequence.clone(),
            index: event.index,
            extrinsic_index: event.extrinsic_index,
            phase: event.phase.clone(),
            method: event.method.clone(),
            section: event.section.clone(),
            data: event.data.clone(),
        };
        keep(&mut built.events, seq, EventSeq::valid, &mut built.rejected, "event", block.height);
    }

    if block.last_in_session {
        let scope = SessionSequence::new(block.session, block.session_start_height, block.height);
        for validator in &raw.validators {
            let seq = ValidatorSessionSeq {
                session_sequence: scope.clone(),
                stash_account: validator.stash.clone(),
                online: validator.online,
            };
            keep(
                &mut built.validator_sessions,
                seq,
                ValidatorSessionSeq::valid,
                &mut built.rejected,
                "validator session",
                block.height,
            );
        }
    }

    let current_era = EraSequence::new(block.era, block.era_start_height, block.height);
    if block.last_in_era {
        build_era_records(raw, &current_era, &mut built);
    }

    build_rewards(raw, &current_era, era_bounds, &mut built);

    Ok(built)
}

fn build_era_records(raw: &RawHeight, scope: &EraSequence, built: &mut BuiltSequences) {
    let height = raw.block.height;
    for (index, validator) in raw.validators.iter().enumerate() {
        let stakers_stake = validator
            .stakers
            .iter()
            .fold(Quantity::zero(), |acc, s| &acc + &s.stake);

        let seq = ValidatorEraSeq {
            era_sequence: scope.clone(),
            index: index as i64,
            stash_account: validator.stash.clone(),
            controller_account: validator.controller.clone(),
            session_accounts: validator.session_accounts.clone(),
            total_stake: validator.total_stake.clone(),
            own_stake: validator.own_stake.clone(),
            stakers_stake,
            reward_points: validator.reward_points,
            commission: validator.commission,
            stakers_count: validator.stakers.len() as i64,
        };
        keep(
            &mut built.validator_eras,
            seq,
            ValidatorEraSeq::valid,
            &mut built.rejected,
            "validator era",
            height,
        );

        for staker in &validator.stakers {
            let seq = AccountEraSeq {
                era_sequence: scope.clone(),
                stash_account: staker.stash.clone(),
                controller_account: staker.controller.clone(),
                validator_stash_account: validator.stash.clone(),
                validator_controller_account: validator.controller.clone(),
                stake: staker.stake.clone(),
            };
            keep(
                &mut built.account_eras,
                seq,
                AccountEraSeq::valid,
                &mut built.rejected,
                "account era",
                height,
            );
        }
    }
}

fn build_rewards(
    raw: &RawHeight,
    current_era: &EraSequence,
    era_bounds: &HashMap<Era, EraSequence>,
    built: &mut BuiltSequences,
) {
    let height = raw.block.height;
    let payouts = payout_calls(raw);

    // Validators each account backs in the live set.
    let mut backing: HashMap<&PublicKey, Vec<&PublicKey>> = HashMap::new();
    for validator in &raw.validators {
        for staker in &validator.stakers {
            backing.entry(&staker.stash).or_default().push(&validator.stash);
        }
    }

    let mut matchers: HashMap<i64, PayoutMatcher<'_>> = payouts
        .iter()
        .map(|(index, calls)| (*index, PayoutMatcher::new(calls)))
        .collect();
    let mut rewards: Vec<RewardEraSeq> = Vec::new();

    for event in built.events.iter().filter(|e| e.is_reward()) {
        let (stash, amount) = match event.extract_reward() {
            Ok(reward) => reward,
            Err(e) => {
                logging::log_warning(&format!(
                    "Height {}: skipping reward event {}: {}",
                    height, event.index, e
                ));
                continue;
            }
        };
        let backed = backing.get(&stash).map(Vec::as_slice).unwrap_or_default();

        let call = matchers
            .get_mut(&event.extrinsic_index)
            .and_then(|m| m.resolve(&stash, backed));
        let (validator_stash, scope) = match call {
            Some(call) => {
                let scope = if call.era == current_era.era {
                    current_era.clone()
                } else {
                    era_bounds
                        .get(&call.era)
                        .cloned()
                        .unwrap_or_else(|| EraSequence::new(call.era, height, height))
                };
                (call.validator_stash.clone(), scope)
            }
            None => {
                let validator = backed.first().map(|v| (*v).clone());
                (validator.unwrap_or_else(|| stash.clone()), current_era.clone())
            }
        };

        let kind = if stash == validator_stash {
            RewardKind::Commission
        } else {
            RewardKind::Reward
        };

        let seq = RewardEraSeq {
            era_sequence: scope,
            stash_account: stash,
            validator_stash_account: validator_stash,
            amount,
            kind,
            claimed: true,
        };
        keep(&mut rewards, seq, RewardEraSeq::valid, &mut built.rejected, "reward era", height);
    }

    // One row per natural key; payouts landing on the same key add up.
    for reward in rewards {
        match built.reward_eras.iter_mut().find(|r| r.equal(&reward)) {
            Some(existing) => existing.amount = &existing.amount + &reward.amount,
            None => built.reward_eras.push(reward),
        }
    }
}

/// Assigns the reward events of one extrinsic to its payout calls in order
struct PayoutMatcher<'a> {
    calls: &'a [PayoutCall],
    paid: Vec<Vec<PublicKey>>,
}

impl<'a> PayoutMatcher<'a> {
    fn new(calls: &'a [PayoutCall]) -> Self {
        Self {
            calls,
            paid: vec![Vec::new(); calls.len()],
        }
    }

    /// The earliest call that has not paid `stash` yet, preferring one whose
    /// validator is `stash` itself or one of the validators it backs
    fn resolve(&mut self, stash: &PublicKey, backed: &[&PublicKey]) -> Option<&'a PayoutCall> {
        let open: Vec<usize> = (0..self.calls.len())
            .filter(|i| !self.paid[*i].contains(stash))
            .collect();
        let index = open
            .iter()
            .copied()
            .find(|i| {
                let validator = &self.calls[*i].validator_stash;
                validator == stash || backed.contains(&validator)
            })
            .or_else(|| open.first().copied())
            .or_else(|| self.calls.len().checked_sub(1))?;
        self.paid[index].push(stash.clone());
        self.calls.get(index)
    }
}

/// Payout calls of this height keyed by extrinsic index, in call order.
///
/// Calls wrapped in `utility` batches are unpacked.
fn payout_calls(raw: &RawHeight) -> HashMap<i64, Vec<PayoutCall>> {
    let mut calls = HashMap::new();
    for extrinsic in &raw.extrinsics {
        let mut found = Vec::new();
        collect_payouts(&extrinsic.section, &extrinsic.method, &extrinsic.args, &mut found);
        if !found.is_empty() {
            calls.insert(extrinsic.index, found);
        }
    }
    calls
}

fn collect_payouts(section: &str, method: &str, args: &Value, into: &mut Vec<PayoutCall>) {
    if section == PAYOUT_SECTION && PAYOUT_METHODS.contains(&method) {
        if let Some(call) = parse_payout_args(args) {
            into.push(call);
        }
        return;
    }
    if section != BATCH_SECTION || !BATCH_METHODS.contains(&method) {
        return;
    }
    let Some(inner) = args.get("calls").and_then(Value::as_array) else {
        return;
    };
    for call in inner {
        let section = call
            .get("section")
            .or_else(|| call.get("module"))
            .and_then(Value::as_str);
        let method = call
            .get("method")
            .or_else(|| call.get("call"))
            .and_then(Value::as_str);
        if let (Some(section), Some(method)) = (section, method) {
            let args = call.get("args").unwrap_or(&Value::Null);
            collect_payouts(section, method, args, into);
        }
    }
}

fn parse_payout_args(args: &Value) -> Option<PayoutCall> {
    let validator_stash = args
        .get("validator_stash")
        .or_else(|| args.get("validatorStash"))
        .and_then(Value::as_str)?;
    let era = match args.get("era")? {
        Value::Number(n) => n.as_i64()?,
        Value::String(s) => s.parse().ok()?,
        _ => return None,
    };
    Some(PayoutCall {
        validator_stash: PublicKey(validator_stash.to_string()),
        era,
    })
}

/// Fails when a closing height is missing part of its era or session records.
///
/// Every validator of the active set must have its era row at `last_in_era`
/// and its session row at `last_in_session`.
pub fn check_boundaries(raw: &RawHeight, built: &BuiltSequences) -> Result<(), IndexerError> {
    let block = &raw.block;
    if block.last_in_era {
        let scope = EraSequence::new(block.era, block.era_start_height, block.height);
        if !scope.valid() {
            return Err(IndexerError::invariant(
                block.height,
                format!("era {} closes with invalid bounds", block.era),
            ));
        }
        if let Some(missing) = raw
            .validators
            .iter()
            .find(|v| !built.validator_eras.iter().any(|e| e.stash_account == v.stash))
        {
            return Err(IndexerError::invariant(
                block.height,
                format!("era {} is incomplete: no era record for {}", block.era, missing.stash),
            ));
        }
    }
    if block.last_in_session {
        if let Some(missing) = raw
            .validators
            .iter()
            .find(|v| !built.validator_sessions.iter().any(|s| s.stash_account == v.stash))
        {
            return Err(IndexerError::invariant(
                block.height,
                format!(
                    "session {} is incomplete: no session record for {}",
                    block.session, missing.stash
                ),
            ));
        }
    }
    Ok(())
}

/// Aggregate contributions of one height.
///
/// Every active validator is observed at the height. At a session boundary
/// the uptime counters carry the difference to `previous_sessions`, the rows
/// already stored for the same session, so replaying a height adds nothing.
pub fn observations(
    built: &BuiltSequences,
    previous_sessions: &HashMap<PublicKey, ValidatorSessionSeq>,
) -> Vec<ValidatorObservation> {
    let Some(block) = &built.block else {
        return Vec::new();
    };
    let sessions: HashMap<&PublicKey, &ValidatorSessionSeq> = built
        .validator_sessions
        .iter()
        .map(|s| (&s.stash_account, s))
        .collect();

    let mut stashes: Vec<&PublicKey> = built.validators.iter().map(|v| &v.stash_account).collect();
    for stash in sessions.keys() {
        if !stashes.contains(stash) {
            stashes.push(stash);
        }
    }

    stashes
        .into_iter()
        .map(|stash| {
            let (uptime_delta, uptime_count_delta) = match sessions.get(stash) {
                Some(session) => {
                    let online = i64::from(session.online);
                    match previous_sessions.get(stash) {
                        Some(previous) => (online - i64::from(previous.online), 0),
                        None => (online, 1),
                    }
                }
                None => (0, 0),
            };
            ValidatorObservation {
                stash_account: stash.clone(),
                height: block.sequence.height,
                time: block.sequence.time,
                as_validator: true,
                uptime_delta,
                uptime_count_delta,
            }
        })
        .collect()
}

fn keep<T>(
    into: &mut Vec<T>,
    record: T,
    valid: fn(&T) -> bool,
    rejected: &mut i64,
    what: &str,
    height: Height,
) {
    if valid(&record) {
        into.push(record);
    } else {
        *rejected += 1;
        logging::log_warning(&format!("Height {}: rejected invalid {} record", height, what));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{RawBlock, RawEvent, RawExtrinsic, RawStaker, RawValidator};
    use crate::domain::types::Hash;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn key(s: &str) -> PublicKey {
        PublicKey(s.to_string())
    }

    fn raw(last_in_session: bool, last_in_era: bool) -> RawHeight {
        RawHeight {
            block: RawBlock {
                height: 50,
                time: Utc.timestamp_opt(1_600_000_300, 0).unwrap(),
                hash: Hash("0x32".into()),
                spec_version: "9000".into(),
                chain_uid: "testchain".into(),
                session: 4,
                era: 2,
                last_in_session,
                last_in_era,
                session_start_height: 41,
                era_start_height: 31,
            },
            validators: vec![RawValidator {
                stash: key("V1"),
                controller: key("C1"),
                session_accounts: vec![key("S1")],
                total_stake: Quantity::from(300i64),
                own_stake: Quantity::from(100i64),
                active_balance: Quantity::from(300i64),
                reward_points: 20,
                commission: 10_000_000,
                online: true,
                stakers: vec![
                    RawStaker {
                        stash: key("N1"),
                        controller: key("NC1"),
                        stake: Quantity::from(150i64),
                    },
                    RawStaker {
                        stash: key("N2"),
                        controller: key("NC2"),
                        stake: Quantity::from(50i64),
                    },
                ],
            }],
            events: vec![],
            extrinsics: vec![
                RawExtrinsic {
                    index: 0,
                    hash: Hash("0xaa".into()),
                    method: "set".into(),
                    section: "timestamp".into(),
                    args: json!({}),
                    is_signed: false,
                },
                RawExtrinsic {
                    index: 1,
                    hash: Hash("0xbb".into()),
                    method: "transfer".into(),
                    section: "balances".into(),
                    args: json!({}),
                    is_signed: true,
                },
            ],
        }
    }

    #[test]
    fn plain_height_builds_per_height_records_only() {
        let built = build(&raw(false, false), &HashMap::new()).unwrap();
        let block = built.block.unwrap();
        assert_eq!(block.extrinsics_count, 2);
        assert_eq!(block.extrinsics_signed_count, 1);
        assert_eq!(block.extrinsics_unsigned_count, 1);
        assert_eq!(built.validators.len(), 1);
        assert_eq!(built.transactions.len(), 2);
        assert!(built.validator_eras.is_empty());
        assert!(built.validator_sessions.is_empty());
        assert_eq!(built.rejected, 0);
    }

    #[test]
    fn era_boundary_builds_era_records() {
        let built = build(&raw(true, true), &HashMap::new()).unwrap();
        assert_eq!(built.validator_sessions.len(), 1);
        assert_eq!(built.validator_sessions[0].session_sequence, SessionSequence::new(4, 41, 50));

        assert_eq!(built.validator_eras.len(), 1);
        let era = &built.validator_eras[0];
        assert_eq!(era.era_sequence, EraSequence::new(2, 31, 50));
        assert_eq!(era.stakers_stake, Quantity::from(200i64));
        assert_eq!(era.stakers_count, 2);
        assert_eq!(built.account_eras.len(), 2);
    }

    #[test]
    fn negative_balance_is_rejected_not_fatal() {
        let mut data = raw(false, false);
        data.validators[0].active_balance = Quantity::from(-5i64);
        let built = build(&data, &HashMap::new()).unwrap();
        assert!(built.validators.is_empty());
        assert_eq!(built.rejected, 1);
    }

    #[test]
    fn reward_event_uses_payout_call_for_era_and_validator() {
        let mut data = raw(false, false);
        data.extrinsics.push(RawExtrinsic {
            index: 2,
            hash: Hash("0xcc".into()),
            method: "payoutStakers".into(),
            section: "staking".into(),
            args: json!({"validator_stash": "V1", "era": 1}),
            is_signed: true,
        });
        data.events = vec![
            RawEvent {
                index: 0,
                extrinsic_index: 2,
                phase: "ApplyExtrinsic".into(),
                method: "Reward".into(),
                section: "staking".into(),
                data: json!([
                    {"name": "AccountId", "value": "N1"},
                    {"name": "Balance", "value": "12"}
                ]),
            },
            RawEvent {
                index: 1,
                extrinsic_index: 2,
                phase: "ApplyExtrinsic".into(),
                method: "Reward".into(),
                section: "staking".into(),
                data: json!([
                    {"name": "AccountId", "value": "V1"},
                    {"name": "Balance", "value": "30"}
                ]),
            },
            RawEvent {
                index: 2,
                extrinsic_index: 2,
                phase: "ApplyExtrinsic".into(),
                method: "Reward".into(),
                section: "staking".into(),
                data: json!([{"name": "Balance", "value": "30"}]),
            },
        ];
        assert_eq!(payout_eras(&data).into_iter().collect::<Vec<_>>(), vec![1]);

        let mut bounds = HashMap::new();
        bounds.insert(1, EraSequence::new(1, 11, 30));
        let built = build(&data, &bounds).unwrap();

        assert_eq!(built.reward_eras.len(), 2);
        let nominator = &built.reward_eras[0];
        assert_eq!(nominator.kind, RewardKind::Reward);
        assert_eq!(nominator.validator_stash_account, key("V1"));
        assert_eq!(nominator.era_sequence, EraSequence::new(1, 11, 30));
        assert_eq!(built.reward_eras[1].kind, RewardKind::Commission);
    }

    fn reward(index: i64, extrinsic_index: i64, stash: &str, amount: &str) -> RawEvent {
        RawEvent {
            index,
            extrinsic_index,
            phase: "ApplyExtrinsic".into(),
            method: "Reward".into(),
            section: "staking".into(),
            data: json!([
                {"name": "AccountId", "value": stash},
                {"name": "Balance", "value": amount}
            ]),
        }
    }

    #[test]
    fn batched_payouts_are_matched_to_their_calls() {
        let mut data = raw(false, false);
        data.extrinsics.push(RawExtrinsic {
            index: 2,
            hash: Hash("0xdd".into()),
            method: "batch".into(),
            section: "utility".into(),
            args: json!({"calls": [
                {"section": "staking", "method": "payoutStakers",
                 "args": {"validator_stash": "V1", "era": 1}},
                {"section": "staking", "method": "payoutStakers",
                 "args": {"validator_stash": "V2", "era": 1}}
            ]}),
            is_signed: true,
        });
        data.events = vec![reward(0, 2, "N1", "40"), reward(1, 2, "N1", "70")];
        assert_eq!(payout_eras(&data).into_iter().collect::<Vec<_>>(), vec![1]);

        let mut bounds = HashMap::new();
        bounds.insert(1, EraSequence::new(1, 11, 30));
        let built = build(&data, &bounds).unwrap();

        assert_eq!(built.reward_eras.len(), 2);
        for row in &built.reward_eras {
            assert_eq!(row.stash_account, key("N1"));
            assert_eq!(row.era_sequence, EraSequence::new(1, 11, 30));
            assert_eq!(row.kind, RewardKind::Reward);
        }
        assert_eq!(built.reward_eras[0].validator_stash_account, key("V1"));
        assert_eq!(built.reward_eras[0].amount, Quantity::from(40i64));
        assert_eq!(built.reward_eras[1].validator_stash_account, key("V2"));
        assert_eq!(built.reward_eras[1].amount, Quantity::from(70i64));
    }

    #[test]
    fn rewards_sharing_a_key_are_summed() {
        let mut data = raw(false, false);
        data.events = vec![reward(0, 1, "N1", "40"), reward(1, 1, "N1", "70")];

        let built = build(&data, &HashMap::new()).unwrap();
        assert_eq!(built.reward_eras.len(), 1);
        let row = &built.reward_eras[0];
        assert_eq!(row.validator_stash_account, key("V1"));
        assert_eq!(row.era_sequence.era, 2);
        assert_eq!(row.amount, Quantity::from(110i64));
    }

    #[test]
    fn closing_era_with_rejected_validator_breaks_invariant() {
        let data = raw(true, true);
        let built = build(&data, &HashMap::new()).unwrap();
        assert!(check_boundaries(&data, &built).is_ok());

        let mut bad = raw(false, true);
        bad.validators[0].total_stake = Quantity::from(-1i64);
        let built = build(&bad, &HashMap::new()).unwrap();
        assert_eq!(built.rejected, 1);
        let err = check_boundaries(&bad, &built).unwrap_err();
        assert!(matches!(err, IndexerError::Invariant { height: 50, .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn replayed_session_boundary_contributes_no_uptime() {
        let built = build(&raw(true, false), &HashMap::new()).unwrap();

        let first = observations(&built, &HashMap::new());
        assert_eq!(first.len(), 1);
        assert_eq!((first[0].uptime_delta, first[0].uptime_count_delta), (1, 1));

        let mut stored = HashMap::new();
        stored.insert(key("V1"), built.validator_sessions[0].clone());
        let replay = observations(&built, &stored);
        assert_eq!((replay[0].uptime_delta, replay[0].uptime_count_delta), (0, 0));
    }
}
