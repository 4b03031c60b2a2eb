//! Hourly and daily rollups.
//!
//! Everything here is a pure function of the rows in one bucket, so a bucket
//! can be recomputed and overwritten whenever any of its heights changes.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};

use crate::domain::models::{
    BlockSeq, BlockSummary, Summary, SummarySet, TimeInterval, ValidatorSeq,
    ValidatorSessionSeq, ValidatorSessionSeqSummary, ValidatorSummary,
};
use crate::domain::types::{PublicKey, Quantity};

/// Buckets touched by a run that still have to be recomputed.
///
/// Heights of a forward run arrive in time order, so a bucket whose window
/// ends at or before the latest committed block time receives no more rows
/// from that run and can be recomputed once.
#[derive(Debug, Default)]
pub struct PendingBuckets {
    buckets: BTreeSet<(TimeInterval, DateTime<Utc>)>,
    latest: Option<DateTime<Utc>>,
}

impl PendingBuckets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<I>(&mut self, times: I)
    where
        I: IntoIterator<Item = DateTime<Utc>>,
    {
        for time in times {
            self.latest = Some(self.latest.map_or(time, |latest| latest.max(time)));
            for interval in TimeInterval::ALL {
                self.buckets.insert((interval, interval.bucket(time)));
            }
        }
    }

    /// Removes and returns the buckets the run has moved past
    pub fn take_closed(&mut self) -> Vec<(TimeInterval, DateTime<Utc>)> {
        let Some(latest) = self.latest else {
            return Vec::new();
        };
        let closed: Vec<_> = self
            .buckets
            .iter()
            .filter(|(interval, bucket)| *bucket + interval.duration() <= latest)
            .copied()
            .collect();
        for bucket in &closed {
            self.buckets.remove(bucket);
        }
        closed
    }

    /// Removes and returns every pending bucket
    pub fn take_all(&mut self) -> Vec<(TimeInterval, DateTime<Utc>)> {
        std::mem::take(&mut self.buckets).into_iter().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

/// Builds all summaries of one bucket from the rows stored in it
pub fn summarize(
    summary: &Summary,
    blocks: &[BlockSeq],
    validators: &[ValidatorSeq],
    sessions: &[ValidatorSessionSeq],
) -> SummarySet {
    SummarySet {
        time_interval: summary.time_interval,
        time_bucket: summary.time_bucket,
        block: summarize_blocks(summary, blocks),
        validators: summarize_validators(summary, validators),
        validator_sessions: summarize_sessions(summary, sessions),
    }
}

pub fn summarize_blocks(summary: &Summary, blocks: &[BlockSeq]) -> Option<BlockSummary> {
    if blocks.is_empty() {
        return None;
    }
    let count = blocks.len() as i64;
    let total: i64 = blocks.iter().map(|b| b.extrinsics_count).sum();
    let signed: i64 = blocks.iter().map(|b| b.extrinsics_signed_count).sum();

    Some(BlockSummary {
        summary: summary.clone(),
        count,
        extrinsics_min: blocks.iter().map(|b| b.extrinsics_count).min().unwrap_or(0),
        extrinsics_avg: total as f64 / count as f64,
        extrinsics_max: blocks.iter().map(|b| b.extrinsics_count).max().unwrap_or(0),
        extrinsics_signed_avg: signed as f64 / count as f64,
    })
}

pub fn summarize_validators(
    summary: &Summary,
    validators: &[ValidatorSeq],
) -> Vec<ValidatorSummary> {
    let mut by_stash: BTreeMap<&str, Vec<&Quantity>> = BTreeMap::new();
    for validator in validators {
        by_stash
            .entry(validator.stash_account.0.as_str())
            .or_default()
            .push(&validator.active_balance);
    }

    by_stash
        .into_iter()
        .filter_map(|(stash, balances)| {
            let min = balances.iter().min()?;
            let max = balances.iter().max()?;
            let total = balances
                .iter()
                .fold(Quantity::zero(), |acc, b| &acc + *b);
            let avg = total.div_floor(balances.len() as u64)?;
            Some(ValidatorSummary {
                summary: summary.clone(),
                stash_account: PublicKey(stash.to_string()),
                count: balances.len() as i64,
                active_balance_min: (*min).clone(),
                active_balance_avg: avg,
                active_balance_max: (*max).clone(),
            })
        })
        .collect()
}

pub fn summarize_sessions(
    summary: &Summary,
    sessions: &[ValidatorSessionSeq],
) -> Vec<ValidatorSessionSeqSummary> {
    let mut by_stash: BTreeMap<&str, Vec<bool>> = BTreeMap::new();
    for session in sessions {
        by_stash
            .entry(session.stash_account.0.as_str())
            .or_default()
            .push(session.online);
    }

    by_stash
        .into_iter()
        .map(|(stash, online)| {
            let count = online.len() as i64;
            let online_count = online.iter().filter(|o| **o).count() as i64;
            let all_online = online_count == count;
            let any_online = online_count > 0;
            ValidatorSessionSeqSummary {
                summary: summary.clone(),
                stash_account: PublicKey(stash.to_string()),
                count,
                online_count,
                uptime_min: if all_online { 1.0 } else { 0.0 },
                uptime_avg: online_count as f64 / count as f64,
                uptime_max: if any_online { 1.0 } else { 0.0 },
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{Sequence, SessionSequence};
    use chrono::TimeZone;

    fn hour() -> Summary {
        Summary::new(1, TimeInterval::Hour, Utc.timestamp_opt(1_600_002_000, 0).unwrap())
    }

    fn block(height: i64, extrinsics: i64, signed: i64) -> BlockSeq {
        BlockSeq {
            sequence: Sequence::new(height, Utc.timestamp_opt(1_600_002_000 + height, 0).unwrap()),
            extrinsics_count: extrinsics,
            extrinsics_signed_count: signed,
            extrinsics_unsigned_count: extrinsics - signed,
        }
    }

    #[test]
    fn buckets_cover_hour_and_day() {
        let t = Utc.timestamp_opt(1_600_002_345, 0).unwrap();
        let mut pending = PendingBuckets::new();
        pending.add(vec![t, t]);
        let buckets = pending.take_all();
        assert_eq!(buckets.len(), 2);
        let hour_start = Utc.timestamp_opt(1_600_002_000, 0).unwrap();
        let day_start = Utc.timestamp_opt(1_599_955_200, 0).unwrap();
        assert!(buckets.contains(&(TimeInterval::Hour, hour_start)));
        assert!(buckets.contains(&(TimeInterval::Day, day_start)));
    }

    #[test]
    fn pending_buckets_close_once_the_run_moves_past_them() {
        let mut pending = PendingBuckets::new();
        pending.add(vec![
            Utc.timestamp_opt(1_600_002_000, 0).unwrap(),
            Utc.timestamp_opt(1_600_003_000, 0).unwrap(),
        ]);
        assert!(pending.take_closed().is_empty());

        pending.add(vec![Utc.timestamp_opt(1_600_005_600, 0).unwrap()]);
        let closed = pending.take_closed();
        assert_eq!(
            closed,
            vec![(TimeInterval::Hour, Utc.timestamp_opt(1_600_002_000, 0).unwrap())]
        );
        assert!(pending.take_closed().is_empty());

        let rest = pending.take_all();
        assert_eq!(rest.len(), 2);
        assert!(rest.contains(&(TimeInterval::Hour, Utc.timestamp_opt(1_600_005_600, 0).unwrap())));
        assert!(rest.contains(&(TimeInterval::Day, Utc.timestamp_opt(1_599_955_200, 0).unwrap())));
        assert!(pending.is_empty());
    }

    #[test]
    fn block_statistics() {
        let blocks = [block(1, 2, 1), block(2, 6, 3), block(3, 4, 2)];
        let summary = summarize_blocks(&hour(), &blocks).unwrap();
        assert_eq!(summary.count, 3);
        assert_eq!(summary.extrinsics_min, 2);
        assert_eq!(summary.extrinsics_max, 6);
        assert!((summary.extrinsics_avg - 4.0).abs() < f64::EPSILON);
        assert!((summary.extrinsics_signed_avg - 2.0).abs() < f64::EPSILON);
        assert!(summarize_blocks(&hour(), &[]).is_none());
    }

    #[test]
    fn validator_balances_use_integer_mean_and_ignore_order() {
        let seq = |height: i64, stash: &str, balance: i64| ValidatorSeq {
            sequence: Sequence::new(height, Utc.timestamp_opt(1_600_002_000 + height, 0).unwrap()),
            stash_account: PublicKey(stash.into()),
            active_balance: Quantity::from(balance),
        };
        let rows = vec![seq(1, "B", 10), seq(1, "A", 3), seq(2, "A", 4), seq(2, "B", 11)];
        let mut reversed = rows.clone();
        reversed.reverse();

        let summaries = summarize_validators(&hour(), &rows);
        assert_eq!(summaries, summarize_validators(&hour(), &reversed));
        assert_eq!(summaries[0].stash_account, PublicKey("A".into()));
        assert_eq!(summaries[0].active_balance_avg, Quantity::from(3i64));
        assert_eq!(summaries[1].active_balance_min, Quantity::from(10i64));
        assert_eq!(summaries[1].active_balance_max, Quantity::from(11i64));
    }

    #[test]
    fn session_uptime() {
        let session = |n: i64, online: bool| ValidatorSessionSeq {
            session_sequence: SessionSequence::new(n, n * 10, n * 10 + 9),
            stash_account: PublicKey("V".into()),
            online,
        };
        let summaries = summarize_sessions(&hour(), &[session(1, true), session(2, false)]);
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].online_count, 1);
        assert!((summaries[0].uptime_avg - 0.5).abs() < f64::EPSILON);
        assert_eq!(summaries[0].uptime_min, 0.0);
        assert_eq!(summaries[0].uptime_max, 1.0);
    }
}
