//! Scope traits composed into every record.
//!
//! Each record type holds exactly one of these as a named field and forwards
//! `valid()` / `equal()` to it.

use chrono::{DateTime, Duration, DurationRound, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::types::{Era, Height, Session};

/// Unix epoch is treated as the "zero" time
pub fn is_zero_time(time: &DateTime<Utc>) -> bool {
    time.timestamp() == 0 && time.timestamp_subsec_nanos() == 0
}

/// Identifies one raw-entity record at a block height
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sequence {
    pub height: Height,
    pub time: DateTime<Utc>,
}

impl Sequence {
    pub fn new(height: Height, time: DateTime<Utc>) -> Self {
        Self { height, time }
    }

    pub fn valid(&self) -> bool {
        self.height >= 0 && !is_zero_time(&self.time)
    }

    pub fn equal(&self, other: &Sequence) -> bool {
        self.height == other.height && self.time == other.time
    }
}

/// Identifies a record scoped to one session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSequence {
    pub session: Session,
    pub start_height: Height,
    pub end_height: Height,
}

impl SessionSequence {
    pub fn new(session: Session, start_height: Height, end_height: Height) -> Self {
        Self {
            session,
            start_height,
            end_height,
        }
    }

    pub fn valid(&self) -> bool {
        self.session >= 0
            && self.start_height >= 0
            && self.end_height >= 0
            && self.start_height <= self.end_height
    }

    pub fn equal(&self, other: &SessionSequence) -> bool {
        self.session == other.session
            && self.start_height == other.start_height
            && self.end_height == other.end_height
    }
}

/// Identifies a record scoped to one era
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EraSequence {
    pub era: Era,
    pub start_height: Height,
    pub end_height: Height,
}

impl EraSequence {
    pub fn new(era: Era, start_height: Height, end_height: Height) -> Self {
        Self {
            era,
            start_height,
            end_height,
        }
    }

    pub fn valid(&self) -> bool {
        self.era >= 0
            && self.start_height >= 0
            && self.end_height >= 0
            && self.start_height <= self.end_height
    }

    pub fn equal(&self, other: &EraSequence) -> bool {
        self.era == other.era
            && self.start_height == other.start_height
            && self.end_height == other.end_height
    }
}

/// Running fold over many heights
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aggregate {
    pub started_at_height: Height,
    pub started_at: DateTime<Utc>,
    pub recent_at_height: Height,
    pub recent_at: DateTime<Utc>,
}

impl Aggregate {
    pub fn new(height: Height, time: DateTime<Utc>) -> Self {
        Self {
            started_at_height: height,
            started_at: time,
            recent_at_height: height,
            recent_at: time,
        }
    }

    pub fn valid(&self) -> bool {
        self.started_at_height >= 0
            && !is_zero_time(&self.started_at)
            && self.recent_at_height >= self.started_at_height
    }

    /// Recent fields only ever move forward, start fields only ever move back
    pub fn merge(&mut self, height: Height, time: DateTime<Utc>) {
        if height > self.recent_at_height {
            self.recent_at_height = height;
        }
        if time > self.recent_at {
            self.recent_at = time;
        }
        if height < self.started_at_height {
            self.started_at_height = height;
        }
        if time < self.started_at {
            self.started_at = time;
        }
    }
}

/// Rollup window granularity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeInterval {
    Hour,
    Day,
}

impl TimeInterval {
    pub const ALL: [TimeInterval; 2] = [TimeInterval::Hour, TimeInterval::Day];

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeInterval::Hour => "hour",
            TimeInterval::Day => "day",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "hour" => Some(TimeInterval::Hour),
            "day" => Some(TimeInterval::Day),
            _ => None,
        }
    }

    pub fn duration(&self) -> Duration {
        match self {
            TimeInterval::Hour => Duration::hours(1),
            TimeInterval::Day => Duration::days(1),
        }
    }

    /// Start of the bucket `time` falls in
    pub fn bucket(&self, time: DateTime<Utc>) -> DateTime<Utc> {
        time.duration_trunc(self.duration()).unwrap_or(time)
    }
}

/// Identifies one rollup window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub index_version: i64,
    pub time_interval: TimeInterval,
    pub time_bucket: DateTime<Utc>,
}

impl Summary {
    pub fn new(
        index_version: i64,
        time_interval: TimeInterval,
        time_bucket: DateTime<Utc>,
    ) -> Self {
        Self {
            index_version,
            time_interval,
            time_bucket,
        }
    }

    pub fn valid(&self) -> bool {
        self.index_version >= 0 && !is_zero_time(&self.time_bucket)
    }

    pub fn equal(&self, other: &Summary) -> bool {
        self.time_interval == other.time_interval && self.time_bucket == other.time_bucket
    }

    /// Exclusive end of the window
    pub fn bucket_end(&self) -> DateTime<Utc> {
        self.time_bucket + self.time_interval.duration()
    }
}
