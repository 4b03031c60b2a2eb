#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde_json::json;
use tokio::sync::watch;

use staking_indexer::application::{HeightLocks, Pipeline};
use staking_indexer::config::{IndexerConfig, Schedule};
use staking_indexer::domain::models::{
    RawBlock, RawEvent, RawExtrinsic, RawHeight, RawStaker, RawValidator,
};
use staking_indexer::domain::types::{Hash, Height, PublicKey, Quantity};
use staking_indexer::infrastructure::persistence::MemoryStore;
use staking_indexer::infrastructure::source::{BlockSource, SourceError};

pub const SESSION_LENGTH: i64 = 4;
pub const ERA_LENGTH: i64 = 8;

pub fn key(s: &str) -> PublicKey {
    PublicKey(s.to_string())
}

fn staker(stash: &str, stake: i64) -> RawStaker {
    RawStaker {
        stash: key(stash),
        controller: key(&format!("{}-ctrl", stash)),
        stake: Quantity::from(stake),
    }
}

fn validator(
    stash: &str,
    active_balance: i64,
    commission: i64,
    online: bool,
    stakers: Vec<RawStaker>,
) -> RawValidator {
    let stakers_total: i64 = stakers.iter().map(|s| s.stake.to_f64() as i64).sum();
    RawValidator {
        stash: key(stash),
        controller: key(&format!("{}-ctrl", stash)),
        session_accounts: vec![key(&format!("{}-session", stash))],
        total_stake: Quantity::from(active_balance + stakers_total),
        own_stake: Quantity::from(active_balance),
        active_balance: Quantity::from(active_balance),
        reward_points: 20,
        commission,
        online,
        stakers,
    }
}

/// Deterministic chain data: sessions of 4 heights, eras of 8, ten minutes per height
pub fn raw_height(height: Height) -> RawHeight {
    let session = height / SESSION_LENGTH;
    let era = height / ERA_LENGTH;

    let mut v1_stakers = vec![staker("N1", 300)];
    if era % 2 == 0 {
        v1_stakers.push(staker("N2", 100));
    }
    let mut validators = vec![
        validator("V1", 1000 + (height % 5) * 20, 10_000_000 * (1 + era % 2), true, v1_stakers),
        validator("V2", 5000, 50_000_000, session % 3 != 0, vec![staker("N3", 700)]),
    ];
    if era % 2 == 1 {
        validators.push(validator("V3", 2000, 0, session % 2 == 0, vec![]));
    }

    let mut extrinsics = vec![RawExtrinsic {
        index: 0,
        hash: Hash(format!("0x{:08x}00", height)),
        method: "set".into(),
        section: "timestamp".into(),
        args: json!({ "now": height }),
        is_signed: false,
    }];
    let mut events = vec![RawEvent {
        index: 0,
        extrinsic_index: 0,
        phase: "ApplyExtrinsic".into(),
        method: "ExtrinsicSuccess".into(),
        section: "system".into(),
        data: json!([]),
    }];
    if height % ERA_LENGTH == 2 && era > 0 {
        extrinsics.push(RawExtrinsic {
            index: 1,
            hash: Hash(format!("0x{:08x}01", height)),
            method: "payoutStakers".into(),
            section: "staking".into(),
            args: json!({ "validator_stash": "V1", "era": era - 1 }),
            is_signed: true,
        });
        for (index, (stash, amount)) in [("N1", "40"), ("V1", "15")].into_iter().enumerate() {
            events.push(RawEvent {
                index: index as i64 + 1,
                extrinsic_index: 1,
                phase: "ApplyExtrinsic".into(),
                method: "Reward".into(),
                section: "staking".into(),
                data: json!([
                    { "name": "AccountId", "value": stash },
                    { "name": "Balance", "value": amount }
                ]),
            });
        }
    }

    RawHeight {
        block: RawBlock {
            height,
            time: Utc.timestamp_opt(1_600_000_000 + height * 600, 0).unwrap(),
            hash: Hash(format!("0x{:08x}", height)),
            spec_version: "9000".into(),
            chain_uid: "testchain".into(),
            session,
            era,
            last_in_session: height % SESSION_LENGTH == SESSION_LENGTH - 1,
            last_in_era: height % ERA_LENGTH == ERA_LENGTH - 1,
            session_start_height: session * SESSION_LENGTH,
            era_start_height: era * ERA_LENGTH,
        },
        validators,
        events,
        extrinsics,
    }
}

/// In-memory block source serving `raw_height` up to a fixed head
pub struct ScriptedSource {
    heights: Mutex<BTreeMap<Height, RawHeight>>,
    head: Mutex<Height>,
    failing: Mutex<HashSet<Height>>,
    cancel_after: Mutex<Option<(Height, Arc<watch::Sender<bool>>)>>,
}

impl ScriptedSource {
    pub fn new(head: Height) -> Self {
        Self {
            heights: Mutex::new(BTreeMap::new()),
            head: Mutex::new(head),
            failing: Mutex::new(HashSet::new()),
            cancel_after: Mutex::new(None),
        }
    }

    pub fn set_head(&self, head: Height) {
        *self.head.lock().unwrap() = head;
    }

    /// Serve `raw` instead of the generated data for its height
    pub fn replace(&self, raw: RawHeight) {
        self.heights.lock().unwrap().insert(raw.block.height, raw);
    }

    /// Every fetch of `height` times out
    pub fn fail_at(&self, height: Height) {
        self.failing.lock().unwrap().insert(height);
    }

    pub fn heal(&self, height: Height) {
        self.failing.lock().unwrap().remove(&height);
    }

    /// Raise the shutdown signal once `height` has been fetched
    pub fn cancel_after(&self, height: Height, shutdown: Arc<watch::Sender<bool>>) {
        *self.cancel_after.lock().unwrap() = Some((height, shutdown));
    }
}

#[async_trait]
impl BlockSource for ScriptedSource {
    async fn chain_head(&self) -> Result<Height, SourceError> {
        Ok(*self.head.lock().unwrap())
    }

    async fn get_height(&self, height: Height) -> Result<RawHeight, SourceError> {
        if height > *self.head.lock().unwrap() {
            return Err(SourceError::NotFound(height));
        }
        if self.failing.lock().unwrap().contains(&height) {
            return Err(SourceError::Transient(format!("timeout fetching {}", height)));
        }
        if let Some((at, shutdown)) = self.cancel_after.lock().unwrap().as_ref() {
            if *at == height {
                let _ = shutdown.send(true);
            }
        }
        let raw = self.heights.lock().unwrap().get(&height).cloned();
        Ok(raw.unwrap_or_else(|| raw_height(height)))
    }
}

pub fn test_config(first_block_height: Height) -> IndexerConfig {
    IndexerConfig {
        pipeline_batch_size: 2,
        first_block_height,
        cleanup_threshold: 1000,
        processing_interval: Schedule::every(Duration::from_millis(20)),
        cleanup_interval: Schedule::every(Duration::from_millis(20)),
        index_version: 1,
        reindex_workers: 3,
        max_retries: 1,
        retry_base_delay_ms: 1,
        missed_sessions_threshold: 2,
    }
}

pub struct Harness {
    pub source: Arc<ScriptedSource>,
    pub store: Arc<MemoryStore>,
    pub pipeline: Pipeline,
    pub shutdown: Arc<watch::Sender<bool>>,
}

impl Harness {
    pub fn new(config: &IndexerConfig, head: Height) -> Self {
        let source = Arc::new(ScriptedSource::new(head));
        let store = Arc::new(MemoryStore::new());
        let (shutdown, shutdown_rx) = watch::channel(false);
        let pipeline = Pipeline::new(
            config,
            source.clone(),
            store.clone(),
            Arc::new(HeightLocks::default()),
            shutdown_rx,
        );
        Self {
            source,
            store,
            pipeline,
            shutdown: Arc::new(shutdown),
        }
    }
}
