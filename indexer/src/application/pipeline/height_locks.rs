use tokio::sync::{Mutex, MutexGuard};

use crate::domain::types::Height;

const DEFAULT_SHARDS: usize = 64;

/// Serializes work on the same height across concurrent runs.
///
/// Heights map onto a fixed set of mutexes; two heights sharing a shard also
/// wait for each other, which only costs throughput.
#[derive(Debug)]
pub struct HeightLocks {
    shards: Vec<Mutex<()>>,
}

impl HeightLocks {
    pub fn new(shards: usize) -> Self {
        let shards = shards.max(1);
        Self {
            shards: (0..shards).map(|_| Mutex::new(())).collect(),
        }
    }

    pub async fn lock(&self, height: Height) -> MutexGuard<'_, ()> {
        let shard = height.rem_euclid(self.shards.len() as i64) as usize;
        self.shards[shard].lock().await
    }
}

impl Default for HeightLocks {
    fn default() -> Self {
        Self::new(DEFAULT_SHARDS)
    }
}
