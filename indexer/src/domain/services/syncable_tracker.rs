//! Per-height progress tracking

use std::sync::Arc;

use chrono::Utc;

use crate::domain::errors::IndexerError;
use crate::domain::models::{RawBlock, Syncable, SyncableStatus};
use crate::infrastructure::persistence::{DbError, Store};

/// Creates and finalizes syncables
#[derive(Clone)]
pub struct SyncableTracker {
    store: Arc<dyn Store>,
}

impl SyncableTracker {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Records that processing of `block` has begun.
    ///
    /// Upserts by height, so re-processing a height resets its existing
    /// marker instead of adding a second one. A completed marker is left in
    /// place; the height commit replaces it with the returned one.
    pub async fn start(
        &self,
        block: &RawBlock,
        report_id: Option<i64>,
    ) -> Result<Syncable, DbError> {
        let syncable = Syncable {
            height: block.height,
            time: block.time,
            spec_version: block.spec_version.clone(),
            chain_uid: block.chain_uid.clone(),
            session: block.session,
            era: block.era,
            last_in_session: block.last_in_session,
            last_in_era: block.last_in_era,
            index_version: 0,
            status: SyncableStatus::Running,
            report_id,
            started_at: Utc::now(),
            processed_at: None,
            duration_ms: None,
        };
        let stored = self.store.get_syncable(block.height).await?;
        if !stored.is_some_and(|s| s.is_completed()) {
            self.store.save_syncable(&syncable).await?;
        }
        Ok(syncable)
    }

    /// Moves a running syncable to completed. The caller persists it as
    /// part of the height commit.
    pub fn mark_processed(syncable: &mut Syncable, index_version: i64) -> Result<(), IndexerError> {
        if syncable.status != SyncableStatus::Running {
            return Err(IndexerError::invariant(
                syncable.height,
                "syncable already completed",
            ));
        }
        let now = Utc::now();
        syncable.status = SyncableStatus::Completed;
        syncable.processed_at = Some(now);
        syncable.duration_ms = Some((now - syncable.started_at).num_milliseconds().max(0));
        syncable.index_version = index_version;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::Hash;
    use crate::infrastructure::persistence::MemoryStore;
    use chrono::TimeZone;

    fn block(height: i64) -> RawBlock {
        RawBlock {
            height,
            time: Utc.timestamp_opt(1_600_000_000 + height * 6, 0).unwrap(),
            hash: Hash(format!("0x{:x}", height)),
            spec_version: "9000".into(),
            chain_uid: "testchain".into(),
            session: 2,
            era: 1,
            last_in_session: false,
            last_in_era: false,
            session_start_height: 1,
            era_start_height: 1,
        }
    }

    #[tokio::test]
    async fn start_then_mark_processed_sets_timing_once() {
        let store = Arc::new(MemoryStore::new());
        let tracker = SyncableTracker::new(store.clone());

        let mut syncable = tracker.start(&block(7), Some(1)).await.unwrap();
        assert_eq!(syncable.status, SyncableStatus::Running);
        assert!(syncable.processed_at.is_none());
        assert!(syncable.duration_ms.is_none());
        assert!(syncable.valid());

        SyncableTracker::mark_processed(&mut syncable, 3).unwrap();
        assert!(syncable.is_completed());
        assert!(syncable.processed_at.is_some());
        assert_eq!(syncable.index_version, 3);
        assert!(syncable.valid());

        assert!(SyncableTracker::mark_processed(&mut syncable, 3).is_err());
    }

    #[tokio::test]
    async fn restarting_a_height_keeps_a_single_marker() {
        let store = Arc::new(MemoryStore::new());
        let tracker = SyncableTracker::new(store.clone());

        tracker.start(&block(7), Some(1)).await.unwrap();
        tracker.start(&block(7), Some(2)).await.unwrap();

        let all = store.syncables().await;
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].report_id, Some(2));
    }

    #[tokio::test]
    async fn restarting_a_completed_height_keeps_it_completed() {
        let store = Arc::new(MemoryStore::new());
        let tracker = SyncableTracker::new(store.clone());

        let mut syncable = tracker.start(&block(7), Some(1)).await.unwrap();
        SyncableTracker::mark_processed(&mut syncable, 1).unwrap();
        store.save_syncable(&syncable).await.unwrap();

        let restarted = tracker.start(&block(7), Some(2)).await.unwrap();
        assert_eq!(restarted.status, SyncableStatus::Running);
        assert_eq!(restarted.report_id, Some(2));

        let stored = store.get_syncable(7).await.unwrap().unwrap();
        assert!(stored.is_completed());
        assert_eq!(stored.report_id, Some(1));
        assert_eq!(store.max_processed_height().await.unwrap(), Some(7));
    }
}
