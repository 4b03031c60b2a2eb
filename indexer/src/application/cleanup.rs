//! Periodic removal of old syncables

use std::sync::Arc;

use crate::config::IndexerConfig;
use crate::domain::types::Height;
use crate::infrastructure::persistence::{DbError, Store};
use crate::utils::logging;

/// Deletes syncables far enough below the highest processed height
pub struct CleanupJob {
    store: Arc<dyn Store>,
    threshold: i64,
}

impl CleanupJob {
    pub fn new(store: Arc<dyn Store>, config: &IndexerConfig) -> Self {
        Self {
            store,
            threshold: config.cleanup_threshold,
        }
    }

    /// Highest height that may be deleted, if any.
    ///
    /// Never reaches the first height of a report that is still running.
    pub async fn cutoff(&self) -> Result<Option<Height>, DbError> {
        let Some(max_processed) = self.store.max_processed_height().await? else {
            return Ok(None);
        };
        let mut cutoff = max_processed - self.threshold;

        let oldest_in_flight = self
            .store
            .in_flight_reports()
            .await?
            .iter()
            .map(|r| r.start_height)
            .min();
        if let Some(start) = oldest_in_flight {
            cutoff = cutoff.min(start - 1);
        }

        Ok((cutoff >= 0).then_some(cutoff))
    }

    /// Returns the number of syncables removed
    pub async fn run(&self) -> Result<u64, DbError> {
        let Some(cutoff) = self.cutoff().await? else {
            return Ok(0);
        };
        let removed = self.store.delete_syncables_up_to(cutoff).await?;
        if removed > 0 {
            logging::log_info(&format!(
                "[cleanup] 🧹 Removed {} syncables at or below height {}",
                removed, cutoff
            ));
        }
        Ok(removed)
    }

    /// Scheduled entry point, failures are only logged
    pub async fn run_logged(&self) {
        if let Err(e) = self.run().await {
            logging::log_warning(&format!("[cleanup] ⚠️ Cleanup failed: {}", e));
        }
    }
}
