use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::application::cleanup::CleanupJob;
use crate::application::pipeline::{HeightLocks, Pipeline, RunMode};
use crate::config::IndexerConfig;
use crate::domain::errors::IndexerError;
use crate::infrastructure::persistence::Store;
use crate::infrastructure::source::BlockSource;
use crate::utils::logging;

/// Runs the index and cleanup jobs on their schedules and accepts manual reindex runs
pub struct Scheduler {
    config: IndexerConfig,
    pipeline: Arc<Pipeline>,
    cleanup: Arc<CleanupJob>,
    shutdown: watch::Sender<bool>,
    tasks: Vec<(String, JoinHandle<()>)>,
    reindex_runs: u64,
}

impl Scheduler {
    /// Creates a new scheduler; nothing runs until `start_all`
    pub fn new(
        config: &IndexerConfig,
        source: Arc<dyn BlockSource>,
        store: Arc<dyn Store>,
    ) -> Self {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let locks = Arc::new(HeightLocks::default());
        Self {
            pipeline: Arc::new(Pipeline::new(
                config,
                source,
                store.clone(),
                locks,
                shutdown_rx,
            )),
            cleanup: Arc::new(CleanupJob::new(store, config)),
            config: config.clone(),
            shutdown,
            tasks: Vec::new(),
            reindex_runs: 0,
        }
    }

    /// Fail reports left running by an earlier process, then start the
    /// index and cleanup loops
    pub async fn start_all(&mut self) {
        match self.pipeline.recover_interrupted().await {
            Ok(0) => {}
            Ok(count) => logging::log_warning(&format!(
                "Recovered {} reports interrupted by a previous shutdown",
                count
            )),
            Err(e) => {
                logging::log_error(&format!("Recovery of interrupted reports failed: {}", e))
            }
        }

        let pipeline = self.pipeline.clone();
        let handle = self.spawn_periodic(self.config.processing_interval.every, move || {
            let pipeline = pipeline.clone();
            async move {
                if let Err(e) = pipeline.run(RunMode::Index).await {
                    logging::log_error(&format!("[index] ❌ Index run failed: {}", e));
                }
            }
        });
        self.tasks.push(("index".to_string(), handle));

        let cleanup = self.cleanup.clone();
        let handle = self.spawn_periodic(self.config.cleanup_interval.every, move || {
            let cleanup = cleanup.clone();
            async move { cleanup.run_logged().await }
        });
        self.tasks.push(("cleanup".to_string(), handle));

        logging::log_info(&format!(
            "Scheduler started: index every {:?}, cleanup every {:?}",
            self.config.processing_interval.every, self.config.cleanup_interval.every
        ));
    }

    /// Launch a reindex run over an explicit range next to the scheduled jobs
    pub fn trigger_reindex(&mut self, mode: RunMode) -> Result<(), IndexerError> {
        if mode == RunMode::Index {
            return Err(IndexerError::Validation(
                "forward indexing runs on its own schedule".into(),
            ));
        }
        let pipeline = self.pipeline.clone();
        self.reindex_runs += 1;
        let name = format!("{}-{}", mode.kind().as_str(), self.reindex_runs);
        let handle = tokio::spawn(async move {
            match pipeline.run(mode).await {
                Ok(Some(report)) => logging::log_info(&format!(
                    "[{}] Reindex report {} finished",
                    report.kind.as_str(),
                    report.id
                )),
                Ok(None) => {}
                Err(e) => logging::log_error(&format!("Reindex rejected: {}", e)),
            }
        });
        self.tasks.retain(|(_, handle)| !handle.is_finished());
        self.tasks.push((name, handle));
        Ok(())
    }

    /// Signal shutdown and wait for every task.
    ///
    /// Running pipelines stop dispatching heights, finish the ones in
    /// flight and complete their reports before their task ends.
    pub async fn stop_all(&mut self) {
        let _ = self.shutdown.send(true);
        for (name, handle) in self.tasks.drain(..) {
            if let Err(e) = handle.await {
                logging::log_error(&format!("Task {} ended abnormally: {}", name, e));
            }
        }
        logging::log_info("All scheduled jobs stopped");
    }

    fn spawn_periodic<F, Fut>(&self, every: Duration, job: F) -> JoinHandle<()>
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let mut shutdown = self.shutdown.subscribe();
        tokio::spawn(async move {
            let mut ticker = time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
                if *shutdown.borrow() {
                    break;
                }
                job().await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::domain::models::RawHeight;
    use crate::domain::types::Height;
    use crate::infrastructure::persistence::MemoryStore;
    use crate::infrastructure::source::SourceError;

    struct EmptySource;

    #[async_trait]
    impl BlockSource for EmptySource {
        async fn chain_head(&self) -> Result<Height, SourceError> {
            Ok(0)
        }

        async fn get_height(&self, height: Height) -> Result<RawHeight, SourceError> {
            Err(SourceError::NotFound(height))
        }
    }

    #[tokio::test]
    async fn finished_reindex_tasks_are_dropped() {
        let store = Arc::new(MemoryStore::new());
        let mut scheduler = Scheduler::new(&IndexerConfig::default(), Arc::new(EmptySource), store);
        let reversed = RunMode::SequentialReindex {
            start: 9,
            end: 5,
            index_version: 1,
        };

        for _ in 0..3 {
            scheduler.trigger_reindex(reversed).unwrap();
            for _ in 0..50 {
                if scheduler.tasks.iter().all(|(_, handle)| handle.is_finished()) {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        }
        assert_eq!(scheduler.tasks.len(), 1);
        assert_eq!(scheduler.reindex_runs, 3);
        scheduler.stop_all().await;
    }
}
