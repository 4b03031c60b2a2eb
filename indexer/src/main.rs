use std::sync::Arc;

use staking_indexer::application::Scheduler;
use staking_indexer::config::AppConfig;
use staking_indexer::infrastructure::persistence::{DbPool, RepositoryFactory};
use staking_indexer::infrastructure::source::HttpBlockSource;
use staking_indexer::utils::logging;

#[tokio::main]
async fn main() {
    logging::init_logger();
    logging::log_info(&format!("staking-indexer {}", env!("CARGO_PKG_VERSION")));

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            logging::log_error(&format!("Invalid configuration: {}", e));
            return;
        }
    };

    let source = match HttpBlockSource::new(&config.source) {
        Ok(source) => Arc::new(source),
        Err(e) => {
            logging::log_error(&format!("Error creating block source client: {}", e));
            return;
        }
    };

    match DbPool::new(&config).await {
        Ok(db_pool) => {
            let store = Arc::new(RepositoryFactory::create_store(&db_pool));
            let mut scheduler = Scheduler::new(&config.indexer, source, store);
            scheduler.start_all().await;

            if let Err(e) = tokio::signal::ctrl_c().await {
                logging::log_error(&format!("Failed to listen for Ctrl+C: {}", e));
            }
            logging::log_info("Shutdown requested, waiting for running jobs");
            scheduler.stop_all().await;
        }
        Err(e) => logging::log_error(&format!("Failed to connect to database: {}", e)),
    }
}
