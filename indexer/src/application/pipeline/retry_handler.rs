//! Retry handler for fetches and commits that may fail temporarily

use std::fmt::Display;
use std::future::Future;
use tokio::time::{sleep, Duration};

use crate::infrastructure::persistence::DbError;
use crate::infrastructure::source::SourceError;
use crate::utils::logging;

/// Errors that say whether another attempt can succeed
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for SourceError {
    fn is_retryable(&self) -> bool {
        self.is_transient()
    }
}

impl Retryable for DbError {
    fn is_retryable(&self) -> bool {
        !matches!(self, DbError::QueryError(_) | DbError::CorruptRow(_))
    }
}

/// Handles retry logic for operations that may fail temporarily
#[derive(Debug, Clone)]
pub struct RetryHandler {
    max_retries: u32,
    base_delay_ms: u64,
}

impl RetryHandler {
    pub fn new() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 500,
        }
    }

    /// `max_retries` attempts follow the first failure
    pub fn with_config(max_retries: u32, base_delay_ms: u64) -> Self {
        Self {
            max_retries,
            base_delay_ms,
        }
    }

    /// Execute an operation, retrying retryable failures with exponential backoff
    pub async fn execute_with_retry_and_logging<F, Fut, T, E>(
        &self,
        operation: F,
        operation_name: &str,
        run_label: &str,
    ) -> Result<T, E>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display + Retryable,
    {
        let mut retry_count = 0;

        loop {
            match operation().await {
                Ok(result) => {
                    if retry_count > 0 {
                        logging::log_info(&format!(
                            "[{}] {} succeeded after {} retries",
                            run_label, operation_name, retry_count
                        ));
                    }
                    return Ok(result);
                }
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => {
                    if retry_count >= self.max_retries {
                        logging::log_error(&format!(
                            "[{}] {} failed after {} attempts: {}",
                            run_label,
                            operation_name,
                            retry_count + 1,
                            e
                        ));
                        return Err(e);
                    }
                    retry_count += 1;

                    let delay = self.calculate_delay(retry_count);
                    logging::log_warning(&format!(
                        "[{}] {} failed (attempt {}/{}): {}. Retrying in {}ms",
                        run_label,
                        operation_name,
                        retry_count,
                        self.max_retries + 1,
                        e,
                        delay
                    ));

                    sleep(Duration::from_millis(delay)).await;
                }
            }
        }
    }

    /// Calculate exponential backoff delay
    fn calculate_delay(&self, retry_count: u32) -> u64 {
        self.base_delay_ms
            .saturating_mul(2_u64.saturating_pow(retry_count.saturating_sub(1)))
    }
}

impl Default for RetryHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn backoff_doubles() {
        let handler = RetryHandler::with_config(5, 100);
        assert_eq!(handler.calculate_delay(1), 100);
        assert_eq!(handler.calculate_delay(2), 200);
        assert_eq!(handler.calculate_delay(4), 800);
    }

    #[tokio::test]
    async fn transient_errors_are_retried_until_budget_runs_out() {
        let handler = RetryHandler::with_config(2, 1);
        let attempts = AtomicU32::new(0);

        let result: Result<(), SourceError> = handler
            .execute_with_retry_and_logging(
                || async {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err(SourceError::Transient("timeout".into()))
                },
                "fetch",
                "test",
            )
            .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_errors_fail_at_once() {
        let handler = RetryHandler::with_config(2, 1);
        let attempts = AtomicU32::new(0);

        let result: Result<(), SourceError> = handler
            .execute_with_retry_and_logging(
                || async {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err(SourceError::NotFound(9))
                },
                "fetch",
                "test",
            )
            .await;
        assert!(matches!(result, Err(SourceError::NotFound(9))));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn recovers_after_a_transient_failure() {
        let handler = RetryHandler::with_config(3, 1);
        let attempts = AtomicU32::new(0);

        let result: Result<u32, DbError> = handler
            .execute_with_retry_and_logging(
                || async {
                    if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(DbError::ConnectionError("reset".into()))
                    } else {
                        Ok(7)
                    }
                },
                "commit",
                "test",
            )
            .await;
        assert_eq!(result.unwrap(), 7);
    }
}
