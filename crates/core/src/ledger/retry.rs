//! Bounded retry with exponential backoff, and whole-operation timeouts.

use std::future::Future;
use std::time::Duration;

use tally_shared::LedgerConfig;
use tracing::{error, warn};

use super::error::LedgerError;
use super::store::StoreError;

/// How transient store failures and slow operations are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per store call, including the first one.
    pub max_attempts: u32,
    /// Backoff before the first retry; doubles on each further retry.
    pub base_backoff: Duration,
    /// Upper bound for a whole ledger operation.
    pub operation_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&LedgerConfig::default())
    }
}

impl From<&LedgerConfig> for RetryPolicy {
    fn from(config: &LedgerConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_backoff: config.base_backoff(),
            operation_timeout: config.operation_timeout(),
        }
    }
}

impl RetryPolicy {
    /// Backoff slept after the given failed attempt (1-based).
    #[must_use]
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_backoff.saturating_mul(factor)
    }

    /// Runs `call`, repeating it while it fails with a transient error.
    ///
    /// Non-transient errors and the last transient error are returned as is.
    pub async fn retry<T, F, Fut>(&self, operation: &'static str, mut call: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let mut attempt = 1;
        loop {
            match call().await {
                Err(err) if err.is_transient() && attempt < self.max_attempts => {
                    let backoff = self.backoff_for(attempt);
                    warn!(
                        operation,
                        attempt,
                        backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "Transient store failure, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    /// Bounds `fut` by the operation timeout.
    pub async fn with_timeout<T, Fut>(&self, operation: &'static str, fut: Fut) -> Result<T, LedgerError>
    where
        Fut: Future<Output = Result<T, LedgerError>>,
    {
        if let Ok(result) = tokio::time::timeout(self.operation_timeout, fut).await {
            result
        } else {
            warn!(operation, timeout = ?self.operation_timeout, "Ledger operation timed out");
            Err(LedgerError::Timeout {
                operation,
                after: self.operation_timeout,
            })
        }
    }
}

/// Converts a store error that survived retrying into a ledger failure.
pub(crate) fn store_failure(operation: &'static str, err: &StoreError) -> LedgerError {
    error!(operation, error = %err, "Store failure");
    LedgerError::Store {
        operation,
        message: err.to_string(),
    }
}
