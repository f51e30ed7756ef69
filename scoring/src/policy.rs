//! Outbound call policy: bounded concurrency, per-call timeout and retries.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::CallLimits;
use crate::error::BranchError;

/// Wraps every provider call made by one scorer.
///
/// The semaphore is shared by all requests served by the scorer, so the
/// number of calls in flight against the providers never exceeds
/// `max_concurrent_calls`. A permit is held only while an attempt runs, not
/// while waiting to retry.
#[derive(Debug, Clone)]
pub struct CallPolicy {
    permits: Arc<Semaphore>,
    timeout: Duration,
    max_retries: u32,
    backoff: Duration,
    max_backoff: Duration,
}

impl CallPolicy {
    pub fn new(limits: &CallLimits) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(limits.max_concurrent_calls.max(1))),
            timeout: limits.call_timeout(),
            max_retries: limits.max_retries,
            backoff: limits.retry_backoff(),
            max_backoff: limits.max_backoff(),
        }
    }

    /// Permits currently free.
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `call` under the policy, retrying transient failures.
    ///
    /// `call` is invoked once per attempt and must build a fresh future.
    pub async fn call<T, E, F, Fut>(
        &self,
        operation: &'static str,
        mut call: F,
    ) -> Result<T, BranchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<BranchError>,
    {
        let mut attempt = 0;
        loop {
            match self.attempt(operation, call()).await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < self.max_retries && err.is_transient() => {
                    let delay = self.delay_for(attempt, &err);
                    attempt += 1;
                    warn!(
                        operation,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Retrying after transient failure: {err}"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// [`CallPolicy::call`], abandoned at `deadline` along with any retries
    /// or permit wait still pending.
    pub async fn call_before<T, E, F, Fut>(
        &self,
        deadline: Instant,
        operation: &'static str,
        call: F,
    ) -> Result<T, BranchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<BranchError>,
    {
        match tokio::time::timeout_at(deadline, self.call(operation, call)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(operation, "Request deadline reached, abandoning call");
                Err(BranchError::DeadlineExceeded { operation })
            }
        }
    }

    async fn attempt<T, E, Fut>(&self, operation: &'static str, future: Fut) -> Result<T, BranchError>
    where
        Fut: Future<Output = Result<T, E>>,
        E: Into<BranchError>,
    {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| BranchError::LimiterClosed)?;

        debug!(operation, "Calling provider");
        match tokio::time::timeout(self.timeout, future).await {
            Ok(result) => result.map_err(Into::into),
            Err(_) => Err(BranchError::Timeout {
                operation,
                after: self.timeout,
            }),
        }
    }

    /// Exponential backoff, or the server's `Retry-After`, capped at `max_backoff`.
    fn delay_for(&self, attempt: u32, err: &BranchError) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        err.retry_after()
            .unwrap_or_else(|| self.backoff.saturating_mul(factor))
            .min(self.max_backoff)
    }
}
