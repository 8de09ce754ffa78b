//! Bounded automatic retry around one remote call site.
//!
//! The executor is an explicit loop-based state machine: invoke, and on a
//! retryable failure sleep per the policy's backoff curve and invoke again,
//! up to the retry budget. Loading/error/retry-count state is observable by
//! the host through a shared snapshot, and the last operation is retained so
//! a user-facing "Retry" action can re-run it.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};

use clinic_core::backoff::RetryPolicy;

use crate::error::ApiError;

/// Boxed future produced by a retried operation.
pub type CallFuture<T> = Pin<Box<dyn Future<Output = Result<T, ApiError>> + Send>>;

type CallFn<T> = Arc<dyn Fn() -> CallFuture<T> + Send + Sync>;

/// Host-observable state of the executor.
///
/// `is_loading` covers the whole lifecycle of a call including backoff waits;
/// a pending automatic retry is still "loading" from the host's perspective.
/// After a terminal failure `retry_count` keeps the number of retries spent,
/// for display alongside the surfaced error.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutorStatus {
    pub is_loading: bool,
    pub retry_count: u32,
    pub error: Option<ApiError>,
}

/// Executes one remote operation with bounded exponential-backoff retry.
///
/// Generic over the operation's output; a host holds one executor per call
/// site it wants loading/error state for.
pub struct RetryingCallExecutor<T> {
    policy: RetryPolicy,
    status: Arc<Mutex<ExecutorStatus>>,
    last_call: Mutex<Option<CallFn<T>>>,
}

impl<T> Default for RetryingCallExecutor<T> {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

impl<T> RetryingCallExecutor<T> {
    #[must_use]
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            status: Arc::new(Mutex::new(ExecutorStatus::default())),
            last_call: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Snapshot of the current loading/error/retry state.
    #[must_use]
    pub fn status(&self) -> ExecutorStatus {
        self.status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.status().is_loading
    }

    #[must_use]
    pub fn retry_count(&self) -> u32 {
        self.status().retry_count
    }

    #[must_use]
    pub fn error(&self) -> Option<ApiError> {
        self.status().error
    }

    /// Drops a surfaced error without re-invoking anything.
    pub fn clear_error(&self) {
        self.with_status(|status| status.error = None);
    }

    fn with_status(&self, apply: impl FnOnce(&mut ExecutorStatus)) {
        let mut guard = self.status.lock().unwrap_or_else(PoisonError::into_inner);
        apply(&mut guard);
    }

    /// Runs `op`, retrying transient failures per the policy.
    ///
    /// Loading becomes true before the first invocation and false once the
    /// call settles either way. Only errors flagged `retryable` are retried,
    /// and total attempts are capped regardless of classification.
    ///
    /// # Errors
    ///
    /// Returns the final `ApiError` once the retry budget is exhausted or a
    /// non-retryable failure occurs; the same error stays observable via
    /// [`status`](Self::status) until cleared.
    pub async fn handle_call<F, Fut>(&self, op: F) -> Result<T, ApiError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
    {
        let call: CallFn<T> = Arc::new(move || Box::pin(op()));
        {
            let mut last = self
                .last_call
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            *last = Some(Arc::clone(&call));
        }
        self.run(call).await
    }

    /// Re-runs the last attempted operation from a clean slate.
    ///
    /// # Errors
    ///
    /// Returns a validation error when nothing was ever invoked; otherwise
    /// behaves exactly like [`handle_call`](Self::handle_call).
    pub async fn retry(&self) -> Result<T, ApiError> {
        let call = {
            let last = self
                .last_call
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            last.clone()
        };
        let call = call.ok_or_else(|| ApiError::validation("no previous call to retry"))?;
        self.run(call).await
    }

    async fn run(&self, call: CallFn<T>) -> Result<T, ApiError> {
        self.with_status(|status| {
            status.is_loading = true;
            status.retry_count = 0;
            status.error = None;
        });

        let mut attempt: u32 = 0;
        loop {
            match call().await {
                Ok(value) => {
                    self.with_status(|status| {
                        status.is_loading = false;
                        status.retry_count = 0;
                    });
                    return Ok(value);
                }
                Err(error) if error.retryable && self.policy.allows_retry(attempt) => {
                    let delay = self.policy.delay_for_attempt(attempt);
                    attempt += 1;
                    tracing::debug!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        kind = %error.kind,
                        "transient failure, retrying after backoff"
                    );
                    self.with_status(|status| status.retry_count = attempt);
                    tokio::time::sleep(delay).await;
                }
                Err(error) => {
                    self.with_status(|status| {
                        status.is_loading = false;
                        status.error = Some(error.clone());
                    });
                    return Err(error);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tokio::time::Instant;

    fn flaky(failures: u32, error: ApiError) -> (Arc<AtomicU32>, impl Fn() -> CallFuture<u32>) {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let op = move || -> CallFuture<u32> {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            let error = error.clone();
            Box::pin(async move {
                if n < failures {
                    Err(error)
                } else {
                    Ok(n)
                }
            })
        };
        (calls, op)
    }

    #[tokio::test(start_paused = true)]
    async fn success_passes_through_without_delay() {
        let executor = RetryingCallExecutor::new(RetryPolicy::default());
        let started = Instant::now();
        let (calls, op) = flaky(0, ApiError::network("unused"));

        let value = executor.handle_call(op).await.unwrap();

        assert_eq!(value, 0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
        assert_eq!(executor.status(), ExecutorStatus::default());
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transient_failures_with_backoff() {
        let executor = RetryingCallExecutor::new(RetryPolicy::default());
        let started = Instant::now();
        let (calls, op) = flaky(2, ApiError::server(503, "down"));

        let value = executor.handle_call(op).await.unwrap();

        assert_eq!(value, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 1s after the first failure, 2s after the second.
        assert_eq!(started.elapsed(), Duration::from_secs(3));
        let status = executor.status();
        assert!(!status.is_loading);
        assert_eq!(status.retry_count, 0);
        assert!(status.error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_budget_surfaces_final_error() {
        let executor = RetryingCallExecutor::new(RetryPolicy::default().with_max_retries(3));
        let (calls, op) = flaky(u32::MAX, ApiError::timeout("slow"));

        let err = executor.handle_call(op).await.unwrap_err();

        assert_eq!(err, ApiError::timeout("slow"));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        let status = executor.status();
        assert!(!status.is_loading);
        assert_eq!(status.retry_count, 3);
        assert_eq!(status.error, Some(ApiError::timeout("slow")));
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_failure_is_terminal_immediately() {
        let executor = RetryingCallExecutor::new(RetryPolicy::default());
        let started = Instant::now();
        let (calls, op) = flaky(u32::MAX, ApiError::auth("denied"));

        let err = executor.handle_call(op).await.unwrap_err();

        assert_eq!(err.kind, crate::error::ApiErrorKind::Auth);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
        assert_eq!(executor.retry_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn loading_is_observable_during_backoff() {
        let executor = Arc::new(RetryingCallExecutor::new(RetryPolicy::default()));
        let (_, op) = flaky(1, ApiError::network("blip"));

        let runner = Arc::clone(&executor);
        let handle = tokio::spawn(async move { runner.handle_call(op).await });
        tokio::task::yield_now().await;

        // First invocation failed; the retry is pending, so still loading.
        let status = executor.status();
        assert!(status.is_loading);
        assert_eq!(status.retry_count, 1);

        let value = handle.await.unwrap().unwrap();
        assert_eq!(value, 1);
        assert!(!executor.is_loading());
    }

    #[tokio::test(start_paused = true)]
    async fn manual_retry_reruns_the_last_operation() {
        let executor = RetryingCallExecutor::new(RetryPolicy::no_retries());
        let (calls, op) = flaky(1, ApiError::server(500, "boom"));

        let err = executor.handle_call(op).await.unwrap_err();
        assert_eq!(err.status, Some(500));

        let value = executor.retry().await.unwrap();
        assert_eq!(value, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(executor.error().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn retry_without_prior_call_is_an_error() {
        let executor: RetryingCallExecutor<u32> = RetryingCallExecutor::default();
        let err = executor.retry().await.unwrap_err();
        assert_eq!(err.kind, crate::error::ApiErrorKind::Validation);
    }

    #[tokio::test(start_paused = true)]
    async fn clear_error_resets_without_reinvoking() {
        let executor = RetryingCallExecutor::new(RetryPolicy::no_retries());
        let (calls, op) = flaky(u32::MAX, ApiError::server(502, "bad gateway"));

        let _ = executor.handle_call(op).await;
        assert!(executor.error().is_some());

        executor.clear_error();
        assert!(executor.error().is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
