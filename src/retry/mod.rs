//! Idempotency-aware retry engine.
//!
//! Failures are classified once ([`check::classify`]); retryable ones wait on the fast or slow
//! [`Backoff`] tier indexed by the attempt counter, which restarts from zero whenever the
//! status code changes between attempts. A failure that invalidates the session ends the loop
//! with [`TableSqlError::BadConnection`].

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::context::ExecContext;
use crate::error::TableSqlError;

pub mod backoff;
pub mod check;

pub use backoff::Backoff;
pub use check::{BackoffKind, Classification, RetryClass, classify};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub fast: Backoff,
    pub slow: Backoff,
    /// Attempt budget; `None` retries until success, a terminal failure or cancellation.
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            fast: Backoff::FAST,
            slow: Backoff::SLOW,
            max_attempts: None,
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn with_fast(mut self, fast: Backoff) -> Self {
        self.fast = fast;
        self
    }

    #[must_use]
    pub fn with_slow(mut self, slow: Backoff) -> Self {
        self.slow = slow;
        self
    }

    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts.max(1));
        self
    }

    /// Reject values a loader can produce but the retry loop cannot honor.
    ///
    /// # Errors
    ///
    /// [`TableSqlError::ConfigError`] for a jitter limit outside `[0, 1]` (or NaN) and for a
    /// zero attempt budget.
    pub fn validate(&self) -> Result<(), TableSqlError> {
        for (tier, backoff) in [("fast", &self.fast), ("slow", &self.slow)] {
            if !(0.0..=1.0).contains(&backoff.jitter_limit) {
                return Err(TableSqlError::ConfigError(format!(
                    "{tier} backoff jitter_limit must be within [0, 1], got {}",
                    backoff.jitter_limit
                )));
            }
        }
        if self.max_attempts == Some(0) {
            return Err(TableSqlError::ConfigError(
                "max_attempts must be at least 1".to_owned(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn delay(&self, kind: BackoffKind, attempt: u32) -> Duration {
        match kind {
            BackoffKind::None => Duration::ZERO,
            BackoffKind::Fast => self.fast.delay(attempt),
            BackoffKind::Slow => self.slow.delay(attempt),
        }
    }
}

/// Bookkeeping carried across the attempts of one retried operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttemptState {
    index: u32,
    last_code: Option<i32>,
    attempts: u32,
}

impl AttemptState {
    /// Backoff index the next wait will use.
    #[must_use]
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Failed attempts recorded so far.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Record a failed attempt and decide what happens next.
    ///
    /// # Errors
    ///
    /// Returns the error that ends the loop: [`TableSqlError::BadConnection`] when the session
    /// must be deleted, otherwise `err` itself when it is not retryable for `idempotent` or
    /// the attempt budget is spent.
    pub fn on_failure(
        &mut self,
        err: TableSqlError,
        idempotent: bool,
        policy: &RetryPolicy,
    ) -> Result<Duration, TableSqlError> {
        let Some(class) = err.classification() else {
            return Err(err);
        };
        self.attempts += 1;
        if self.last_code != Some(class.status_code) {
            self.index = 0;
        }
        if class.is_must_delete_session() {
            warn!(error = %err, "session must be deleted; reporting bad connection");
            return Err(TableSqlError::BadConnection);
        }
        if !class.must_retry(idempotent) {
            return Err(err);
        }
        if policy.max_attempts.is_some_and(|max| self.attempts >= max.max(1)) {
            debug!(attempts = self.attempts, error = %err, "retry budget exhausted");
            return Err(err);
        }
        let delay = policy.delay(class.backoff, self.index);
        debug!(
            attempt = self.attempts,
            index = self.index,
            status = class.status_code,
            ?delay,
            error = %err,
            "retrying backend operation"
        );
        self.last_code = Some(class.status_code);
        self.index += 1;
        Ok(delay)
    }
}

/// Sleep for `delay` unless the call is cancelled first.
pub(crate) async fn wait(ctx: &ExecContext, delay: Duration) -> Result<(), TableSqlError> {
    tokio::select! {
        biased;
        () = ctx.cancellation().cancelled() => Err(TableSqlError::Cancelled),
        () = tokio::time::sleep(delay) => Ok(()),
    }
}

/// Run `op` until it succeeds or fails terminally.
///
/// `op` should return raw [`TableSqlError::Backend`] failures; they are classified here. The
/// final error is not mapped, callers apply [`TableSqlError::mapped`] where the runtime
/// expects the bad-connection sentinel.
///
/// # Errors
///
/// [`TableSqlError::Cancelled`] when the context is cancelled before or during an attempt or
/// a wait, [`TableSqlError::BadConnection`] when the session must be deleted, or the last
/// non-retryable error.
pub async fn retry<T, F, Fut>(
    ctx: &ExecContext,
    idempotent: bool,
    policy: &RetryPolicy,
    mut op: F,
) -> Result<T, TableSqlError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, TableSqlError>>,
{
    let mut state = AttemptState::default();
    loop {
        let outcome = tokio::select! {
            biased;
            () = ctx.cancellation().cancelled() => return Err(TableSqlError::Cancelled),
            res = op() => res,
        };
        match outcome {
            Ok(value) => return Ok(value),
            Err(err) => {
                let delay = state.on_failure(err, idempotent, policy)?;
                wait(ctx, delay).await?;
            }
        }
    }
}
