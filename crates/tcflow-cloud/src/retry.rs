//! Operation invoker
//!
//! Wraps one remote mutating (or reading) call in a bounded retry loop.
//! Each failure is classified as retryable or fatal; retryable failures are
//! retried after a fixed backoff until the policy's elapsed-time ceiling is
//! reached, fatal failures abort immediately.

use crate::error::{CloudError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::{Instant, sleep};

/// Error codes retried by default (prefix match on dotted codes)
pub const DEFAULT_RETRYABLE_CODES: &[&str] = &[
    "ClientError.NetworkError",
    "ClientError.HttpStatusCodeError",
    "FailedOperation",
    "InternalError",
    "TradeUnknownError",
    "RequestLimitExceeded",
    "ResourceInUse",
    "ResourceInsufficient",
    "ResourceUnavailable",
    "ResourceBusy",
];

/// Ceiling for mutating calls
pub const WRITE_RETRY_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Ceiling for read calls
pub const READ_RETRY_TIMEOUT: Duration = Duration::from_secs(3 * 60);

/// Pause between attempts unless a policy says otherwise
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(1);

/// How a failed attempt should be treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Retryable,
    Fatal,
}

/// Outcome of a single failed attempt, as seen by [`retry`]
#[derive(Debug)]
pub enum RetryError {
    Retryable(CloudError),
    Fatal(CloudError),
}

impl RetryError {
    pub fn retryable(err: impl Into<CloudError>) -> Self {
        RetryError::Retryable(err.into())
    }

    pub fn fatal(err: impl Into<CloudError>) -> Self {
        RetryError::Fatal(err.into())
    }

    pub fn disposition(&self) -> Disposition {
        match self {
            RetryError::Retryable(_) => Disposition::Retryable,
            RetryError::Fatal(_) => Disposition::Fatal,
        }
    }

    pub fn into_inner(self) -> CloudError {
        match self {
            RetryError::Retryable(e) | RetryError::Fatal(e) => e,
        }
    }
}

/// Decides whether an error is worth retrying
///
/// Only remote API errors can be retryable. Everything else (malformed
/// documents, local IO, invalid ids) is fatal.
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    extra_codes: Vec<String>,
    exact_codes: Vec<String>,
}

impl Classifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Treat `code` (and its dotted sub-codes) as retryable in addition to the defaults
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.extra_codes.push(code.into());
        self
    }

    /// Treat exactly `code` as retryable, leaving its dotted sub-codes fatal
    pub fn with_exact_code(mut self, code: impl Into<String>) -> Self {
        self.exact_codes.push(code.into());
        self
    }

    pub fn classify(&self, err: &CloudError) -> Disposition {
        let CloudError::Api(api) = err else {
            return Disposition::Fatal;
        };
        let retryable = DEFAULT_RETRYABLE_CODES.iter().any(|c| api.matches(c))
            || self.extra_codes.iter().any(|c| api.matches(c))
            || self.exact_codes.iter().any(|c| api.code == *c);
        if retryable {
            Disposition::Retryable
        } else {
            Disposition::Fatal
        }
    }

    /// Wrap an error according to its classification
    pub fn wrap(&self, err: CloudError) -> RetryError {
        match self.classify(&err) {
            Disposition::Retryable => RetryError::Retryable(err),
            Disposition::Fatal => RetryError::Fatal(err),
        }
    }
}

/// Retry configuration for one class of calls
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total wall-clock budget across all attempts
    pub max_elapsed: Duration,

    /// Fixed pause between attempts
    pub backoff: Duration,

    /// Error classification
    pub classifier: Classifier,
}

impl RetryPolicy {
    pub fn new(max_elapsed: Duration) -> Self {
        Self {
            max_elapsed,
            backoff: DEFAULT_BACKOFF,
            classifier: Classifier::new(),
        }
    }

    /// Policy for mutating calls
    pub fn write() -> Self {
        Self::new(WRITE_RETRY_TIMEOUT)
    }

    /// Policy for read calls
    pub fn read() -> Self {
        Self::new(READ_RETRY_TIMEOUT)
    }

    /// Same policy with the budget multiplied, for long running operations
    pub fn scaled(&self, factor: u32) -> Self {
        Self {
            max_elapsed: self.max_elapsed * factor,
            ..self.clone()
        }
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Additionally retry on `code`
    pub fn retry_on(mut self, code: impl Into<String>) -> Self {
        self.classifier = self.classifier.with_code(code);
        self
    }

    /// Additionally retry on exactly `code`
    pub fn retry_on_exact(mut self, code: impl Into<String>) -> Self {
        self.classifier = self.classifier.with_exact_code(code);
        self
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::write()
    }
}

/// Invoke `call`, classifying its errors with the policy's classifier
pub async fn invoke<T, F, Fut>(policy: &RetryPolicy, action: &str, mut call: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let classifier = &policy.classifier;
    retry(policy, action, || {
        let fut = call();
        async move { fut.await.map_err(|e| classifier.wrap(e)) }
    })
    .await
}

/// Run `op` until it succeeds, fails fatally, or the budget runs out
///
/// The operation classifies its own errors, which lets a call site retry on a
/// condition the default classifier knows nothing about.
pub async fn retry<T, F, Fut>(policy: &RetryPolicy, action: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, RetryError>>,
{
    let start = Instant::now();
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        let err = match op().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::debug!(action, attempt, "call succeeded after retry");
                }
                return Ok(value);
            }
            Err(RetryError::Fatal(e)) => {
                tracing::error!(action, attempt, error = %e, "call failed, not retrying");
                return Err(match e {
                    CloudError::Api(api) => CloudError::Fatal(api),
                    other => other,
                });
            }
            Err(RetryError::Retryable(e)) => e,
        };

        let elapsed = start.elapsed();
        if elapsed >= policy.max_elapsed {
            return Err(budget_exhausted(policy, action, attempt, err));
        }

        tracing::warn!(action, attempt, error = %err, "retryable failure, backing off");
        sleep(policy.backoff.min(policy.max_elapsed - elapsed)).await;

        if start.elapsed() >= policy.max_elapsed {
            return Err(budget_exhausted(policy, action, attempt, err));
        }
    }
}

fn budget_exhausted(policy: &RetryPolicy, action: &str, attempts: u32, last: CloudError) -> CloudError {
    tracing::error!(action, attempts, error = %last, "retry budget exhausted");
    CloudError::Timeout {
        budget: policy.max_elapsed,
        last: Box::new(last),
    }
}
