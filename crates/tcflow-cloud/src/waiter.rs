//! State-reach waiter
//!
//! Polls a describe accessor until the observed entity reaches a target
//! status, enters a failure status, disappears, or the wait times out.
//! Describe calls are strictly sequential; at least one is always made.

use crate::error::{CloudError, Result};
use std::collections::HashSet;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::time::Duration;
use tokio::time::{Instant, sleep};

/// Default pause between two describe calls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// A remote entity whose status can be observed
pub trait Observe {
    /// Per-resource status enumeration
    type Status: Copy + Eq + Hash + Debug;

    fn status(&self) -> Self::Status;
}

/// What the wait is trying to observe
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target<S: Eq + Hash> {
    /// Entity present with one of these statuses
    Reach(HashSet<S>),
    /// Entity gone
    Absent,
}

/// Parameters of one convergence wait
#[derive(Debug, Clone)]
pub struct WaitSpec<S: Eq + Hash> {
    pub target: Target<S>,

    /// Statuses that end the wait with [`CloudError::ConvergenceFailed`]
    pub fail: HashSet<S>,

    pub poll_interval: Duration,

    pub timeout: Duration,

    /// Absent observations tolerated while waiting for a status
    ///
    /// A freshly created entity is not always visible to describe yet.
    pub absent_tolerance: u32,

    /// Target observations skipped before the target is accepted
    ///
    /// After an upgrade-class mutation the entity can keep reporting its old
    /// "normal" status for a few polls before it flips to "processing".
    pub settle_polls: u32,
}

impl<S: Eq + Hash> WaitSpec<S> {
    /// Wait until the entity reports one of `states`
    pub fn reach(states: impl IntoIterator<Item = S>, timeout: Duration) -> Self {
        Self::with_target(Target::Reach(states.into_iter().collect()), timeout)
    }

    /// Wait until the entity no longer exists
    pub fn absent(timeout: Duration) -> Self {
        Self::with_target(Target::Absent, timeout)
    }

    fn with_target(target: Target<S>, timeout: Duration) -> Self {
        Self {
            target,
            fail: HashSet::new(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout,
            absent_tolerance: 0,
            settle_polls: 0,
        }
    }

    pub fn failing_on(mut self, states: impl IntoIterator<Item = S>) -> Self {
        self.fail.extend(states);
        self
    }

    pub fn poll_every(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn tolerate_absent(mut self, observations: u32) -> Self {
        self.absent_tolerance = observations;
        self
    }

    pub fn settle(mut self, polls: u32) -> Self {
        self.settle_polls = polls;
        self
    }

    pub fn expects_absence(&self) -> bool {
        matches!(self.target, Target::Absent)
    }
}

/// A wait that ended without reaching its target
#[derive(Debug)]
pub struct WaitFailure<E> {
    pub error: CloudError,

    /// Entity returned by the last describe call; `None` if it was absent
    pub last: Option<E>,
}

impl<E> From<WaitFailure<E>> for CloudError {
    fn from(failure: WaitFailure<E>) -> Self {
        failure.error
    }
}

/// Poll `describe` until `spec` is satisfied
///
/// Returns the entity that reached the target, or `None` when absence was the
/// target. Describe errors are returned as-is; wrap the accessor in
/// [`crate::retry::invoke`] to ride out transient read failures.
pub async fn wait_for<E, F, Fut>(
    resource: &str,
    spec: &WaitSpec<E::Status>,
    describe: F,
) -> Result<Option<E>>
where
    E: Observe,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<E>>>,
{
    wait_observing(resource, spec, describe)
        .await
        .map_err(CloudError::from)
}

/// Like [`wait_for`], keeping the last observed entity on failure
pub async fn wait_observing<E, F, Fut>(
    resource: &str,
    spec: &WaitSpec<E::Status>,
    mut describe: F,
) -> std::result::Result<Option<E>, WaitFailure<E>>
where
    E: Observe,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<E>>>,
{
    let start = Instant::now();
    let mut polls: u32 = 0;
    let mut absent_seen: u32 = 0;
    let mut target_seen: u32 = 0;
    let mut last: Option<E> = None;

    loop {
        polls += 1;
        let observed = match describe().await {
            Ok(observed) => observed,
            Err(error) => return Err(WaitFailure { error, last }),
        };
        let last_status = match observed {
            None => {
                last = None;
                if spec.expects_absence() {
                    tracing::debug!(resource, polls, "entity is gone");
                    return Ok(None);
                }
                absent_seen += 1;
                if absent_seen > spec.absent_tolerance {
                    return Err(WaitFailure {
                        error: CloudError::ResourceNotFound(resource.to_string()),
                        last,
                    });
                }
                "absent".to_string()
            }
            Some(entity) => {
                let status = entity.status();
                if spec.fail.contains(&status) {
                    return Err(WaitFailure {
                        error: CloudError::ConvergenceFailed {
                            resource: resource.to_string(),
                            status: format!("{:?}", status),
                        },
                        last: Some(entity),
                    });
                }
                let on_target = match &spec.target {
                    Target::Reach(states) => states.contains(&status),
                    Target::Absent => false,
                };
                if on_target {
                    if target_seen >= spec.settle_polls {
                        tracing::debug!(resource, polls, ?status, "target status reached");
                        return Ok(Some(entity));
                    }
                    target_seen += 1;
                }
                last = Some(entity);
                format!("{:?}", status)
            }
        };

        let elapsed = start.elapsed();
        if elapsed >= spec.timeout {
            return Err(WaitFailure {
                error: CloudError::ConvergenceTimeout {
                    resource: resource.to_string(),
                    last_status,
                },
                last,
            });
        }

        tracing::debug!(resource, polls, status = %last_status, "waiting for convergence");
        sleep(spec.poll_interval.min(spec.timeout - elapsed)).await;
    }
}
