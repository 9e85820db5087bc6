//! Lifecycle orchestration
//!
//! One mutation against one entity goes through
//! `Requested → Submitting → Converging → Converged | Failed | Deleted`.
//! Submission uses the operation invoker, convergence uses the state-reach
//! waiter. Several mutations against the same entity are run as separate
//! lifecycles, one after the other.

use crate::error::{CloudError, Result};
use crate::retry::{RetryPolicy, invoke};
use crate::waiter::{Observe, WaitSpec, wait_for};
use std::fmt;
use std::future::Future;

/// Phase of a single mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Request built from desired configuration
    Requested,
    /// Mutation being sent through the invoker
    Submitting,
    /// Accepted by the API, waiting for the entity to settle
    Converging,
    Converged,
    Failed,
    Deleted,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Converged | Phase::Failed | Phase::Deleted)
    }

    pub fn can_advance_to(self, next: Phase) -> bool {
        matches!(
            (self, next),
            (Phase::Requested, Phase::Submitting)
                | (Phase::Submitting, Phase::Converging)
                | (Phase::Submitting, Phase::Failed)
                | (Phase::Converging, Phase::Converged)
                | (Phase::Converging, Phase::Failed)
                | (Phase::Converging, Phase::Deleted)
        )
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Requested => write!(f, "requested"),
            Phase::Submitting => write!(f, "submitting"),
            Phase::Converging => write!(f, "converging"),
            Phase::Converged => write!(f, "converged"),
            Phase::Failed => write!(f, "failed"),
            Phase::Deleted => write!(f, "deleted"),
        }
    }
}

/// Tracks one mutation of one entity
#[derive(Debug)]
pub struct Lifecycle {
    resource: String,
    phase: Phase,
    history: Vec<Phase>,
}

impl Lifecycle {
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            phase: Phase::Requested,
            history: vec![Phase::Requested],
        }
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Every phase visited so far, in order
    pub fn history(&self) -> &[Phase] {
        &self.history
    }

    fn advance(&mut self, next: Phase) -> Result<()> {
        if !self.phase.can_advance_to(next) {
            return Err(CloudError::StateError(format!(
                "{}: illegal transition {} -> {}",
                self.resource, self.phase, next
            )));
        }
        tracing::info!(resource = %self.resource, from = %self.phase, to = %next, "lifecycle transition");
        self.phase = next;
        self.history.push(next);
        Ok(())
    }

    /// Submit the mutation through the invoker
    pub async fn submit<T, F, Fut>(&mut self, policy: &RetryPolicy, action: &str, call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.advance(Phase::Submitting)?;
        match invoke(policy, action, call).await {
            Ok(value) => {
                self.advance(Phase::Converging)?;
                Ok(value)
            }
            Err(e) => {
                self.advance(Phase::Failed)?;
                Err(e)
            }
        }
    }

    /// Wait for the submitted mutation to take effect
    pub async fn converge<E, F, Fut>(
        &mut self,
        spec: &WaitSpec<E::Status>,
        describe: F,
    ) -> Result<Option<E>>
    where
        E: Observe,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<E>>>,
    {
        if self.phase != Phase::Converging {
            return Err(CloudError::StateError(format!(
                "{}: cannot wait for convergence while {}",
                self.resource, self.phase
            )));
        }
        match wait_for(&self.resource, spec, describe).await {
            Ok(entity) => {
                let next = if spec.expects_absence() {
                    Phase::Deleted
                } else {
                    Phase::Converged
                };
                self.advance(next)?;
                Ok(entity)
            }
            Err(e) => {
                self.advance(Phase::Failed)?;
                Err(e)
            }
        }
    }
}

/// Result of a completed orchestration
#[derive(Debug)]
pub struct Outcome<T, E> {
    /// Value returned by the accepted submission (e.g. a new instance id)
    pub submitted: T,

    /// Entity observed at convergence; `None` after a deletion
    pub entity: Option<E>,
}

/// Submit one mutation and wait for it to converge
pub async fn orchestrate<T, E, S, SFut, D, DFut>(
    resource: &str,
    action: &str,
    policy: &RetryPolicy,
    submit: S,
    spec: &WaitSpec<E::Status>,
    describe: D,
) -> Result<Outcome<T, E>>
where
    E: Observe,
    S: FnMut() -> SFut,
    SFut: Future<Output = Result<T>>,
    D: FnMut() -> DFut,
    DFut: Future<Output = Result<Option<E>>>,
{
    let mut lifecycle = Lifecycle::new(resource);
    let submitted = lifecycle.submit(policy, action, submit).await?;
    let entity = lifecycle.converge(spec, describe).await?;
    Ok(Outcome { submitted, entity })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use std::time::Duration;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum St {
        Normal,
        Processing,
    }

    #[derive(Debug)]
    struct Node(St);

    impl Observe for Node {
        type Status = St;

        fn status(&self) -> St {
            self.0
        }
    }

    #[test]
    fn test_transitions() {
        assert!(Phase::Requested.can_advance_to(Phase::Submitting));
        assert!(Phase::Converging.can_advance_to(Phase::Deleted));
        assert!(!Phase::Requested.can_advance_to(Phase::Converged));
        assert!(!Phase::Converged.can_advance_to(Phase::Submitting));
        assert!(Phase::Failed.is_terminal());
    }

    #[tokio::test(start_paused = true)]
    async fn test_converged_path() {
        let mut lifecycle = Lifecycle::new("es-1");
        lifecycle
            .submit(&RetryPolicy::write(), "RestartInstance", || async { Ok(()) })
            .await
            .unwrap();

        let mut polls = 0;
        let spec = WaitSpec::reach([St::Normal], Duration::from_secs(30));
        let node = lifecycle
            .converge(&spec, || {
                polls += 1;
                let st = if polls < 3 { St::Processing } else { St::Normal };
                async move { Ok(Some(Node(st))) }
            })
            .await
            .unwrap();

        assert!(node.is_some());
        assert_eq!(
            lifecycle.history(),
            &[Phase::Requested, Phase::Submitting, Phase::Converging, Phase::Converged]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_submission_skips_waiting() {
        let mut lifecycle = Lifecycle::new("es-1");
        let result: Result<()> = lifecycle
            .submit(&RetryPolicy::write(), "UpgradeInstance", || async {
                Err(CloudError::Api(ApiError::new("UnauthorizedOperation", "denied")))
            })
            .await;

        assert!(matches!(result, Err(CloudError::Fatal(_))));
        assert_eq!(lifecycle.phase(), Phase::Failed);

        let spec = WaitSpec::reach([St::Normal], Duration::from_secs(30));
        let err = lifecycle
            .converge(&spec, || async { Ok(Some(Node(St::Normal))) })
            .await
            .unwrap_err();
        assert!(matches!(err, CloudError::StateError(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_orchestration() {
        let mut polls = 0;
        let outcome = orchestrate(
            "es-1",
            "DeleteInstance",
            &RetryPolicy::write(),
            || async { Ok(()) },
            &WaitSpec::absent(Duration::from_secs(30)),
            || {
                polls += 1;
                let present = polls < 2;
                async move { Ok(present.then_some(Node(St::Normal))) }
            },
        )
        .await
        .unwrap();

        assert!(outcome.entity.is_none());
        assert_eq!(polls, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_convergence_timeout_fails_lifecycle() {
        let mut lifecycle = Lifecycle::new("es-1");
        lifecycle
            .submit(&RetryPolicy::write(), "UpdateInstance", || async { Ok(()) })
            .await
            .unwrap();

        let spec = WaitSpec::reach([St::Normal], Duration::from_secs(5));
        let err = lifecycle
            .converge(&spec, || async { Ok(Some(Node(St::Processing))) })
            .await
            .unwrap_err();

        assert!(err.is_timeout());
        assert_eq!(lifecycle.phase(), Phase::Failed);
    }
}
