//! Best-effort cleanup
//!
//! Sweepers delete leftover entities (test fixtures, orphans) one by one.
//! A failed deletion is logged and recorded, never propagated, so one stuck
//! entity does not stop the rest of the sweep.

use crate::provider::ManagedResource;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Outcome of deleting one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepEntry {
    pub id: String,

    /// Error message if the deletion failed
    pub error: Option<String>,
}

/// Result of a sweep
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SweepResult {
    pub deleted: Vec<SweepEntry>,

    pub failed: Vec<SweepEntry>,

    pub duration_ms: u64,
}

impl SweepResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn add_deleted(&mut self, id: impl Into<String>) {
        self.deleted.push(SweepEntry {
            id: id.into(),
            error: None,
        });
    }

    pub fn add_failure(&mut self, id: impl Into<String>, error: impl Into<String>) {
        self.failed.push(SweepEntry {
            id: id.into(),
            error: Some(error.into()),
        });
    }
}

impl std::fmt::Display for SweepResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} deleted, {} failed in {}ms",
            self.deleted.len(),
            self.failed.len(),
            self.duration_ms
        )
    }
}

/// Delete every id, logging and continuing past failures
///
/// Entities that are already gone count as deleted.
pub async fn sweep<R, I, S>(resource: &R, ids: I) -> SweepResult
where
    R: ManagedResource + ?Sized,
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let start = Instant::now();
    let mut result = SweepResult::new();

    for id in ids {
        let id = id.as_ref();
        match resource.delete(id).await {
            Ok(()) => result.add_deleted(id),
            Err(e) if e.is_not_found() => result.add_deleted(id),
            Err(e) => {
                tracing::warn!(resource_type = resource.resource_type(), id, error = %e, "sweep failed, continuing");
                result.add_failure(id, e.to_string());
            }
        }
    }

    result.duration_ms = start.elapsed().as_millis() as u64;
    result
}
