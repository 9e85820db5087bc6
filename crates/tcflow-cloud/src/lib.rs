//! tcflow cloud core
//!
//! Drives remote, eventually-consistent cloud operations to a terminal state
//! from a single CRUD call, and translates full desired documents into the
//! sparse partial updates some backend APIs require.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │        CRUD entry point (ManagedResource)        │
//! └───────┬─────────────────────────────┬───────────┘
//!         │ update paths                │
//! ┌───────▼────────┐        ┌───────────▼───────────┐
//! │     patch      │        │       lifecycle       │
//! │ diff → fold    │        │ submit → converge     │
//! └───────┬────────┘        └─────┬───────────┬─────┘
//!         │                       │           │
//!         │               ┌───────▼──┐  ┌─────▼─────┐
//!         └──────────────►│  retry   │  │  waiter   │
//!                         │ invoker  │  │  poller   │
//!                         └────┬─────┘  └─────┬─────┘
//!                              │  ratelimit   │
//!                         ┌────▼──────────────▼─────┐
//!                         │      vendor SDK call     │
//!                         └─────────────────────────┘
//! ```

pub mod error;
pub mod id;
pub mod lifecycle;
pub mod patch;
pub mod provider;
pub mod ratelimit;
pub mod retry;
pub mod state;
pub mod sweep;
pub mod waiter;

// Re-exports
pub use error::{ApiError, CloudError, Result};
pub use lifecycle::{Lifecycle, Outcome, Phase, orchestrate};
pub use patch::{PatchKind, PatchOp, build_partial_update, build_partial_update_coerced};
pub use provider::{
    ManagedResource, create_and_commit, delete_and_commit, read_and_reconcile, update_and_commit,
};
pub use ratelimit::RateLimiter;
pub use retry::{Classifier, Disposition, RetryError, RetryPolicy, invoke, retry};
pub use state::{GlobalState, ResourceState, StateLock, StateManager};
pub use sweep::{SweepResult, sweep};
pub use waiter::{Observe, Target, WaitFailure, WaitSpec, wait_for, wait_observing};
