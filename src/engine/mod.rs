// src/engine/mod.rs

//! Batch orchestration for newman-runner.
//!
//! This module ties together:
//! - the execution orchestrator, which owns the "is a batch executing" flag
//!   and drives the runs of a batch on a background task
//! - the session, which owns the available/selected collections, persists the
//!   selection, and consumes the status events the orchestrator produces
//!
//! Status never travels through shared mutable state: the executor publishes
//! [`RunnerEvent`]s and the session applies them to its own collections.

use crate::collections::{RunStatus, TestCollectionRef, TestCollectionRun};

/// Events flowing from the orchestrator back to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunnerEvent {
    /// A run in the current batch reached a new status.
    StatusChanged {
        collection: TestCollectionRef,
        status: RunStatus,
    },
    /// Every run of the batch is terminal and the executing flag is cleared.
    BatchFinished { runs: Vec<TestCollectionRun> },
}

pub mod orchestrator;
pub mod session;

pub use orchestrator::ExecutionOrchestrator;
pub use session::{BatchSummary, Session};
pub use crate::types::ExecutionMode;
