// src/exec/backend.rs

//! Pluggable process backend abstraction.
//!
//! The collection executor talks to a `ProcessBackend` instead of spawning
//! processes itself. This makes it easy to swap in a fake backend in tests
//! (scripted exit codes, recorded start/finish order) while keeping the
//! production implementation in [`super::subprocess`].

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use anyhow::Result;

use super::subprocess::run_logged;

/// Everything needed to run one external command with logged stdio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessRequest {
    pub log_dir: PathBuf,
    pub log_prefix: String,
    pub program: String,
    pub args: Vec<String>,
}

/// Trait abstracting how a single external command is executed.
///
/// Implementations resolve to:
/// - `Ok(true)` when the command exited with code 0,
/// - `Ok(false)` for a nonzero exit or a command that could not be started,
/// - `Err` when the run could not even be set up (e.g. the log directory).
pub trait ProcessBackend: Send + Sync {
    fn run(
        &self,
        request: ProcessRequest,
    ) -> Pin<Box<dyn Future<Output = Result<bool>> + Send + '_>>;
}

/// Real backend used in production: spawns OS processes.
#[derive(Debug, Clone, Default)]
pub struct RealProcessBackend;

impl RealProcessBackend {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessBackend for RealProcessBackend {
    fn run(
        &self,
        request: ProcessRequest,
    ) -> Pin<Box<dyn Future<Output = Result<bool>> + Send + '_>> {
        Box::pin(async move {
            run_logged(
                &request.log_dir,
                &request.log_prefix,
                &request.program,
                &request.args,
            )
            .await
        })
    }
}
