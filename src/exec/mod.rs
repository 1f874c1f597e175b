// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`subprocess`] runs one command with stdin/stderr/stdout redirected to
//!   `<prefix>_in.log`, `_err.log`, `_out.log` and reports exit code 0.
//! - [`backend`] provides the `ProcessBackend` trait and the production
//!   `RealProcessBackend`; tests substitute scripted backends.
//! - [`collection`] builds the `newman run ...` invocation for one collection
//!   and maps the process result onto a run status.

pub mod backend;
pub mod collection;
pub mod subprocess;

pub use backend::{ProcessBackend, ProcessRequest, RealProcessBackend};
pub use collection::{CollectionExecutor, ExecutorSettings, Invocation, ReportPaths};
pub use subprocess::run_logged;
