// src/lib.rs

pub mod cli;
pub mod collections;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod store;
pub mod types;

use std::sync::Arc;

use tracing::{debug, warn};

use crate::cli::{CliArgs, Command};
use crate::collections::RunStatus;
use crate::config::load_or_default;
use crate::engine::{BatchSummary, RunnerEvent, Session};
use crate::errors::{Result, RunnerError};
use crate::exec::{ProcessBackend, RealProcessBackend};
use crate::fs::{FileSystem, RealFileSystem};
use crate::store::{FileSettingsStore, SettingsStore};

/// High-level entry point used by `main.rs`. Returns the process exit code.
///
/// This wires together:
/// - config loading
/// - the settings store and file system
/// - the session (reconciler + orchestrator + executor)
/// - the selected subcommand
pub async fn run(args: CliArgs) -> Result<i32> {
    let cfg = load_or_default(&args.config)?;

    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let store = FileSettingsStore::open(Arc::clone(&fs), &args.state);
    let backend = Arc::new(RealProcessBackend::new());

    let mut session = Session::new(Arc::clone(&fs), Box::new(store), backend, cfg);
    session.refresh()?;

    match args.command {
        Command::SetDir { dir } => {
            let dir = std::path::absolute(&dir)?;
            if !fs.is_dir(&dir) {
                warn!(dir = %dir.display(), "directory does not exist (yet)");
            }
            session.set_collection_directory(&dir)?;
            print_collections(&session);
        }
        Command::SetEnv { file } => {
            let file = std::path::absolute(&file)?;
            if !fs.is_file(&file) {
                warn!(file = %file.display(), "environment file does not exist (yet)");
            }
            session.set_environment_file(Some(&file))?;
            println!("environment file: {}", file.display());
        }
        Command::ClearEnv => {
            session.set_environment_file(None)?;
            println!("environment file cleared");
        }
        Command::List => {
            require_directory(&session)?;
            print_collections(&session);
        }
        Command::Select { names } => {
            require_directory(&session)?;
            let unknown = session.select_by_name(&names)?;
            report_unknown(&unknown);
            print_collections(&session);
        }
        Command::Deselect { names } => {
            require_directory(&session)?;
            let unknown = session.deselect_by_name(&names)?;
            report_unknown(&unknown);
            print_collections(&session);
        }
        Command::Run { dry_run } => {
            require_directory(&session)?;
            if dry_run {
                print_dry_run(&session);
                return Ok(0);
            }
            if session.collections().selected().is_empty() {
                println!("no test collections selected; use `select <NAME>...` first");
                return Ok(0);
            }

            let summary = session.execute_selected(print_event).await?;
            print_summary(&summary);
            return Ok(if summary.all_passed() { 0 } else { 1 });
        }
        Command::Paths { names } => {
            require_directory(&session)?;
            for name in &names {
                let collection = session
                    .resolve(name)
                    .ok_or_else(|| RunnerError::CollectionNotFound(name.clone()))?;
                let paths = session.report_paths(&collection);
                println!("{collection}:");
                println!("  html:       {}", paths.html.display());
                println!("  json:       {}", paths.json.display());
                println!("  stdout log: {}", paths.stdout_log.display());
                println!("  stderr log: {}", paths.stderr_log.display());
                println!("  stdin log:  {}", paths.stdin_log.display());
            }
        }
    }

    Ok(0)
}

fn require_directory<B: ProcessBackend + 'static>(session: &Session<B>) -> Result<()> {
    match session.collection_directory() {
        Some(_) => Ok(()),
        None => Err(RunnerError::DirectoryNotSet),
    }
}

fn report_unknown(unknown: &[String]) {
    for name in unknown {
        warn!(name = %name, "no such test collection");
    }
}

fn print_collections<B: ProcessBackend + 'static>(session: &Session<B>) {
    if let Some(dir) = session.collection_directory() {
        println!("directory: {}", dir.display());
    }
    if let Some(env) = session.store().environment_file() {
        println!("environment: {}", env.display());
    }

    let collections = session.collections();
    println!();
    println!("available ({}):", collections.available().len());
    for c in collections.available() {
        println!("  - {c}");
    }

    println!();
    println!("selected for execution ({}):", collections.selected().len());
    for run in collections.selected() {
        println!("  - {} [{}]", run.display_name(), run.status());
    }
}

fn print_event(event: &RunnerEvent) {
    match event {
        RunnerEvent::StatusChanged { collection, status } => match status {
            RunStatus::NotStarted => debug!(collection = %collection, "queued"),
            RunStatus::Executing => println!("[{collection}] {status} ..."),
            RunStatus::Pass | RunStatus::Fail => println!("[{collection}] {status}"),
        },
        RunnerEvent::BatchFinished { runs } => debug!(count = runs.len(), "batch finished"),
    }
}

fn print_summary(summary: &BatchSummary) {
    println!();
    println!(
        "{} passed, {} failed ({} total)",
        summary.passed(),
        summary.failed(),
        summary.runs.len()
    );
    for run in summary.runs.iter().filter(|r| r.status() == RunStatus::Fail) {
        println!("  failed: {}", run.display_name());
    }
}

/// Print the commands a batch would run, without running anything.
fn print_dry_run<B: ProcessBackend + 'static>(session: &Session<B>) {
    println!("newman-runner dry-run");
    println!("  mode = {:?}", session.config().runner.mode);
    println!("  output_dir = {}", session.config().runner.output_dir.display());
    println!();

    let planned = session.planned_invocations();
    println!("collections ({}):", planned.len());
    for (collection, invocation) in planned {
        println!("  - {collection}");
        println!("      cmd: {invocation}");
    }

    debug!("dry-run complete (no execution)");
}
