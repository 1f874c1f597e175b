// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Command-line arguments for `newman-runner`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "newman-runner",
    version,
    about = "Curate a directory of Postman collections and run them through newman.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the persisted state file (directory, environment, selection).
    #[arg(long, value_name = "PATH", default_value = ".newman-runner/state.toml", global = true)]
    pub state: PathBuf,

    /// Path to the runner config file (TOML). Defaults apply if it is missing.
    #[arg(long, value_name = "PATH", default_value = "NewmanRunner.toml", global = true)]
    pub config: PathBuf,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `NEWMAN_RUNNER_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Set the directory scanned for `*.postman_collection.json` files.
    ///
    /// This clears the current selection.
    SetDir {
        #[arg(value_name = "DIR")]
        dir: PathBuf,
    },

    /// Set the Postman environment file passed to newman.
    SetEnv {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Stop passing an environment file to newman.
    ClearEnv,

    /// Reconcile with the directory and print both lists.
    #[command(alias = "refresh")]
    List,

    /// Move collections (by name or path) into the execution list.
    Select {
        #[arg(value_name = "NAME", required = true)]
        names: Vec<String>,
    },

    /// Move collections (by name or path) back to the available list.
    Deselect {
        #[arg(value_name = "NAME", required = true)]
        names: Vec<String>,
    },

    /// Execute every selected collection as one batch.
    Run {
        /// Print the newman invocations without executing anything.
        #[arg(long)]
        dry_run: bool,
    },

    /// Print report and log file locations for collections.
    Paths {
        #[arg(value_name = "NAME", required = true)]
        names: Vec<String>,
    },
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
