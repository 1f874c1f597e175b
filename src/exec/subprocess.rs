// src/exec/subprocess.rs

//! Runs one external command to completion with its stdio redirected to log
//! files.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::process::Command;
use tracing::{error, info};

/// One of the three redirected standard streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStream {
    Stdin,
    Stderr,
    Stdout,
}

impl LogStream {
    fn suffix(self) -> &'static str {
        match self {
            LogStream::Stdin => "_in.log",
            LogStream::Stderr => "_err.log",
            LogStream::Stdout => "_out.log",
        }
    }
}

/// `<log_dir>/<prefix>_in.log`, `_err.log` or `_out.log`.
pub fn log_file_path(log_dir: &Path, prefix: &str, stream: LogStream) -> PathBuf {
    log_dir.join(format!("{prefix}{}", stream.suffix()))
}

/// Run `program args...` and wait for it.
///
/// - `log_dir` is created if missing; the three log files are truncated.
/// - Returns `Ok(true)` iff the process exits with code 0.
/// - A process that cannot be started is `Ok(false)`: to the caller it looks
///   like any other failed run.
/// - `Err` means the log files could not be prepared, so nothing was started.
///
/// There is no timeout; a process that never exits blocks the caller.
pub async fn run_logged(
    log_dir: &Path,
    log_prefix: &str,
    program: &str,
    args: &[String],
) -> Result<bool> {
    fs::create_dir_all(log_dir)
        .with_context(|| format!("creating log directory {:?}", log_dir))?;

    let stdin = create_log(log_dir, log_prefix, LogStream::Stdin)?;
    let stderr = create_log(log_dir, log_prefix, LogStream::Stderr)?;
    let stdout = create_log(log_dir, log_prefix, LogStream::Stdout)?;

    println!("{}", command_line(program, args));

    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::from(stdin))
        .stderr(Stdio::from(stderr))
        .stdout(Stdio::from(stdout))
        .kill_on_drop(true);

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(err) => {
            error!(program, error = %err, "failed to start process");
            return Ok(false);
        }
    };

    let status = match child.wait().await {
        Ok(status) => status,
        Err(err) => {
            error!(program, error = %err, "failed waiting for process");
            return Ok(false);
        }
    };

    let code = status.code().unwrap_or(-1);
    info!(
        program,
        log_prefix,
        exit_code = code,
        success = status.success(),
        "process exited"
    );

    Ok(status.success())
}

fn create_log(log_dir: &Path, prefix: &str, stream: LogStream) -> Result<File> {
    let path = log_file_path(log_dir, prefix, stream);
    File::create(&path).with_context(|| format!("creating log file {:?}", path))
}

/// Human-readable rendering of a command, for the trace line.
pub fn command_line(program: &str, args: &[String]) -> String {
    let mut line = program.to_string();
    for arg in args {
        line.push(' ');
        line.push_str(arg);
    }
    line
}
