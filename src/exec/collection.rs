// src/exec/collection.rs

//! Turns one selected collection into a `newman run ...` invocation and maps
//! the process result onto a [`RunStatus`].

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::collections::{RunStatus, TestCollectionRef, TestCollectionRun};
use crate::config::ConfigFile;
use crate::engine::RunnerEvent;
use crate::exec::backend::{ProcessBackend, ProcessRequest};
use crate::exec::subprocess::{command_line, log_file_path, LogStream};

/// HTML reporter template looked up in the templates directory.
pub const HTML_TEMPLATE_FILE: &str = "htmlreqres.hbs";

/// Inputs that shape every invocation of the external runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorSettings {
    pub tool: String,
    pub output_dir: PathBuf,
    pub templates_dir: PathBuf,
    pub environment_file: Option<PathBuf>,
}

impl ExecutorSettings {
    pub fn from_config(cfg: &ConfigFile, environment_file: Option<PathBuf>) -> Self {
        Self {
            tool: cfg.runner.tool.clone(),
            output_dir: cfg.runner.output_dir.clone(),
            templates_dir: cfg.runner.templates_dir.clone(),
            environment_file,
        }
    }
}

/// A fully resolved command: program plus arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    /// On Windows `newman` is a PowerShell script shim, so it is launched as
    /// `powershell <tool> <args...>`. Everywhere else the tool runs directly.
    fn for_platform(tool: &str, tool_args: Vec<String>) -> Self {
        if cfg!(windows) {
            Self::through_powershell(tool, tool_args)
        } else {
            Self::direct(tool, tool_args)
        }
    }

    fn direct(tool: &str, tool_args: Vec<String>) -> Self {
        Self {
            program: tool.to_string(),
            args: tool_args,
        }
    }

    /// PowerShell re-parses its joined arguments, so every value (paths in
    /// particular) is passed as a single-quoted literal. Flags stay bare.
    fn through_powershell(tool: &str, tool_args: Vec<String>) -> Self {
        let mut args = Vec::with_capacity(tool_args.len() + 1);
        args.push(tool.to_string());
        args.extend(tool_args.into_iter().map(|arg| {
            if arg.starts_with('-') {
                arg
            } else {
                powershell_quote(&arg)
            }
        }));
        Self {
            program: "powershell".to_string(),
            args,
        }
    }
}

/// `'...'` literal; an embedded `'` is written twice.
fn powershell_quote(arg: &str) -> String {
    format!("'{}'", arg.replace('\'', "''"))
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&command_line(&self.program, &self.args))
    }
}

/// Where the reports and logs of a collection end up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportPaths {
    pub json: PathBuf,
    pub html: PathBuf,
    pub stdin_log: PathBuf,
    pub stderr_log: PathBuf,
    pub stdout_log: PathBuf,
}

impl ReportPaths {
    pub fn new(output_dir: &Path, collection: &TestCollectionRef) -> Self {
        let name = collection.display_name();
        Self {
            json: output_dir.join(format!("{name}.json")),
            html: output_dir.join(format!("{name}.html")),
            stdin_log: log_file_path(output_dir, name, LogStream::Stdin),
            stderr_log: log_file_path(output_dir, name, LogStream::Stderr),
            stdout_log: log_file_path(output_dir, name, LogStream::Stdout),
        }
    }
}

/// Executes single collections through a [`ProcessBackend`].
///
/// While a run is `Executing`, this is the only writer of its status. Every
/// transition is also published as [`RunnerEvent::StatusChanged`].
pub struct CollectionExecutor<B: ProcessBackend> {
    backend: Arc<B>,
    settings: ExecutorSettings,
    events: mpsc::Sender<RunnerEvent>,
}

impl<B: ProcessBackend> fmt::Debug for CollectionExecutor<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionExecutor")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl<B: ProcessBackend> CollectionExecutor<B> {
    pub fn new(
        backend: Arc<B>,
        settings: ExecutorSettings,
        events: mpsc::Sender<RunnerEvent>,
    ) -> Self {
        Self {
            backend,
            settings,
            events,
        }
    }

    pub fn settings(&self) -> &ExecutorSettings {
        &self.settings
    }

    pub fn report_paths(&self, collection: &TestCollectionRef) -> ReportPaths {
        ReportPaths::new(&self.settings.output_dir, collection)
    }

    /// Arguments passed to the runner tool itself, collection path last.
    pub fn runner_args(&self, collection: &TestCollectionRef) -> Vec<String> {
        let reports = self.report_paths(collection);
        let template = self.settings.templates_dir.join(HTML_TEMPLATE_FILE);

        let mut args = vec!["run".to_string()];
        if let Some(env) = &self.settings.environment_file {
            args.push("--environment".to_string());
            args.push(env.display().to_string());
        }
        args.extend([
            "--reporters".to_string(),
            "json,html".to_string(),
            "--reporter-json-export".to_string(),
            reports.json.display().to_string(),
            "--reporter-html-template".to_string(),
            template.display().to_string(),
            "--reporter-html-export".to_string(),
            reports.html.display().to_string(),
            collection.path().display().to_string(),
        ]);
        args
    }

    pub fn invocation(&self, collection: &TestCollectionRef) -> Invocation {
        Invocation::for_platform(&self.settings.tool, self.runner_args(collection))
    }

    /// Run one collection: `Executing`, then `Pass` on exit code 0 and `Fail`
    /// otherwise. Setup errors also end in `Fail`.
    pub async fn execute(&self, run: &mut TestCollectionRun) -> RunStatus {
        self.transition(run, RunStatus::Executing).await;

        let invocation = self.invocation(run.collection());
        let request = ProcessRequest {
            log_dir: self.settings.output_dir.clone(),
            log_prefix: run.display_name().to_string(),
            program: invocation.program,
            args: invocation.args,
        };

        let passed = match self.backend.run(request).await {
            Ok(passed) => passed,
            Err(err) => {
                error!(
                    collection = %run.collection(),
                    error = %err,
                    "could not set up collection run"
                );
                false
            }
        };

        let status = if passed { RunStatus::Pass } else { RunStatus::Fail };
        info!(collection = %run.collection(), %status, "collection finished");
        self.transition(run, status).await;
        status
    }

    async fn transition(&self, run: &mut TestCollectionRun, status: RunStatus) {
        run.set_status(status);
        debug!(collection = %run.collection(), %status, "status changed");
        if self
            .events
            .send(RunnerEvent::StatusChanged {
                collection: run.collection().clone(),
                status,
            })
            .await
            .is_err()
        {
            debug!("no listener for status events");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Mutex;

    struct ScriptedBackend {
        result: Result<bool, String>,
        seen: Mutex<Vec<ProcessRequest>>,
    }

    impl ProcessBackend for ScriptedBackend {
        fn run(
            &self,
            request: ProcessRequest,
        ) -> Pin<Box<dyn Future<Output = anyhow::Result<bool>> + Send + '_>> {
            self.seen.lock().unwrap().push(request);
            let result = self.result.clone().map_err(anyhow::Error::msg);
            Box::pin(async move { result })
        }
    }

    fn settings(env: Option<&str>) -> ExecutorSettings {
        ExecutorSettings {
            tool: "newman".to_string(),
            output_dir: PathBuf::from("newman"),
            templates_dir: PathBuf::from("templates"),
            environment_file: env.map(PathBuf::from),
        }
    }

    fn executor(
        result: Result<bool, String>,
        env: Option<&str>,
    ) -> (
        CollectionExecutor<ScriptedBackend>,
        Arc<ScriptedBackend>,
        mpsc::Receiver<RunnerEvent>,
    ) {
        let backend = Arc::new(ScriptedBackend {
            result,
            seen: Mutex::new(Vec::new()),
        });
        let (tx, rx) = mpsc::channel(16);
        (
            CollectionExecutor::new(backend.clone(), settings(env), tx),
            backend,
            rx,
        )
    }

    fn users() -> TestCollectionRef {
        TestCollectionRef::new("/suite/users.postman_collection.json")
    }

    #[test]
    fn runner_args_with_environment() {
        let (exec, _, _) = executor(Ok(true), Some("/env/dev.json"));
        let args = exec.runner_args(&users());
        let expected = vec![
            "run".to_string(),
            "--environment".to_string(),
            "/env/dev.json".to_string(),
            "--reporters".to_string(),
            "json,html".to_string(),
            "--reporter-json-export".to_string(),
            Path::new("newman").join("users.json").display().to_string(),
            "--reporter-html-template".to_string(),
            Path::new("templates").join("htmlreqres.hbs").display().to_string(),
            "--reporter-html-export".to_string(),
            Path::new("newman").join("users.html").display().to_string(),
            "/suite/users.postman_collection.json".to_string(),
        ];
        assert_eq!(args, expected);
    }

    #[test]
    fn runner_args_without_environment() {
        let (exec, _, _) = executor(Ok(true), None);
        let args = exec.runner_args(&users());
        assert_eq!(args[0], "run");
        assert!(!args.iter().any(|a| a == "--environment"));
        assert_eq!(args.last().map(String::as_str), Some("/suite/users.postman_collection.json"));
    }

    #[cfg(not(windows))]
    #[test]
    fn tool_is_invoked_directly() {
        let (exec, _, _) = executor(Ok(true), None);
        let invocation = exec.invocation(&users());
        assert_eq!(invocation.program, "newman");
        assert_eq!(invocation.args[0], "run");
    }

    #[cfg(windows)]
    #[test]
    fn tool_is_wrapped_in_powershell() {
        let (exec, _, _) = executor(Ok(true), None);
        let invocation = exec.invocation(&users());
        assert_eq!(invocation.program, "powershell");
        assert_eq!(invocation.args[0], "newman");
        assert_eq!(invocation.args[1], "'run'");
    }

    #[test]
    fn powershell_arguments_are_quoted_literals() {
        let args = vec![
            "run".to_string(),
            "--environment".to_string(),
            "C:\\My Envs\\dev.json".to_string(),
            "C:\\suite\\Bob's API.postman_collection.json".to_string(),
        ];
        let invocation = Invocation::through_powershell("newman", args);
        assert_eq!(invocation.program, "powershell");
        assert_eq!(
            invocation.args,
            vec![
                "newman".to_string(),
                "'run'".to_string(),
                "--environment".to_string(),
                "'C:\\My Envs\\dev.json'".to_string(),
                "'C:\\suite\\Bob''s API.postman_collection.json'".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn zero_exit_passes_and_emits_transitions() {
        let (exec, backend, mut rx) = executor(Ok(true), None);
        let mut run = users().into_run();

        assert_eq!(exec.execute(&mut run).await, RunStatus::Pass);
        assert_eq!(run.status(), RunStatus::Pass);

        let mut statuses = Vec::new();
        while let Ok(RunnerEvent::StatusChanged { status, .. }) = rx.try_recv() {
            statuses.push(status);
        }
        assert_eq!(statuses, vec![RunStatus::Executing, RunStatus::Pass]);

        let seen = backend.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].log_prefix, "users");
        assert_eq!(seen[0].log_dir, PathBuf::from("newman"));
    }

    #[tokio::test]
    async fn nonzero_exit_fails() {
        let (exec, _, _rx) = executor(Ok(false), None);
        let mut run = users().into_run();
        assert_eq!(exec.execute(&mut run).await, RunStatus::Fail);
    }

    #[tokio::test]
    async fn setup_error_fails_instead_of_sticking() {
        let (exec, _, _rx) = executor(Err("log dir is read-only".to_string()), None);
        let mut run = users().into_run();
        assert_eq!(exec.execute(&mut run).await, RunStatus::Fail);
        assert_eq!(run.status(), RunStatus::Fail);
    }

    #[test]
    fn report_paths_use_display_name() {
        let paths = ReportPaths::new(Path::new("out"), &users());
        let out = Path::new("out");
        assert_eq!(paths.html, out.join("users.html"));
        assert_eq!(paths.json, out.join("users.json"));
        assert_eq!(paths.stdout_log, out.join("users_out.log"));
    }
}
