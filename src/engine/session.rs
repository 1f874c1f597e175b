// src/engine/session.rs

//! The owner context for collection state.
//!
//! A [`Session`] owns the available/selected collections and is the only
//! place where their membership changes. Every membership change is written
//! through to the settings store. During a batch the session drains the
//! orchestrator's events and applies them to its own copy of the selection,
//! so readers of [`Session::collections`] see statuses as they happen.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::collections::{
    discover_collections, CollectionSet, RunStatus, TestCollectionRef, TestCollectionRun,
};
use crate::config::ConfigFile;
use crate::errors::{Result, RunnerError};
use crate::exec::{CollectionExecutor, ExecutorSettings, Invocation, ProcessBackend, ReportPaths};
use crate::fs::FileSystem;
use crate::store::SettingsStore;

use super::orchestrator::ExecutionOrchestrator;
use super::RunnerEvent;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Outcome of one batch, in execution order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    pub runs: Vec<TestCollectionRun>,
}

impl BatchSummary {
    pub fn passed(&self) -> usize {
        self.count(RunStatus::Pass)
    }

    pub fn failed(&self) -> usize {
        self.count(RunStatus::Fail)
    }

    pub fn all_passed(&self) -> bool {
        self.failed() == 0
    }

    fn count(&self, status: RunStatus) -> usize {
        self.runs.iter().filter(|r| r.status() == status).count()
    }
}

pub struct Session<B: ProcessBackend + 'static> {
    fs: Arc<dyn FileSystem>,
    store: Box<dyn SettingsStore>,
    backend: Arc<B>,
    config: ConfigFile,
    collections: CollectionSet,
    orchestrator: ExecutionOrchestrator<B>,
    events_tx: mpsc::Sender<RunnerEvent>,
    events_rx: mpsc::Receiver<RunnerEvent>,
}

impl<B: ProcessBackend + 'static> fmt::Debug for Session<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("store", &self.store)
            .field("collections", &self.collections)
            .field("orchestrator", &self.orchestrator)
            .finish_non_exhaustive()
    }
}

impl<B: ProcessBackend + 'static> Session<B> {
    /// Build a session from its collaborators. Call [`Session::refresh`] to
    /// load the collections.
    pub fn new(
        fs: Arc<dyn FileSystem>,
        store: Box<dyn SettingsStore>,
        backend: Arc<B>,
        config: ConfigFile,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let orchestrator =
            build_orchestrator(&backend, &config, store.environment_file(), events_tx.clone());
        Self {
            fs,
            store,
            backend,
            config,
            collections: CollectionSet::new(),
            orchestrator,
            events_tx,
            events_rx,
        }
    }

    pub fn collections(&self) -> &CollectionSet {
        &self.collections
    }

    pub fn store(&self) -> &dyn SettingsStore {
        self.store.as_ref()
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    pub fn is_executing(&self) -> bool {
        self.orchestrator.is_executing()
    }

    pub fn collection_directory(&self) -> Option<PathBuf> {
        self.store.collection_directory()
    }

    /// Point the session at a new collection directory. The persisted
    /// selection is cleared before the new directory is reconciled.
    pub fn set_collection_directory(&mut self, dir: &Path) -> Result<()> {
        self.store.set_collection_directory(dir)?;
        self.store.clear_selected_for_execution()?;
        info!(dir = %dir.display(), "test collection directory changed");
        self.refresh()
    }

    /// Set or clear the environment file used by subsequent batches.
    pub fn set_environment_file(&mut self, file: Option<&Path>) -> Result<()> {
        if self.is_executing() {
            return Err(RunnerError::BatchAlreadyRunning);
        }
        self.store.set_environment_file(file)?;
        self.orchestrator = build_orchestrator(
            &self.backend,
            &self.config,
            self.store.environment_file(),
            self.events_tx.clone(),
        );
        Ok(())
    }

    /// Reconcile the collections with the directory contents and the
    /// persisted selection, then write the selection back.
    ///
    /// Without a configured directory this does nothing.
    pub fn refresh(&mut self) -> Result<()> {
        let Some(dir) = self.store.collection_directory() else {
            debug!("no test collection directory set; nothing to refresh");
            return Ok(());
        };

        let discovered = discover_collections(self.fs.as_ref(), &dir);
        let persisted = self.store.selected_for_execution();
        self.collections.reconcile(&discovered, &persisted);
        self.persist_selection()
    }

    pub fn move_to_selected<C: AsRef<TestCollectionRef>>(&mut self, collections: &[C]) -> Result<usize> {
        let moved = self.collections.move_to_selected(collections);
        self.persist_selection()?;
        Ok(moved)
    }

    pub fn move_to_available<C: AsRef<TestCollectionRef>>(&mut self, collections: &[C]) -> Result<usize> {
        let moved = self.collections.move_to_available(collections);
        self.persist_selection()?;
        Ok(moved)
    }

    /// Select collections by display name or path. Returns the queries that
    /// matched nothing; already-selected collections are not reported.
    pub fn select_by_name(&mut self, queries: &[String]) -> Result<Vec<String>> {
        let mut found = Vec::new();
        let mut unknown = Vec::new();
        for query in queries {
            if let Some(c) = self.collections.find_available(query) {
                found.push(c.clone());
            } else if self.collections.find_selected(query).is_some() {
                debug!(query = %query, "collection already selected");
            } else {
                unknown.push(query.clone());
            }
        }
        self.move_to_selected(&found)?;
        Ok(unknown)
    }

    /// Deselect collections by display name or path. Returns the queries that
    /// matched nothing; already-available collections are not reported.
    pub fn deselect_by_name(&mut self, queries: &[String]) -> Result<Vec<String>> {
        let mut found = Vec::new();
        let mut unknown = Vec::new();
        for query in queries {
            if let Some(run) = self.collections.find_selected(query) {
                found.push(run.clone());
            } else if self.collections.find_available(query).is_some() {
                debug!(query = %query, "collection not selected");
            } else {
                unknown.push(query.clone());
            }
        }
        self.move_to_available(&found)?;
        Ok(unknown)
    }

    /// Find a collection in either list.
    pub fn resolve(&self, query: &str) -> Option<TestCollectionRef> {
        self.collections
            .find_selected(query)
            .map(|run| run.collection().clone())
            .or_else(|| self.collections.find_available(query).cloned())
    }

    pub fn report_paths(&self, collection: &TestCollectionRef) -> ReportPaths {
        self.executor().report_paths(collection)
    }

    /// The commands a batch of the current selection would run.
    pub fn planned_invocations(&self) -> Vec<(TestCollectionRef, Invocation)> {
        self.collections
            .selected()
            .iter()
            .map(|run| (run.collection().clone(), self.executor().invocation(run.collection())))
            .collect()
    }

    /// Start a batch of the current selection without waiting for it.
    ///
    /// Events still queued from an earlier batch are applied first. The
    /// session's copy of the statuses only advances while events are being
    /// drained: pass the handle to [`Session::wait_for_batch`], or call
    /// [`Session::apply_pending_events`] periodically.
    pub fn start_batch(&mut self) -> Result<JoinHandle<Vec<TestCollectionRun>>> {
        let stale = self.apply_pending_events();
        if !stale.is_empty() {
            debug!(count = stale.len(), "applied events left over from an earlier batch");
        }
        let runs = self.collections.selected().to_vec();
        self.orchestrator.execute_batch(runs)
    }

    /// Apply every event that is already queued, without waiting. Returns
    /// them in arrival order.
    pub fn apply_pending_events(&mut self) -> Vec<RunnerEvent> {
        let mut applied = Vec::new();
        while let Ok(event) = self.events_rx.try_recv() {
            self.apply_event(&event);
            applied.push(event);
        }
        applied
    }

    /// Drive a batch started with [`Session::start_batch`] to completion.
    ///
    /// Events are applied as they arrive and then handed to `on_event`. Once
    /// the batch task has returned, its runs are applied last, so the
    /// selection always agrees with the returned summary.
    pub async fn wait_for_batch<F>(
        &mut self,
        mut handle: JoinHandle<Vec<TestCollectionRun>>,
        mut on_event: F,
    ) -> Result<BatchSummary>
    where
        F: FnMut(&RunnerEvent),
    {
        let joined = loop {
            tokio::select! {
                biased;
                Some(event) = self.events_rx.recv() => {
                    self.apply_event(&event);
                    on_event(&event);
                }
                joined = &mut handle => break joined,
            }
        };
        let runs = joined.map_err(anyhow::Error::from)?;

        for event in self.apply_pending_events() {
            on_event(&event);
        }
        for run in &runs {
            self.collections.apply_status(run.path(), run.status());
        }
        Ok(BatchSummary { runs })
    }

    /// Execute the current selection as one batch and wait for it, applying
    /// every status event to the selection. `on_event` sees each event after
    /// it has been applied.
    pub async fn execute_selected<F>(&mut self, on_event: F) -> Result<BatchSummary>
    where
        F: FnMut(&RunnerEvent),
    {
        let handle = self.start_batch()?;
        self.wait_for_batch(handle, on_event).await
    }

    fn apply_event(&mut self, event: &RunnerEvent) {
        match event {
            RunnerEvent::StatusChanged { collection, status } => {
                if !self.collections.apply_status(collection.path(), *status) {
                    warn!(collection = %collection, "status for a collection that is no longer selected");
                }
            }
            RunnerEvent::BatchFinished { runs } => {
                for run in runs {
                    self.collections.apply_status(run.path(), run.status());
                }
            }
        }
    }

    fn executor(&self) -> &CollectionExecutor<B> {
        self.orchestrator.executor()
    }

    fn persist_selection(&mut self) -> Result<()> {
        self.store
            .set_selected_for_execution(self.collections.selected())
    }
}

fn build_orchestrator<B: ProcessBackend + 'static>(
    backend: &Arc<B>,
    config: &ConfigFile,
    environment_file: Option<PathBuf>,
    events: mpsc::Sender<RunnerEvent>,
) -> ExecutionOrchestrator<B> {
    let settings = ExecutorSettings::from_config(config, environment_file);
    let executor = CollectionExecutor::new(Arc::clone(backend), settings, events.clone());
    ExecutionOrchestrator::new(executor, config.runner.mode, events)
}
