// src/engine/orchestrator.rs

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tracing::{debug, error, info};

use crate::collections::{RunStatus, TestCollectionRun};
use crate::errors::{Result, RunnerError};
use crate::exec::{CollectionExecutor, ProcessBackend};
use crate::types::ExecutionMode;

use super::RunnerEvent;

/// Runs batches of selected collections, at most one batch at a time.
///
/// The executing flag is set when a batch is accepted and cleared on the
/// batch task once every run is terminal, right before
/// [`RunnerEvent::BatchFinished`] is sent. Nothing else writes it.
pub struct ExecutionOrchestrator<B: ProcessBackend + 'static> {
    executor: Arc<CollectionExecutor<B>>,
    mode: ExecutionMode,
    executing: Arc<AtomicBool>,
    events: mpsc::Sender<RunnerEvent>,
}

impl<B: ProcessBackend + 'static> fmt::Debug for ExecutionOrchestrator<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionOrchestrator")
            .field("mode", &self.mode)
            .field("executing", &self.is_executing())
            .finish_non_exhaustive()
    }
}

impl<B: ProcessBackend + 'static> ExecutionOrchestrator<B> {
    pub fn new(
        executor: CollectionExecutor<B>,
        mode: ExecutionMode,
        events: mpsc::Sender<RunnerEvent>,
    ) -> Self {
        Self {
            executor: Arc::new(executor),
            mode,
            executing: Arc::new(AtomicBool::new(false)),
            events,
        }
    }

    pub fn executor(&self) -> &CollectionExecutor<B> {
        &self.executor
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn is_executing(&self) -> bool {
        self.executing.load(Ordering::SeqCst)
    }

    /// Start a batch on a background task.
    ///
    /// Fails with [`RunnerError::BatchAlreadyRunning`] (and starts nothing) if
    /// a batch is still in flight. The returned handle resolves to the runs
    /// with their terminal statuses, in input order.
    pub fn execute_batch(
        &self,
        runs: Vec<TestCollectionRun>,
    ) -> Result<JoinHandle<Vec<TestCollectionRun>>> {
        if self
            .executing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(RunnerError::BatchAlreadyRunning);
        }

        let executor = Arc::clone(&self.executor);
        let executing = Arc::clone(&self.executing);
        let events = self.events.clone();
        let mode = self.mode;

        info!(count = runs.len(), ?mode, "starting batch");

        Ok(tokio::spawn(async move {
            let runs = reset_all(runs, &events).await;
            let runs = match mode {
                ExecutionMode::Sequential => run_sequentially(executor, runs, &events).await,
                ExecutionMode::Concurrent => run_concurrently(executor, runs, &events).await,
            };

            executing.store(false, Ordering::SeqCst);
            info!(count = runs.len(), "batch finished");

            if events
                .send(RunnerEvent::BatchFinished { runs: runs.clone() })
                .await
                .is_err()
            {
                debug!("no listener for batch completion");
            }
            runs
        }))
    }
}

/// Clear results of any previous batch before the first run starts.
async fn reset_all(
    mut runs: Vec<TestCollectionRun>,
    events: &mpsc::Sender<RunnerEvent>,
) -> Vec<TestCollectionRun> {
    for run in runs.iter_mut() {
        run.set_status(RunStatus::NotStarted);
        notify(events, run, RunStatus::NotStarted).await;
    }
    runs
}

/// One run at a time, in order. Run N+1 starts only after run N is terminal.
///
/// Each run gets its own task so a panicking run ends as `Fail` instead of
/// taking the batch down with it.
async fn run_sequentially<B: ProcessBackend + 'static>(
    executor: Arc<CollectionExecutor<B>>,
    runs: Vec<TestCollectionRun>,
    events: &mpsc::Sender<RunnerEvent>,
) -> Vec<TestCollectionRun> {
    let mut finished = Vec::with_capacity(runs.len());
    for run in runs {
        let executor = Arc::clone(&executor);
        let fallback = run.clone();
        let joined = tokio::spawn(async move {
            let mut run = run;
            executor.execute(&mut run).await;
            run
        })
        .await;

        match joined {
            Ok(run) => finished.push(run),
            Err(err) => finished.push(fail_abandoned(fallback, &err, events).await),
        }
    }
    finished
}

/// Every run on its own task; waits for all of them.
///
/// Concurrent `newman` processes share the output directory, which is only
/// safe while collection names are distinct.
async fn run_concurrently<B: ProcessBackend + 'static>(
    executor: Arc<CollectionExecutor<B>>,
    runs: Vec<TestCollectionRun>,
    events: &mpsc::Sender<RunnerEvent>,
) -> Vec<TestCollectionRun> {
    let mut slots: Vec<Option<TestCollectionRun>> = vec![None; runs.len()];
    let originals = runs.clone();
    let mut set = JoinSet::new();
    let mut task_slots = HashMap::new();

    for (idx, mut run) in runs.into_iter().enumerate() {
        let executor = Arc::clone(&executor);
        let handle = set.spawn(async move {
            executor.execute(&mut run).await;
            run
        });
        task_slots.insert(handle.id(), idx);
    }

    while let Some(joined) = set.join_next_with_id().await {
        match joined {
            Ok((id, run)) => {
                if let Some(&idx) = task_slots.get(&id) {
                    slots[idx] = Some(run);
                }
            }
            Err(err) => {
                if let Some(&idx) = task_slots.get(&err.id()) {
                    let run = fail_abandoned(originals[idx].clone(), &err, events).await;
                    slots[idx] = Some(run);
                }
            }
        }
    }

    slots
        .into_iter()
        .zip(originals)
        .map(|(slot, original)| {
            slot.unwrap_or_else(|| {
                let mut run = original;
                run.set_status(RunStatus::Fail);
                run
            })
        })
        .collect()
}

/// A run whose task panicked never reported a terminal status. Record it as
/// failed so nothing is left `Executing`.
async fn fail_abandoned(
    mut run: TestCollectionRun,
    err: &JoinError,
    events: &mpsc::Sender<RunnerEvent>,
) -> TestCollectionRun {
    error!(collection = %run.collection(), error = %err, "collection task did not complete");
    run.set_status(RunStatus::Fail);
    notify(events, &run, RunStatus::Fail).await;
    run
}

async fn notify(events: &mpsc::Sender<RunnerEvent>, run: &TestCollectionRun, status: RunStatus) {
    if events
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
