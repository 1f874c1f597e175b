// tests/batch_execution.rs

mod common;
use crate::common::{
    collection, collections, init_tracing, with_timeout, FakeEvent, FakeOutcome,
    FakeProcessBackend, SessionBuilder,
};

use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use newman_runner::collections::{RunStatus, TestCollectionRun};
use newman_runner::engine::{ExecutionMode, ExecutionOrchestrator, RunnerEvent};
use newman_runner::errors::RunnerError;
use newman_runner::exec::{CollectionExecutor, ExecutorSettings};

type TestResult = Result<(), Box<dyn Error>>;

fn status_of<B>(session: &newman_runner::engine::Session<B>, name: &str) -> Option<RunStatus>
where
    B: newman_runner::exec::ProcessBackend + 'static,
{
    session
        .collections()
        .find_selected(name)
        .map(|r| r.status())
}

fn orchestrator(
    backend: FakeProcessBackend,
    mode: ExecutionMode,
) -> (
    ExecutionOrchestrator<FakeProcessBackend>,
    mpsc::Receiver<RunnerEvent>,
) {
    let (tx, rx) = mpsc::channel(64);
    let settings = ExecutorSettings {
        tool: "newman".to_string(),
        output_dir: PathBuf::from("newman"),
        templates_dir: PathBuf::from("templates"),
        environment_file: None,
    };
    let executor = CollectionExecutor::new(Arc::new(backend), settings, tx.clone());
    (ExecutionOrchestrator::new(executor, mode, tx), rx)
}

fn runs(names: &[&str]) -> Vec<TestCollectionRun> {
    collections(names).into_iter().map(|c| c.into_run()).collect()
}

#[tokio::test]
async fn selected_collection_that_exits_zero_passes() -> TestResult {
    init_tracing();
    let mut session = SessionBuilder::new().with_files(&["A"]).build();
    session.refresh()?;
    session.move_to_selected(&[collection("A")])?;

    let summary = with_timeout(session.execute_selected(|_| {})).await?;

    assert_eq!(summary.passed(), 1);
    assert!(summary.all_passed());
    assert_eq!(session.collections().selected().len(), 1);
    assert_eq!(status_of(&session, "A"), Some(RunStatus::Pass));
    assert!(!session.is_executing());
    Ok(())
}

#[tokio::test]
async fn failing_then_passing_batch_runs_in_order() -> TestResult {
    init_tracing();
    let backend = FakeProcessBackend::new().script("A", FakeOutcome::Exit(1));
    let mut session = SessionBuilder::new()
        .with_files(&["A", "B"])
        .with_backend(backend.clone())
        .build();
    session.refresh()?;
    session.move_to_selected(&[collection("A"), collection("B")])?;

    let summary = with_timeout(session.execute_selected(|_| {})).await?;

    assert_eq!(status_of(&session, "A"), Some(RunStatus::Fail));
    assert_eq!(status_of(&session, "B"), Some(RunStatus::Pass));
    assert_eq!(summary.failed(), 1);
    assert_eq!(summary.passed(), 1);
    assert!(!session.is_executing());

    assert_eq!(
        backend.timeline(),
        vec![
            FakeEvent::Started("A".to_string()),
            FakeEvent::Finished("A".to_string()),
            FakeEvent::Started("B".to_string()),
            FakeEvent::Finished("B".to_string()),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn statuses_advance_monotonically_one_at_a_time() -> TestResult {
    init_tracing();
    let backend = FakeProcessBackend::new()
        .script("B", FakeOutcome::Exit(2))
        .script("D", FakeOutcome::StartFailure);
    let mut session = SessionBuilder::new()
        .with_files(&["A", "B", "C", "D"])
        .with_backend(backend.clone())
        .build();
    session.refresh()?;
    session.move_to_selected(&collections(&["A", "B", "C", "D"]))?;

    let mut seen: HashMap<String, Vec<RunStatus>> = HashMap::new();
    let mut executing: HashSet<String> = HashSet::new();
    let mut max_executing = 0;

    with_timeout(session.execute_selected(|event| {
        if let RunnerEvent::StatusChanged { collection, status } = event {
            let name = collection.display_name().to_string();
            seen.entry(name.clone()).or_default().push(*status);
            match status {
                RunStatus::Executing => {
                    executing.insert(name);
                }
                RunStatus::Pass | RunStatus::Fail => {
                    executing.remove(&name);
                }
                RunStatus::NotStarted => {}
            }
            max_executing = max_executing.max(executing.len());
        }
    }))
    .await?;

    assert_eq!(max_executing, 1);
    assert_eq!(backend.peak_concurrency(), 1);

    for (name, statuses) in &seen {
        assert_eq!(statuses.len(), 3, "{name}: {statuses:?}");
        assert_eq!(statuses[0], RunStatus::NotStarted, "{name}");
        for pair in statuses.windows(2) {
            assert!(pair[0].can_advance_to(pair[1]), "{name}: {statuses:?}");
        }
    }
    assert_eq!(seen["B"][2], RunStatus::Fail);
    assert_eq!(seen["D"][2], RunStatus::Fail);
    assert_eq!(seen["C"][2], RunStatus::Pass);
    Ok(())
}

#[tokio::test]
async fn setup_error_fails_the_run_and_the_batch_continues() -> TestResult {
    init_tracing();
    let backend = FakeProcessBackend::new().script("A", FakeOutcome::SetupError);
    let mut session = SessionBuilder::new()
        .with_files(&["A", "B"])
        .with_backend(backend.clone())
        .build();
    session.refresh()?;
    session.move_to_selected(&collections(&["A", "B"]))?;

    with_timeout(session.execute_selected(|_| {})).await?;

    assert_eq!(status_of(&session, "A"), Some(RunStatus::Fail));
    assert_eq!(status_of(&session, "B"), Some(RunStatus::Pass));
    Ok(())
}

#[tokio::test]
async fn rerun_resets_previous_results_first() -> TestResult {
    init_tracing();
    let mut session = SessionBuilder::new().with_files(&["A"]).build();
    session.refresh()?;
    session.move_to_selected(&[collection("A")])?;
    with_timeout(session.execute_selected(|_| {})).await?;
    assert_eq!(status_of(&session, "A"), Some(RunStatus::Pass));

    let mut first_status = None;
    with_timeout(session.execute_selected(|event| {
        if let RunnerEvent::StatusChanged { status, .. } = event {
            first_status.get_or_insert(*status);
        }
    }))
    .await?;

    assert_eq!(first_status, Some(RunStatus::NotStarted));
    assert_eq!(status_of(&session, "A"), Some(RunStatus::Pass));
    Ok(())
}

#[tokio::test]
async fn empty_selection_finishes_immediately() -> TestResult {
    init_tracing();
    let mut session = SessionBuilder::new().with_files(&["A"]).build();
    session.refresh()?;

    let summary = with_timeout(session.execute_selected(|_| {})).await?;
    assert!(summary.runs.is_empty());
    assert!(!session.is_executing());
    Ok(())
}

#[tokio::test]
async fn only_one_batch_at_a_time() -> TestResult {
    init_tracing();
    let backend = FakeProcessBackend::new().with_run_time(Duration::from_millis(100));
    let (orchestrator, mut rx) = orchestrator(backend, ExecutionMode::Sequential);

    let handle = orchestrator.execute_batch(runs(&["A"]))?;
    assert!(orchestrator.is_executing());

    match orchestrator.execute_batch(runs(&["B"])) {
        Err(RunnerError::BatchAlreadyRunning) => {}
        other => panic!("expected BatchAlreadyRunning, got {other:?}"),
    }

    let finished = with_timeout(handle).await?;
    assert!(!orchestrator.is_executing());
    assert_eq!(finished.len(), 1);
    assert_eq!(finished[0].status(), RunStatus::Pass);

    let mut last = None;
    while let Ok(event) = rx.try_recv() {
        last = Some(event);
    }
    assert!(matches!(last, Some(RunnerEvent::BatchFinished { .. })));

    // Accepted again once idle.
    let again = orchestrator.execute_batch(runs(&["B"]))?;
    with_timeout(again).await?;
    Ok(())
}

#[tokio::test]
async fn concurrent_mode_overlaps_runs_and_joins_all() -> TestResult {
    init_tracing();
    let backend = FakeProcessBackend::new()
        .with_run_time(Duration::from_millis(100))
        .script("B", FakeOutcome::Exit(1));
    let (orchestrator, _rx) = orchestrator(backend.clone(), ExecutionMode::Concurrent);

    let handle = orchestrator.execute_batch(runs(&["A", "B", "C"]))?;
    let finished = with_timeout(handle).await?;

    assert!(!orchestrator.is_executing());
    let statuses: Vec<_> = finished
        .iter()
        .map(|r| (r.display_name().to_string(), r.status()))
        .collect();
    assert_eq!(
        statuses,
        vec![
            ("A".to_string(), RunStatus::Pass),
            ("B".to_string(), RunStatus::Fail),
            ("C".to_string(), RunStatus::Pass),
        ]
    );
    assert!(backend.peak_concurrency() > 1);
    Ok(())
}

#[tokio::test]
async fn concurrent_mode_is_reachable_through_config() -> TestResult {
    init_tracing();
    let backend = FakeProcessBackend::new().with_run_time(Duration::from_millis(100));
    let mut session = SessionBuilder::new()
        .with_files(&["A", "B"])
        .with_backend(backend.clone())
        .with_mode(ExecutionMode::Concurrent)
        .build();
    session.refresh()?;
    session.move_to_selected(&collections(&["A", "B"]))?;

    let summary = with_timeout(session.execute_selected(|_| {})).await?;
    assert_eq!(summary.passed(), 2);
    assert_eq!(backend.peak_concurrency(), 2);
    Ok(())
}

#[tokio::test]
async fn environment_file_reaches_the_invocation() -> TestResult {
    init_tracing();
    let backend = FakeProcessBackend::new();
    let mut session = SessionBuilder::new()
        .with_files(&["A"])
        .with_backend(backend.clone())
        .build();
    session.refresh()?;
    session.move_to_selected(&[collection("A")])?;
    session.set_environment_file(Some(std::path::Path::new("/env/dev.postman_environment.json")))?;

    with_timeout(session.execute_selected(|_| {})).await?;

    let requests = backend.requests();
    assert_eq!(requests.len(), 1);
    let args = &requests[0].args;
    let env_idx = args
        .iter()
        .position(|a| a == "--environment")
        .expect("environment flag present");
    assert_eq!(args[env_idx + 1], "/env/dev.postman_environment.json");
    assert_eq!(requests[0].log_prefix, "A");
    Ok(())
}

#[tokio::test]
async fn events_left_from_an_unwatched_batch_do_not_leak_into_the_next() -> TestResult {
    init_tracing();
    let backend = FakeProcessBackend::new();
    let mut session = SessionBuilder::new()
        .with_files(&["A"])
        .with_backend(backend.clone())
        .build();
    session.refresh()?;
    session.move_to_selected(&[collection("A")])?;

    // Nobody drains this batch's events.
    let handle = session.start_batch()?;
    let first = with_timeout(handle).await?;
    assert_eq!(first[0].status(), RunStatus::Pass);

    let _ = backend.clone().script("A", FakeOutcome::Exit(1));
    let summary = with_timeout(session.execute_selected(|_| {})).await?;

    assert_eq!(summary.failed(), 1);
    assert_eq!(status_of(&session, "A"), Some(RunStatus::Fail));
    assert!(!session.is_executing());
    Ok(())
}

#[tokio::test]
async fn started_batch_can_be_awaited_through_the_session() -> TestResult {
    init_tracing();
    let mut session = SessionBuilder::new().with_files(&["A", "B"]).build();
    session.refresh()?;
    session.move_to_selected(&collections(&["A", "B"]))?;

    let handle = session.start_batch()?;
    let mut finished_seen = 0;
    let summary = with_timeout(session.wait_for_batch(handle, |event| {
        if matches!(event, RunnerEvent::BatchFinished { .. }) {
            finished_seen += 1;
        }
    }))
    .await?;

    assert_eq!(finished_seen, 1);
    assert_eq!(summary.passed(), 2);
    assert_eq!(status_of(&session, "B"), Some(RunStatus::Pass));
    assert!(session.apply_pending_events().is_empty());
    Ok(())
}

#[tokio::test]
async fn panicking_run_fails_and_the_sequential_batch_finishes() -> TestResult {
    init_tracing();
    let backend = FakeProcessBackend::new().script("A", FakeOutcome::Panic);
    let mut session = SessionBuilder::new()
        .with_files(&["A", "B"])
        .with_backend(backend.clone())
        .build();
    session.refresh()?;
    session.move_to_selected(&collections(&["A", "B"]))?;

    let mut last_for_a = None;
    let summary = with_timeout(session.execute_selected(|event| {
        if let RunnerEvent::StatusChanged { collection, status } = event {
            if collection.display_name() == "A" {
                last_for_a = Some(*status);
            }
        }
    }))
    .await?;

    assert_eq!(last_for_a, Some(RunStatus::Fail));
    assert_eq!(status_of(&session, "A"), Some(RunStatus::Fail));
    assert_eq!(status_of(&session, "B"), Some(RunStatus::Pass));
    assert_eq!(summary.failed(), 1);
    assert!(!session.is_executing());
    assert!(backend.timeline().contains(&FakeEvent::Finished("B".to_string())));
    Ok(())
}

#[tokio::test]
async fn panicking_run_fails_in_concurrent_mode_too() -> TestResult {
    init_tracing();
    let backend = FakeProcessBackend::new().script("B", FakeOutcome::Panic);
    let (orchestrator, _rx) = orchestrator(backend, ExecutionMode::Concurrent);

    let handle = orchestrator.execute_batch(runs(&["A", "B"]))?;
    let finished = with_timeout(handle).await?;

    assert!(!orchestrator.is_executing());
    assert_eq!(finished[0].status(), RunStatus::Pass);
    assert_eq!(finished[1].status(), RunStatus::Fail);
    Ok(())
}
