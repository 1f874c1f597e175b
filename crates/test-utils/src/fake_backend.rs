use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use newman_runner::exec::{ProcessBackend, ProcessRequest};

/// What a scripted "process" does when it is run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeOutcome {
    /// Exit with this code.
    Exit(i32),
    /// The executable could not be started.
    StartFailure,
    /// The log files could not be prepared.
    SetupError,
    /// The backend itself panics while the run is in flight.
    Panic,
}

/// Start/finish markers, in the order they happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeEvent {
    Started(String),
    Finished(String),
}

/// A process backend that never spawns anything:
/// - outcomes are scripted per log prefix (the collection's display name),
///   defaulting to exit code 0
/// - every run sleeps for `run_time` so overlapping runs would be visible
/// - start/finish order and the peak number of simultaneous runs are recorded
#[derive(Debug, Clone, Default)]
pub struct FakeProcessBackend {
    outcomes: Arc<Mutex<HashMap<String, FakeOutcome>>>,
    timeline: Arc<Mutex<Vec<FakeEvent>>>,
    requests: Arc<Mutex<Vec<ProcessRequest>>>,
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    run_time: Duration,
}

impl FakeProcessBackend {
    pub fn new() -> Self {
        Self {
            run_time: Duration::from_millis(20),
            ..Self::default()
        }
    }

    pub fn with_run_time(mut self, run_time: Duration) -> Self {
        self.run_time = run_time;
        self
    }

    pub fn script(self, name: &str, outcome: FakeOutcome) -> Self {
        self.outcomes
            .lock()
            .unwrap()
            .insert(name.to_string(), outcome);
        self
    }

    pub fn timeline(&self) -> Vec<FakeEvent> {
        self.timeline.lock().unwrap().clone()
    }

    pub fn requests(&self) -> Vec<ProcessRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Highest number of runs that were in flight at the same time.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

impl ProcessBackend for FakeProcessBackend {
    fn run(
        &self,
        request: ProcessRequest,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<bool>> + Send + '_>> {
        let name = request.log_prefix.clone();
        let outcome = self
            .outcomes
            .lock()
            .unwrap()
            .get(&name)
            .copied()
            .unwrap_or(FakeOutcome::Exit(0));
        self.requests.lock().unwrap().push(request);

        Box::pin(async move {
            if outcome == FakeOutcome::SetupError {
                return Err(anyhow::anyhow!("cannot create log files for {name}"));
            }

            self.timeline
                .lock()
                .unwrap()
                .push(FakeEvent::Started(name.clone()));
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            tokio::time::sleep(self.run_time).await;

            if outcome == FakeOutcome::Panic {
                self.active.fetch_sub(1, Ordering::SeqCst);
                panic!("fake backend panicked while running {name}");
            }

            self.active.fetch_sub(1, Ordering::SeqCst);
            self.timeline
                .lock()
                .unwrap()
                .push(FakeEvent::Finished(name.clone()));

            Ok(match outcome {
                FakeOutcome::Exit(code) => code == 0,
                FakeOutcome::StartFailure | FakeOutcome::SetupError | FakeOutcome::Panic => false,
            })
        })
    }
}
