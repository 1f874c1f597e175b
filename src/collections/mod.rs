// src/collections/mod.rs

//! Test collection identity, execution status, and the available/selected
//! bookkeeping.
//!
//! - [`discovery`] lists `*.postman_collection.json` files in a directory.
//! - [`reconcile`] owns the two ordered collections and keeps them disjoint.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

pub mod discovery;
pub mod reconcile;

pub use discovery::discover_collections;
pub use reconcile::CollectionSet;

/// File name suffix that marks a Postman collection export.
pub const COLLECTION_SUFFIX: &str = ".postman_collection.json";

/// A test collection file, identified by its path.
///
/// Equality and hashing only look at the path.
#[derive(Debug, Clone, Eq)]
pub struct TestCollectionRef {
    path: PathBuf,
    display_name: String,
}

impl TestCollectionRef {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let display_name = display_name_for(&path);
        Self { path, display_name }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Base file name with [`COLLECTION_SUFFIX`] stripped. Used as the key for
    /// report and log files.
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Whether `query` names this collection, either by display name or by
    /// path.
    pub fn matches(&self, query: &str) -> bool {
        self.display_name == query || self.path == Path::new(query)
    }

    pub fn into_run(self) -> TestCollectionRun {
        TestCollectionRun::new(self)
    }
}

fn display_name_for(path: &Path) -> String {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    match file_name.strip_suffix(COLLECTION_SUFFIX) {
        Some(stem) => stem.to_string(),
        None => file_name,
    }
}

impl PartialEq for TestCollectionRef {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Hash for TestCollectionRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.hash(state);
    }
}

impl fmt::Display for TestCollectionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name)
    }
}

impl AsRef<TestCollectionRef> for TestCollectionRef {
    fn as_ref(&self) -> &TestCollectionRef {
        self
    }
}

/// Execution status of a selected collection.
///
/// A run moves `NotStarted -> Executing -> Pass | Fail` and only goes back to
/// `NotStarted` when a new batch starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RunStatus {
    #[default]
    NotStarted,
    Executing,
    Pass,
    Fail,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Pass | RunStatus::Fail)
    }

    /// Whether moving from `self` to `next` is allowed within one batch.
    pub fn can_advance_to(self, next: RunStatus) -> bool {
        matches!(
            (self, next),
            (RunStatus::NotStarted, RunStatus::Executing)
                | (RunStatus::Executing, RunStatus::Pass)
                | (RunStatus::Executing, RunStatus::Fail)
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            RunStatus::NotStarted => "Test Not Started",
            RunStatus::Executing => "Test Execution In Progress",
            RunStatus::Pass => "Pass",
            RunStatus::Fail => "Fail",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A collection selected for execution, together with its current status.
///
/// Compares equal to a [`TestCollectionRef`] with the same path; status is not
/// part of identity.
#[derive(Debug, Clone, Eq)]
pub struct TestCollectionRun {
    collection: TestCollectionRef,
    status: RunStatus,
}

impl TestCollectionRun {
    pub fn new(collection: TestCollectionRef) -> Self {
        Self {
            collection,
            status: RunStatus::NotStarted,
        }
    }

    pub fn collection(&self) -> &TestCollectionRef {
        &self.collection
    }

    pub fn path(&self) -> &Path {
        self.collection.path()
    }

    pub fn display_name(&self) -> &str {
        self.collection.display_name()
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    /// Only the collection executor, the orchestrator's batch reset, and the
    /// session applying their events write this.
    pub(crate) fn set_status(&mut self, status: RunStatus) {
        self.status = status;
    }

    /// Drop the execution state.
    pub fn into_ref(self) -> TestCollectionRef {
        self.collection
    }
}

impl PartialEq for TestCollectionRun {
    fn eq(&self, other: &Self) -> bool {
        self.collection == other.collection
    }
}

impl PartialEq<TestCollectionRef> for TestCollectionRun {
    fn eq(&self, other: &TestCollectionRef) -> bool {
        &self.collection == other
    }
}

impl PartialEq<TestCollectionRun> for TestCollectionRef {
    fn eq(&self, other: &TestCollectionRun) -> bool {
        self == &other.collection
    }
}

impl Hash for TestCollectionRun {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.collection.hash(state);
    }
}

impl AsRef<TestCollectionRef> for TestCollectionRun {
    fn as_ref(&self) -> &TestCollectionRef {
        &self.collection
    }
}

impl From<TestCollectionRef> for TestCollectionRun {
    fn from(collection: TestCollectionRef) -> Self {
        TestCollectionRun::new(collection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn display_name_strips_collection_suffix() {
        let c = TestCollectionRef::new("/suite/users.postman_collection.json");
        assert_eq!(c.display_name(), "users");
        assert_eq!(c.to_string(), "users");

        let other = TestCollectionRef::new("/suite/notes.json");
        assert_eq!(other.display_name(), "notes.json");
    }

    #[test]
    fn run_and_ref_with_same_path_are_equal() {
        let c = TestCollectionRef::new("/suite/a.postman_collection.json");
        let mut run = c.clone().into_run();
        run.set_status(RunStatus::Executing);
        run.set_status(RunStatus::Fail);

        assert_eq!(run, c);
        assert_eq!(c, run);
        assert_eq!(run, TestCollectionRun::new(c.clone()));

        let set: HashSet<TestCollectionRef> = [c.clone(), run.into_ref()].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn only_forward_transitions_are_allowed() {
        use RunStatus::*;
        assert!(NotStarted.can_advance_to(Executing));
        assert!(Executing.can_advance_to(Pass));
        assert!(Executing.can_advance_to(Fail));
        assert!(!NotStarted.can_advance_to(Pass));
        assert!(!Pass.can_advance_to(Executing));
        assert!(!Fail.can_advance_to(NotStarted));
        assert!(Pass.is_terminal() && Fail.is_terminal() && !Executing.is_terminal());
    }

    #[test]
    fn matches_by_name_or_path() {
        let c = TestCollectionRef::new("/suite/orders.postman_collection.json");
        assert!(c.matches("orders"));
        assert!(c.matches("/suite/orders.postman_collection.json"));
        assert!(!c.matches("order"));
    }
}
