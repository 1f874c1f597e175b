// src/collections/reconcile.rs

//! The "available" and "selected" collections and the operations that move
//! entries between them.
//!
//! [`CollectionSet`] is pure: it performs no IO and does not persist anything.
//! The session wraps each mutating call with a write-through of the selected
//! list to the settings store.
//!
//! Both collections are ordered. Existing entries keep their position and new
//! entries are appended, so a rendered list never reorders rows on its own.

use std::path::Path;

use tracing::debug;

use crate::collections::{RunStatus, TestCollectionRef, TestCollectionRun};

#[derive(Debug, Clone, Default)]
pub struct CollectionSet {
    available: Vec<TestCollectionRef>,
    selected: Vec<TestCollectionRun>,
}

impl CollectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn available(&self) -> &[TestCollectionRef] {
        &self.available
    }

    pub fn selected(&self) -> &[TestCollectionRun] {
        &self.selected
    }

    /// Merge a fresh directory listing and the persisted selection into the
    /// current state.
    ///
    /// Calling this twice with the same inputs leaves the state unchanged the
    /// second time.
    pub fn reconcile(
        &mut self,
        discovered: &[TestCollectionRef],
        persisted_selected: &[TestCollectionRef],
    ) {
        for collection in discovered {
            if !self.available.contains(collection) {
                self.available.push(collection.clone());
            }
        }

        self.available.retain(|c| discovered.contains(c));
        self.available.retain(|c| !persisted_selected.contains(c));

        for collection in persisted_selected {
            if !self.selected.iter().any(|run| run == collection) {
                self.selected.push(collection.clone().into_run());
            }
        }

        self.selected
            .retain(|run| discovered.iter().any(|c| c == run));

        // A session selection that was never persisted still must not appear
        // in both lists.
        let selected = &self.selected;
        self.available
            .retain(|c| !selected.iter().any(|run| run == c));

        debug!(
            available = self.available.len(),
            selected = self.selected.len(),
            "reconciled test collections"
        );
    }

    /// Move collections from "available" to "selected" as fresh runs.
    ///
    /// Entries not currently available are ignored. Returns how many moved.
    pub fn move_to_selected<C: AsRef<TestCollectionRef>>(&mut self, collections: &[C]) -> usize {
        let mut moved = 0;
        for collection in collections {
            let collection = collection.as_ref();
            if let Some(idx) = self.available.iter().position(|c| c == collection) {
                let removed = self.available.remove(idx);
                self.selected.push(removed.into_run());
                moved += 1;
            }
        }
        moved
    }

    /// Move runs from "selected" back to "available", discarding status.
    ///
    /// Entries not currently selected are ignored. Returns how many moved.
    pub fn move_to_available<C: AsRef<TestCollectionRef>>(&mut self, collections: &[C]) -> usize {
        let mut moved = 0;
        for collection in collections {
            let collection = collection.as_ref();
            if let Some(idx) = self.selected.iter().position(|run| run == collection) {
                let removed = self.selected.remove(idx);
                self.available.push(removed.into_ref());
                moved += 1;
            }
        }
        moved
    }

    /// Look up an available collection by display name or path.
    pub fn find_available(&self, query: &str) -> Option<&TestCollectionRef> {
        self.available.iter().find(|c| c.matches(query))
    }

    /// Look up a selected collection by display name or path.
    pub fn find_selected(&self, query: &str) -> Option<&TestCollectionRun> {
        self.selected.iter().find(|run| run.collection().matches(query))
    }

    /// Record a status reported for the selected run at `path`.
    ///
    /// Returns `false` if no such run is selected (it may have been moved
    /// away while the batch was running).
    pub fn apply_status(&mut self, path: &Path, status: RunStatus) -> bool {
        match self.selected.iter_mut().find(|run| run.path() == path) {
            Some(run) => {
                run.set_status(status);
                true
            }
            None => false,
        }
    }
}
