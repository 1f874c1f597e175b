// src/collections/discovery.rs

use std::path::Path;

use tracing::{debug, warn};

use crate::collections::{TestCollectionRef, COLLECTION_SUFFIX};
use crate::fs::FileSystem;

/// List every file directly inside `dir` whose name ends with
/// [`COLLECTION_SUFFIX`], sorted by path.
///
/// An unreadable or missing directory yields an empty list.
pub fn discover_collections(fs: &dyn FileSystem, dir: &Path) -> Vec<TestCollectionRef> {
    let entries = match fs.read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            warn!(dir = %dir.display(), error = %err, "cannot read test collection directory");
            return Vec::new();
        }
    };

    let mut found: Vec<TestCollectionRef> = entries
        .into_iter()
        .filter(|path| is_collection_file_name(path) && fs.is_file(path))
        .map(TestCollectionRef::new)
        .collect();
    found.sort_by(|a, b| a.path().cmp(b.path()));

    debug!(dir = %dir.display(), count = found.len(), "discovered test collections");
    found
}

fn is_collection_file_name(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(COLLECTION_SUFFIX))
}
