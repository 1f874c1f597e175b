// src/store/mod.rs

//! Persistent settings that survive between invocations: the collection
//! directory, the environment file, and the ordered selection.
//!
//! The session talks to a [`SettingsStore`]; [`FileSettingsStore`] keeps the
//! values in a small TOML file and writes it after every change.

use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::collections::{TestCollectionRef, TestCollectionRun};
use crate::errors::Result;
use crate::fs::FileSystem;

const COLLECTION_DIRECTORY_KEY: &str = "test_collection_directory";
const ENVIRONMENT_FILE_KEY: &str = "environment_file";
const SELECTED_KEY: &str = "selected_for_execution";

/// Key-value persistence used by the session.
pub trait SettingsStore: Send + Debug {
    fn collection_directory(&self) -> Option<PathBuf>;
    fn set_collection_directory(&mut self, dir: &Path) -> Result<()>;

    fn environment_file(&self) -> Option<PathBuf>;
    fn set_environment_file(&mut self, file: Option<&Path>) -> Result<()>;

    /// The persisted selection, in order. Unreadable data reads as empty.
    fn selected_for_execution(&self) -> Vec<TestCollectionRef>;
    fn set_selected_for_execution(&mut self, runs: &[TestCollectionRun]) -> Result<()>;
    fn clear_selected_for_execution(&mut self) -> Result<()>;
}

#[derive(Debug, Clone, Default, Serialize)]
struct PersistedSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    test_collection_directory: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    environment_file: Option<PathBuf>,
    selected_for_execution: Vec<PathBuf>,
}

/// TOML file implementation of [`SettingsStore`].
#[derive(Debug)]
pub struct FileSettingsStore {
    fs: Arc<dyn FileSystem>,
    path: PathBuf,
    settings: PersistedSettings,
}

impl FileSettingsStore {
    /// Load settings from `path`. A missing file is an empty store; each key
    /// that cannot be read is treated as unset.
    pub fn open(fs: Arc<dyn FileSystem>, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let settings = load_settings(fs.as_ref(), &path);
        Self { fs, path, settings }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self) -> Result<()> {
        let contents = toml::to_string(&self.settings)?;
        self.fs.write(&self.path, contents.as_bytes())?;
        debug!(path = %self.path.display(), "settings saved");
        Ok(())
    }
}

fn load_settings(fs: &dyn FileSystem, path: &Path) -> PersistedSettings {
    if !fs.exists(path) {
        return PersistedSettings::default();
    }

    let table = match fs
        .read_to_string(path)
        .and_then(|s| toml::from_str::<toml::Table>(&s).map_err(anyhow::Error::from))
    {
        Ok(table) => table,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "ignoring unreadable settings file");
            return PersistedSettings::default();
        }
    };

    PersistedSettings {
        test_collection_directory: read_key(&table, COLLECTION_DIRECTORY_KEY, path),
        environment_file: read_key(&table, ENVIRONMENT_FILE_KEY, path),
        selected_for_execution: read_key(&table, SELECTED_KEY, path).unwrap_or_default(),
    }
}

fn read_key<T>(table: &toml::Table, key: &str, path: &Path) -> Option<T>
where
    T: serde::de::DeserializeOwned,
{
    let value = table.get(key)?.clone();
    match toml::Value::try_into::<T>(value) {
        Ok(v) => Some(v),
        Err(err) => {
            warn!(path = %path.display(), key, error = %err, "ignoring malformed setting");
            None
        }
    }
}

impl SettingsStore for FileSettingsStore {
    fn collection_directory(&self) -> Option<PathBuf> {
        self.settings.test_collection_directory.clone()
    }

    fn set_collection_directory(&mut self, dir: &Path) -> Result<()> {
        self.settings.test_collection_directory = Some(dir.to_path_buf());
        self.save()
    }

    fn environment_file(&self) -> Option<PathBuf> {
        self.settings.environment_file.clone()
    }

    fn set_environment_file(&mut self, file: Option<&Path>) -> Result<()> {
        self.settings.environment_file = file.map(Path::to_path_buf);
        self.save()
    }

    fn selected_for_execution(&self) -> Vec<TestCollectionRef> {
        self.settings
            .selected_for_execution
            .iter()
            .cloned()
            .map(TestCollectionRef::new)
            .collect()
    }

    fn set_selected_for_execution(&mut self, runs: &[TestCollectionRun]) -> Result<()> {
        self.settings.selected_for_execution =
            runs.iter().map(|run| run.path().to_path_buf()).collect();
        self.save()
    }

    fn clear_selected_for_execution(&mut self) -> Result<()> {
        self.settings.selected_for_execution.clear();
        self.save()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    fn store_on(fs: &MockFileSystem) -> FileSettingsStore {
        FileSettingsStore::open(Arc::new(fs.clone()), "/state/settings.toml")
    }

    #[test]
    fn values_survive_reopen() {
        let fs = MockFileSystem::new();
        let mut store = store_on(&fs);
        store.set_collection_directory(Path::new("/suite")).unwrap();
        store.set_environment_file(Some(Path::new("/env/dev.postman_environment.json"))).unwrap();
        let runs = vec![
            TestCollectionRef::new("/suite/b.postman_collection.json").into_run(),
            TestCollectionRef::new("/suite/a.postman_collection.json").into_run(),
        ];
        store.set_selected_for_execution(&runs).unwrap();

        let reopened = store_on(&fs);
        assert_eq!(reopened.collection_directory(), Some(PathBuf::from("/suite")));
        assert_eq!(
            reopened.environment_file(),
            Some(PathBuf::from("/env/dev.postman_environment.json"))
        );
        let names: Vec<_> = reopened
            .selected_for_execution()
            .into_iter()
            .map(|c| c.display_name().to_string())
            .collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn malformed_selection_reads_as_empty() {
        let fs = MockFileSystem::new();
        fs.add_file(
            "/state/settings.toml",
            "test_collection_directory = \"/suite\"\nselected_for_execution = 42\n",
        );
        let store = store_on(&fs);
        assert!(store.selected_for_execution().is_empty());
        assert_eq!(store.collection_directory(), Some(PathBuf::from("/suite")));
    }

    #[test]
    fn garbage_file_is_an_empty_store() {
        let fs = MockFileSystem::new();
        fs.add_file("/state/settings.toml", "this is [not toml");
        let store = store_on(&fs);
        assert!(store.collection_directory().is_none());
        assert!(store.selected_for_execution().is_empty());
    }

    #[test]
    fn clearing_environment_removes_key() {
        let fs = MockFileSystem::new();
        let mut store = store_on(&fs);
        store.set_environment_file(Some(Path::new("/env.json"))).unwrap();
        store.set_environment_file(None).unwrap();

        let raw = fs.read_to_string(Path::new("/state/settings.toml")).unwrap();
        assert!(!raw.contains(ENVIRONMENT_FILE_KEY));
        assert!(store_on(&fs).environment_file().is_none());
    }
}
