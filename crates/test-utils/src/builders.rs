#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use newman_runner::collections::{TestCollectionRef, COLLECTION_SUFFIX};
use newman_runner::config::{ConfigFile, RawConfigFile};
use newman_runner::engine::Session;
use newman_runner::fs::mock::MockFileSystem;
use newman_runner::store::FileSettingsStore;
use newman_runner::types::ExecutionMode;

use crate::fake_backend::FakeProcessBackend;

pub const SUITE_DIR: &str = "/suite";
pub const STATE_FILE: &str = "/state/settings.toml";

/// Path of a collection file named `name` inside [`SUITE_DIR`].
pub fn collection_path(name: &str) -> PathBuf {
    Path::new(SUITE_DIR).join(format!("{name}{COLLECTION_SUFFIX}"))
}

pub fn collection(name: &str) -> TestCollectionRef {
    TestCollectionRef::new(collection_path(name))
}

pub fn collections(names: &[&str]) -> Vec<TestCollectionRef> {
    names.iter().map(|n| collection(n)).collect()
}

/// Builder for a `Session` running on a mock file system and a fake backend.
pub struct SessionBuilder {
    fs: MockFileSystem,
    backend: FakeProcessBackend,
    config: RawConfigFile,
    directory_set: bool,
}

impl SessionBuilder {
    pub fn new() -> Self {
        let fs = MockFileSystem::new();
        fs.add_dir(SUITE_DIR);
        Self {
            fs,
            backend: FakeProcessBackend::new(),
            config: RawConfigFile::default(),
            directory_set: true,
        }
    }

    /// Put `<name>.postman_collection.json` files into the suite directory.
    pub fn with_files(self, names: &[&str]) -> Self {
        for name in names {
            self.fs.add_file(collection_path(name), "{}");
        }
        self
    }

    pub fn with_backend(mut self, backend: FakeProcessBackend) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.config.runner.mode = mode;
        self
    }

    pub fn without_directory(mut self) -> Self {
        self.directory_set = false;
        self
    }

    /// Share an existing mock file system, e.g. to simulate a restart.
    pub fn on_fs(mut self, fs: &MockFileSystem) -> Self {
        self.fs = fs.clone();
        self
    }

    pub fn fs(&self) -> MockFileSystem {
        self.fs.clone()
    }

    pub fn build(self) -> Session<FakeProcessBackend> {
        let shared: Arc<dyn newman_runner::fs::FileSystem> = Arc::new(self.fs.clone());
        let mut store = FileSettingsStore::open(Arc::clone(&shared), STATE_FILE);
        if self.directory_set {
            use newman_runner::store::SettingsStore;
            store
                .set_collection_directory(Path::new(SUITE_DIR))
                .expect("mock store write");
        }
        let config = ConfigFile::try_from(self.config).expect("valid config from builder");
        Session::new(shared, Box::new(store), Arc::new(self.backend), config)
    }
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}
