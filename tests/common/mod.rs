#![allow(unused_imports)]

pub use newman_runner_test_utils::builders::{
    collection, collection_path, collections, SessionBuilder, STATE_FILE, SUITE_DIR,
};
pub use newman_runner_test_utils::fake_backend::{FakeEvent, FakeOutcome, FakeProcessBackend};
pub use newman_runner_test_utils::{init_tracing, with_timeout};
