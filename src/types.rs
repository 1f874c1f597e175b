use serde::Deserialize;

/// How the orchestrator schedules the runs of a batch.
///
/// - `Sequential`: one collection at a time, in selection order (default).
///   Report files are keyed by collection name in a shared output directory,
///   so only one `newman` process writes there at any moment.
/// - `Concurrent`: every run becomes its own task and the batch finishes when
///   all of them have. Only reachable through `[runner] mode` in the config
///   file; no CLI flag selects it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    Sequential,
    Concurrent,
}

impl Default for ExecutionMode {
    fn default() -> Self {
        ExecutionMode::Sequential
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Holder {
        mode: ExecutionMode,
    }

    #[test]
    fn modes_deserialize_from_lowercase_names() {
        let holder: Holder = toml::from_str("mode = \"concurrent\"").unwrap();
        assert_eq!(holder.mode, ExecutionMode::Concurrent);
        assert!(toml::from_str::<Holder>("mode = \"Parallel\"").is_err());
    }
}
