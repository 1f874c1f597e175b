// src/config/model.rs

use std::path::PathBuf;

use serde::Deserialize;

use crate::types::ExecutionMode;

/// Configuration as read from a TOML file, before validation.
///
/// ```toml
/// [runner]
/// tool = "newman"
/// output_dir = "newman"
/// templates_dir = "templates"
/// mode = "sequential"
/// ```
///
/// Every key is optional.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    #[serde(default)]
    pub runner: RunnerSection,
}

/// Validated configuration. Build it with `ConfigFile::try_from(raw)`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub runner: RunnerSection,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(runner: RunnerSection) -> Self {
        Self { runner }
    }
}

/// `[runner]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RunnerSection {
    /// Name of the external test runner executable.
    #[serde(default = "default_tool")]
    pub tool: String,

    /// Directory receiving reports and the per-run stdio logs.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Directory holding `htmlreqres.hbs`, the HTML reporter template.
    #[serde(default = "default_templates_dir")]
    pub templates_dir: PathBuf,

    /// Batch scheduling mode.
    #[serde(default)]
    pub mode: ExecutionMode,
}

fn default_tool() -> String {
    "newman".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("newman")
}

fn default_templates_dir() -> PathBuf {
    PathBuf::from("templates")
}

impl Default for RunnerSection {
    fn default() -> Self {
        Self {
            tool: default_tool(),
            output_dir: default_output_dir(),
            templates_dir: default_templates_dir(),
            mode: ExecutionMode::default(),
        }
    }
}
