// src/config/validate.rs

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{Result, RunnerError};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::RunnerError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.runner))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_tool(cfg)?;
    validate_directories(cfg)?;
    Ok(())
}

fn validate_tool(cfg: &RawConfigFile) -> Result<()> {
    let tool = cfg.runner.tool.trim();
    if tool.is_empty() {
        return Err(RunnerError::ConfigError(
            "[runner].tool must not be empty".to_string(),
        ));
    }
    if tool.chars().any(char::is_whitespace) {
        return Err(RunnerError::ConfigError(format!(
            "[runner].tool must be a single executable name, got '{}'",
            cfg.runner.tool
        )));
    }
    Ok(())
}

fn validate_directories(cfg: &RawConfigFile) -> Result<()> {
    if cfg.runner.output_dir.as_os_str().is_empty() {
        return Err(RunnerError::ConfigError(
            "[runner].output_dir must not be empty".to_string(),
        ));
    }
    if cfg.runner.templates_dir.as_os_str().is_empty() {
        return Err(RunnerError::ConfigError(
            "[runner].templates_dir must not be empty".to_string(),
        ));
    }
    Ok(())
}
