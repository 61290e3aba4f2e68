//! Configuration loading
//!
//! Reads the declarative TOML configuration file and turns it into the
//! ordered, validated job definition list the scheduler consumes. All
//! problems (unreadable file, syntax errors, invalid definitions) are
//! load-time errors; the daemon never starts or reloads with a broken set.

mod definition;

use std::path::Path;

use thiserror::Error;
use tickd_core::{ConfigError, JobDefinition};

use crate::definition::ConfigFile;

/// Errors produced while loading a configuration file
#[derive(Debug, Error)]
pub enum LoadError {
    /// The file could not be read
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid TOML or uses unknown keys
    #[error("config syntax error: {0}")]
    Syntax(#[from] toml::de::Error),

    /// A job definition failed validation
    #[error(transparent)]
    Invalid(#[from] ConfigError),
}

/// Loads and validates the configuration file at `path`.
pub fn load(path: &Path) -> Result<Vec<JobDefinition>, LoadError> {
    let text = std::fs::read_to_string(path)?;
    load_str(&text)
}

/// Parses configuration text into a validated job definition list,
/// preserving declaration order.
pub fn load_str(text: &str) -> Result<Vec<JobDefinition>, LoadError> {
    let file: ConfigFile = toml::from_str(text)?;
    let jobs = file.into_jobs()?;
    JobDefinition::validate_all(&jobs)?;
    Ok(jobs)
}
