//! Configuration validation errors

use thiserror::Error;

use crate::duration::DurationError;
use crate::schedule::ScheduleError;

/// Errors detected while validating a job definition set.
///
/// At initial load these are fatal; at reload time they leave the previous
/// schedule untouched.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A job block was declared without a name
    #[error("job must have a name")]
    MissingName,

    /// The job has no cron spec
    #[error("job {0:?}: spec is required")]
    MissingSpec(String),

    /// The job has no command
    #[error("job {0:?}: command is required")]
    MissingCommand(String),

    /// The cron spec or its time-zone directive failed to parse
    #[error("job {name:?}: {source}")]
    InvalidSpec {
        name: String,
        #[source]
        source: ScheduleError,
    },

    /// The timeout string failed to parse
    #[error("job {name:?}: invalid timeout: {source}")]
    InvalidTimeout {
        name: String,
        #[source]
        source: DurationError,
    },

    /// The notify mode was neither `error` nor `all`
    #[error("job {name:?}: invalid notify mode {mode:?} (expected \"error\" or \"all\")")]
    InvalidNotifyMode { name: String, mode: String },

    /// Two jobs share the same name
    #[error("duplicate job: {0}")]
    DuplicateName(String),
}
