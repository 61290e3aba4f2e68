//! Job definition types
//!
//! A [`JobDefinition`] is the validated, immutable-per-version description
//! of one scheduled job. Definitions arrive as an ordered list at load or
//! reload time; the scheduler never mutates them.

use std::collections::BTreeMap;
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::schedule::Schedule;

/// Shell used when a multi-line command auto-enables shell mode
pub const DEFAULT_SHELL: &str = "bash";

/// One declared job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDefinition {
    /// Unique job name
    pub name: String,
    /// Cron expression, without the time-zone prefix
    pub spec: String,
    /// Optional IANA time zone the spec is evaluated in
    pub timezone: Option<String>,
    /// Command text; split on whitespace unless shell mode is on
    pub command: String,
    /// Shell program; presence enables shell mode explicitly
    pub shell: Option<String>,
    /// Environment overrides, merged over the inherited environment
    pub environment: BTreeMap<String, String>,
    /// Working directory for the run
    pub dir: Option<String>,
    /// OS user to run as (native mode only)
    pub user: Option<String>,
    /// File that captures stdout/stderr when set
    pub log: Option<PathBuf>,
    /// Maximum run time; `None` or zero means unbounded
    pub timeout: Option<Duration>,
    /// Container options; presence selects containerized run mode
    pub docker: Option<DockerOptions>,
    /// Completion notification settings
    pub notify: Option<NotifySettings>,
    /// Disabled jobs are never scheduled
    pub disabled: bool,
}

/// Options for containerized runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DockerOptions {
    pub image: String,
}

/// Notification settings for a job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifySettings {
    pub mode: NotifyMode,
    pub webhook: Option<WebhookTarget>,
    pub chat: Option<ChatTarget>,
}

/// When notifications fire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotifyMode {
    /// Deliver only when the run failed
    Error,
    /// Deliver on every completion
    All,
}

/// A form-encoded webhook target
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookTarget {
    pub url: String,
}

/// A JSON chat-message target
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTarget {
    pub url: String,
    pub username: String,
    pub channel: String,
}

/// Execution strategy, derived from the presence of a container image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Native,
    Docker,
}

/// Whether a job participates in the schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Active,
    Inactive,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Active => write!(f, "active"),
            JobState::Inactive => write!(f, "inactive"),
        }
    }
}

impl JobDefinition {
    /// Derived run mode: a container image selects containerized execution
    pub fn run_mode(&self) -> RunMode {
        if self.docker.is_some() {
            RunMode::Docker
        } else {
            RunMode::Native
        }
    }

    /// Schedule state derived from the `disabled` flag
    pub fn state(&self) -> JobState {
        if self.disabled {
            JobState::Inactive
        } else {
            JobState::Active
        }
    }

    /// Shell mode is on when a shell is configured explicitly or the
    /// command spans multiple lines.
    pub fn shell_mode(&self) -> bool {
        self.shell.is_some() || self.command.contains('\n')
    }

    /// Shell program used in shell mode
    pub fn shell_program(&self) -> &str {
        self.shell.as_deref().unwrap_or(DEFAULT_SHELL)
    }

    /// The effective cron spec, with the time-zone directive prepended
    /// when a zone is configured.
    pub fn full_spec(&self) -> String {
        match &self.timezone {
            Some(zone) => format!("TZ={} {}", zone, self.spec),
            None => self.spec.clone(),
        }
    }

    /// Validates a single definition: required fields plus a parseable
    /// effective cron spec.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::MissingName);
        }
        if self.spec.is_empty() {
            return Err(ConfigError::MissingSpec(self.name.clone()));
        }
        if self.command.is_empty() {
            return Err(ConfigError::MissingCommand(self.name.clone()));
        }

        Schedule::parse(&self.full_spec()).map_err(|source| ConfigError::InvalidSpec {
            name: self.name.clone(),
            source,
        })?;

        Ok(())
    }

    /// Validates a whole definition set: every definition individually,
    /// plus name uniqueness across the set.
    pub fn validate_all(jobs: &[JobDefinition]) -> Result<(), ConfigError> {
        let mut names = HashSet::new();
        for job in jobs {
            job.validate()?;
            if !names.insert(job.name.as_str()) {
                return Err(ConfigError::DuplicateName(job.name.clone()));
            }
        }
        Ok(())
    }
}
