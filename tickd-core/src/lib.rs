//! Tickd Core
//!
//! Core types for the tickd job scheduler.
//!
//! This crate contains:
//! - Job definitions: the validated, immutable description of a scheduled job
//! - Run records: per-execution results handed to the notification dispatcher
//! - Schedule handling: cron expressions with optional time-zone directives
//! - Duration parsing: compact `30s` / `5m` style timeout strings

pub mod duration;
pub mod error;
pub mod job;
pub mod record;
pub mod schedule;

pub use duration::{DurationError, parse_duration};
pub use error::ConfigError;
pub use job::{
    ChatTarget, DockerOptions, JobDefinition, JobState, NotifyMode, NotifySettings, RunMode,
    WebhookTarget,
};
pub use record::RunRecord;
pub use schedule::{Schedule, ScheduleError};
