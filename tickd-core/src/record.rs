//! Run records

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ephemeral result of one job execution.
///
/// Created when a run starts, consumed by the notification dispatcher,
/// then discarded; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
    pub exit_status: i32,
    pub success: bool,
    /// True when the process was terminated by a signal, including the
    /// forced kill after a timeout.
    pub signaled: bool,
}
