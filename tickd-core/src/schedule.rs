//! Cron schedule handling
//!
//! Wraps a parsed cron expression together with an optional time zone. A
//! spec may be prefixed with a `TZ=<zone>` directive, in which case fire
//! instants are computed in that zone before being compared in UTC.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use thiserror::Error;

/// Errors produced while parsing a schedule spec
#[derive(Debug, Error)]
pub enum ScheduleError {
    /// The cron expression itself failed to parse
    #[error("invalid cron spec {spec:?}: {reason}")]
    InvalidSpec { spec: String, reason: String },

    /// The `TZ=` directive named a zone outside the IANA database
    #[error("unknown time zone {0:?}")]
    UnknownTimeZone(String),
}

/// A parsed cron schedule with an optional time zone
#[derive(Debug, Clone)]
pub struct Schedule {
    inner: cron::Schedule,
    timezone: Option<Tz>,
}

impl Schedule {
    /// Parses a schedule spec, honoring an optional `TZ=<zone>` prefix.
    ///
    /// The expression accepts the standard 5-field cron grammar as well as
    /// the 6-field variant with a leading seconds field; 5-field specs get
    /// a zero seconds field prepended before parsing.
    pub fn parse(spec: &str) -> Result<Self, ScheduleError> {
        let spec = spec.trim();

        let (timezone, expr) = match spec.strip_prefix("TZ=") {
            Some(rest) => {
                let (zone, expr) =
                    rest.split_once(char::is_whitespace)
                        .ok_or_else(|| ScheduleError::InvalidSpec {
                            spec: spec.to_string(),
                            reason: "TZ directive without a cron expression".to_string(),
                        })?;
                let tz = zone
                    .parse::<Tz>()
                    .map_err(|_| ScheduleError::UnknownTimeZone(zone.to_string()))?;
                (Some(tz), expr.trim())
            }
            None => (None, spec),
        };

        let expr = normalize_fields(expr)?;
        let inner =
            cron::Schedule::from_str(&expr).map_err(|err| ScheduleError::InvalidSpec {
                spec: expr.clone(),
                reason: err.to_string(),
            })?;

        Ok(Self { inner, timezone })
    }

    /// Returns the zone named by the `TZ=` directive, if one was given
    pub fn timezone(&self) -> Option<Tz> {
        self.timezone
    }

    /// Computes the next fire instant strictly after `after`, in UTC.
    ///
    /// Returns `None` when the schedule has no future occurrence.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self.timezone {
            Some(tz) => self
                .inner
                .after(&after.with_timezone(&tz))
                .next()
                .map(|instant| instant.with_timezone(&Utc)),
            None => self.inner.after(&after).next(),
        }
    }
}

/// Prepends a zero seconds field to 5-field expressions; the cron grammar
/// underneath always expects seconds.
fn normalize_fields(expr: &str) -> Result<String, ScheduleError> {
    match expr.split_whitespace().count() {
        5 => Ok(format!("0 {expr}")),
        6 => Ok(expr.to_string()),
        n => Err(ScheduleError::InvalidSpec {
            spec: expr.to_string(),
            reason: format!("expected 5 or 6 fields, found {n}"),
        }),
    }
}
