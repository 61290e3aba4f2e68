//! Job scheduler
//!
//! Owns the live definition list and its derived schedule entries, fires
//! due jobs from a one-second timing loop, and supports atomic reload.
//! All reads and the sole write go through one mutex; job execution runs
//! on a copied definition outside the lock, so long-running jobs never
//! hold up reload, listing, or triggering.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

use tickd_core::{ConfigError, JobDefinition, JobState, Schedule};

use crate::executor;
use crate::notify::Notifier;

/// Live binding of a job definition to its computed next-fire time
struct ScheduleEntry {
    job: JobDefinition,
    schedule: Schedule,
    next: Option<DateTime<Utc>>,
}

struct State {
    jobs: Vec<JobDefinition>,
    entries: Vec<ScheduleEntry>,
}

/// Owner of the live schedule
pub struct Scheduler {
    state: Mutex<State>,
    notifier: Arc<Notifier>,
    shutdown: watch::Sender<bool>,
}

impl Scheduler {
    pub fn new(notifier: Arc<Notifier>) -> Arc<Self> {
        let (shutdown, _) = watch::channel(false);
        Arc::new(Self {
            state: Mutex::new(State {
                jobs: Vec::new(),
                entries: Vec::new(),
            }),
            notifier,
            shutdown,
        })
    }

    /// Replaces the live definition list with `jobs`.
    ///
    /// Every definition is validated and the complete new entry set is
    /// built before any live state is touched; on failure the previous
    /// schedule stays fully intact. Disabled definitions are kept in the
    /// list (they show up in `list_states`) but get no entry.
    pub fn reload(&self, jobs: Vec<JobDefinition>) -> Result<(), ConfigError> {
        JobDefinition::validate_all(&jobs)?;

        let now = Utc::now();
        let mut entries = Vec::new();
        for job in jobs.iter().filter(|job| !job.disabled) {
            let schedule =
                Schedule::parse(&job.full_spec()).map_err(|source| ConfigError::InvalidSpec {
                    name: job.name.clone(),
                    source,
                })?;
            let next = schedule.next_after(now);
            entries.push(ScheduleEntry {
                job: job.clone(),
                schedule,
                next,
            });
        }

        let mut state = self.state.lock().unwrap();
        state.jobs = jobs;
        state.entries = entries;
        info!(
            "schedule loaded: {} job(s), {} active",
            state.jobs.len(),
            state.entries.len()
        );
        Ok(())
    }

    /// Looks up a definition by name in the current list
    pub fn find_by_name(&self, name: &str) -> Option<JobDefinition> {
        let state = self.state.lock().unwrap();
        state.jobs.iter().find(|job| job.name == name).cloned()
    }

    /// Returns every job's name and schedule state, in declaration order
    pub fn list_states(&self) -> Vec<(String, JobState)> {
        let state = self.state.lock().unwrap();
        state
            .jobs
            .iter()
            .map(|job| (job.name.clone(), job.state()))
            .collect()
    }

    /// Spawns the firing loop. One-second ticks; every due entry fires
    /// exactly once per tick as its own task.
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let scheduler = Arc::clone(self);
        let mut shutdown = self.shutdown.subscribe();

        tokio::spawn(async move {
            info!("scheduler started");
            let mut interval = tokio::time::interval(Duration::from_secs(1));

            loop {
                tokio::select! {
                    _ = interval.tick() => scheduler.fire_due(Utc::now()),
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            info!("scheduler stopped");
                            break;
                        }
                    }
                }
            }
        })
    }

    /// Stops the firing loop; in-flight job runs are left to finish
    pub fn stop(&self) {
        let _ = self.shutdown.send(true);
    }

    fn fire_due(&self, now: DateTime<Utc>) {
        for job in self.take_due(now) {
            info!("firing job {:?}", job.name);
            let notifier = Arc::clone(&self.notifier);
            tokio::spawn(executor::run_and_notify(job, notifier));
        }
    }

    /// Collects every due definition and advances its next-fire time.
    /// The lock is released before any of them starts executing.
    fn take_due(&self, now: DateTime<Utc>) -> Vec<JobDefinition> {
        let mut state = self.state.lock().unwrap();
        let mut due = Vec::new();

        for entry in &mut state.entries {
            let Some(next) = entry.next else { continue };
            if next <= now {
                due.push(entry.job.clone());
                entry.next = entry.schedule.next_after(now);
            }
        }

        due
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::BTreeMap;

    fn job(name: &str, spec: &str) -> JobDefinition {
        JobDefinition {
            name: name.to_string(),
            spec: spec.to_string(),
            timezone: None,
            command: "true".to_string(),
            shell: None,
            environment: BTreeMap::new(),
            dir: None,
            user: None,
            log: None,
            timeout: None,
            docker: None,
            notify: None,
            disabled: false,
        }
    }

    fn scheduler() -> Arc<Scheduler> {
        Scheduler::new(Arc::new(Notifier::new()))
    }

    #[tokio::test]
    async fn test_reload_builds_entries_for_enabled_jobs() {
        let scheduler = scheduler();

        let mut disabled = job("paused", "0 * * * *");
        disabled.disabled = true;

        scheduler
            .reload(vec![job("hourly", "0 * * * *"), disabled])
            .unwrap();

        let states = scheduler.list_states();
        assert_eq!(states.len(), 2);
        assert_eq!(states[0], ("hourly".to_string(), JobState::Active));
        assert_eq!(states[1], ("paused".to_string(), JobState::Inactive));

        // The disabled job is findable but has no entry.
        assert!(scheduler.find_by_name("paused").is_some());
        let far_future = Utc.with_ymd_and_hms(2099, 1, 1, 0, 0, 0).unwrap();
        let due = scheduler.take_due(far_future);
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].name, "hourly");
    }

    #[tokio::test]
    async fn test_failed_reload_leaves_schedule_intact() {
        let scheduler = scheduler();
        scheduler
            .reload(vec![job("keeper", "*/5 * * * *")])
            .unwrap();

        let before_states = scheduler.list_states();
        let before_job = scheduler.find_by_name("keeper").unwrap();

        // Duplicate names must fail validation before any state changes.
        let err = scheduler
            .reload(vec![job("dup", "* * * * *"), job("dup", "0 * * * *")])
            .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateName(_)));

        assert_eq!(scheduler.list_states(), before_states);
        assert_eq!(
            scheduler.find_by_name("keeper").map(|j| j.spec),
            Some(before_job.spec)
        );
        assert!(scheduler.find_by_name("dup").is_none());

        // Same for an unparsable cron spec.
        let err = scheduler.reload(vec![job("bad", "not-a-spec")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSpec { .. }));
        assert_eq!(scheduler.list_states(), before_states);
    }

    #[tokio::test]
    async fn test_due_entries_fire_once_per_tick() {
        let scheduler = scheduler();
        scheduler
            .reload(vec![job("a", "* * * * *"), job("b", "* * * * *")])
            .unwrap();

        let tick = Utc::now() + chrono::Duration::seconds(61);

        let first = scheduler.take_due(tick);
        assert_eq!(first.len(), 2);

        // Same instant again: everything already advanced past it.
        let second = scheduler.take_due(tick);
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn test_reload_replaces_previous_set() {
        let scheduler = scheduler();
        scheduler.reload(vec![job("old", "* * * * *")]).unwrap();
        scheduler.reload(vec![job("new", "* * * * *")]).unwrap();

        assert!(scheduler.find_by_name("old").is_none());
        assert!(scheduler.find_by_name("new").is_some());
        assert_eq!(scheduler.list_states().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_reload() {
        let scheduler = scheduler();
        scheduler.reload(Vec::new()).unwrap();
        assert!(scheduler.list_states().is_empty());
    }
}
