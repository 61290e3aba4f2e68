//! Config file watcher
//!
//! Watches the configuration file for changes and reloads the schedule
//! when it is rewritten. The parent directory is watched rather than the
//! file itself so editors that replace the file (write to a temp name,
//! then rename over it) are still picked up.
//!
//! A reload that fails for any reason is logged and the running schedule
//! stays as it was.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{error, info, warn};

use crate::scheduler::Scheduler;

/// Spawns the watcher task. Watching is best effort; if the watch cannot
/// be established the daemon keeps running without live reload.
pub fn start(config: PathBuf, scheduler: Arc<Scheduler>) {
    let dir = match config.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let (tx, mut rx) = tokio::sync::mpsc::channel::<Event>(16);

    let mut watcher = match notify::recommended_watcher(
        move |result: notify::Result<Event>| match result {
            Ok(event) => {
                let _ = tx.blocking_send(event);
            }
            Err(err) => error!("config watch error: {}", err),
        },
    ) {
        Ok(watcher) => watcher,
        Err(err) => {
            error!("cannot create config watcher: {}", err);
            return;
        }
    };

    if let Err(err) = watcher.watch(&dir, RecursiveMode::NonRecursive) {
        error!("cannot watch {}: {}", dir.display(), err);
        return;
    }
    info!("watching {} for changes", config.display());

    tokio::spawn(async move {
        // Keeps the watcher alive for the life of the task.
        let _watcher: RecommendedWatcher = watcher;

        while let Some(event) = rx.recv().await {
            if touches_config(&event, &config) {
                apply(&config, &scheduler);
            }
        }
    });
}

/// True when the event rewrites the watched config file
fn touches_config(event: &Event, config: &Path) -> bool {
    if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
        return false;
    }
    event.paths.iter().any(|path| {
        path == config || path.file_name() == config.file_name()
    })
}

/// Reloads the schedule from `config`, keeping the old one on any failure
fn apply(config: &Path, scheduler: &Scheduler) {
    info!("config change detected, reloading {}", config.display());
    match tickd_config::load(config) {
        Ok(jobs) => match scheduler.reload(jobs) {
            Ok(()) => info!("schedule reloaded from {}", config.display()),
            Err(err) => warn!("reload rejected, keeping previous schedule: {}", err),
        },
        Err(err) => warn!("cannot reload {}: {}", config.display(), err),
    }
}
