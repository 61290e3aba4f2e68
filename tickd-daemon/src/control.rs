//! Control plane
//!
//! Unix-socket command server. The protocol is one request, one reply:
//! a client connects, writes a single command, gets a single response,
//! and the connection closes. Commands:
//! - `run <name>`: schedule an immediate run of the named job
//! - `list`: report every job's name and schedule state
//! - `reload`: re-read the configuration file and swap the schedule
//!
//! Each accepted connection is handled in its own task so a slow or
//! stuck client never blocks the listener.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tracing::{error, info, warn};

use crate::executor;
use crate::notify::Notifier;
use crate::scheduler::Scheduler;

/// One `read` call's worth of command is the whole request
const MAX_COMMAND_LEN: usize = 256;

/// Serves the command protocol over a Unix socket
pub struct ControlServer {
    scheduler: Arc<Scheduler>,
    notifier: Arc<Notifier>,
    config: PathBuf,
}

impl ControlServer {
    /// Binds the listening socket, replacing any stale socket file left
    /// over from a previous run.
    pub fn bind(path: &Path) -> std::io::Result<UnixListener> {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        UnixListener::bind(path)
    }

    pub fn new(scheduler: Arc<Scheduler>, notifier: Arc<Notifier>, config: PathBuf) -> Self {
        Self {
            scheduler,
            notifier,
            config,
        }
    }

    /// Accept loop; runs until the listener is closed
    pub async fn serve(self, listener: UnixListener) {
        let server = Arc::new(self);
        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let server = Arc::clone(&server);
                    tokio::spawn(async move {
                        server.handle(stream).await;
                    });
                }
                Err(err) => {
                    // Accept failures (fd exhaustion, interrupted calls)
                    // are transient; the listener must outlive them.
                    error!("control socket accept failed: {}", err);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            }
        }
    }

    async fn handle(&self, mut stream: UnixStream) {
        let mut buf = [0u8; MAX_COMMAND_LEN];
        let len = match stream.read(&mut buf).await {
            Ok(len) => len,
            Err(err) => {
                warn!("control connection read failed: {}", err);
                return;
            }
        };

        let command = String::from_utf8_lossy(&buf[..len]);
        let reply = self.dispatch(command.trim()).await;

        if let Err(err) = stream.write_all(reply.as_bytes()).await {
            warn!("control connection write failed: {}", err);
        }
    }

    /// Maps one command line to its reply
    async fn dispatch(&self, command: &str) -> String {
        let mut tokens = command.split_whitespace();
        match tokens.next() {
            Some("run") => {
                // Names may contain spaces, so the rest of the line is
                // the name.
                let name = tokens.collect::<Vec<_>>().join(" ");
                self.trigger(&name)
            }
            Some("list") => self.list(),
            Some("reload") => self.reload(),
            _ => "err: invalid command".to_string(),
        }
    }

    fn trigger(&self, name: &str) -> String {
        if name.is_empty() {
            return "err: job name required".to_string();
        }
        match self.scheduler.find_by_name(name) {
            Some(job) => {
                info!("triggering job {:?} on request", name);
                let notifier = Arc::clone(&self.notifier);
                tokio::spawn(executor::run_and_notify(job, notifier));
                "ok: scheduled".to_string()
            }
            None => "err: not found".to_string(),
        }
    }

    fn list(&self) -> String {
        self.scheduler
            .list_states()
            .into_iter()
            .map(|(name, state)| format!("{}: {}", name, state))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn reload(&self) -> String {
        let jobs = match tickd_config::load(&self.config) {
            Ok(jobs) => jobs,
            Err(err) => return format!("err: {}", err),
        };
        match self.scheduler.reload(jobs) {
            Ok(()) => {
                info!("schedule reloaded on request");
                "ok: reloaded".to_string()
            }
            Err(err) => format!("err: {}", err),
        }
    }
}
