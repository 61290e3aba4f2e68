//! Job executor
//!
//! Turns one job definition into a single completed run. All failures
//! (user lookup, spawn, nonzero exit, forced timeout) are captured into
//! the run record; nothing propagates past this module's boundary.

use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command};
use tracing::{debug, error, info, warn};

use tickd_core::{JobDefinition, RunMode, RunRecord};

use crate::notify::Notifier;

/// Exit status reported when a run fails before the process produced one
const EXIT_FAILURE: i32 = 1;

/// Exit status sentinel for a run killed on timeout
const EXIT_KILLED: i32 = -1;

struct Completion {
    exit_status: i32,
    success: bool,
    signaled: bool,
}

impl Completion {
    fn failed(exit_status: i32) -> Self {
        Self {
            exit_status,
            success: false,
            signaled: false,
        }
    }

    fn from_status(status: std::process::ExitStatus) -> Self {
        use std::os::unix::process::ExitStatusExt;

        match status.code() {
            Some(code) => Self {
                exit_status: code,
                success: code == 0,
                signaled: false,
            },
            // No code means the process died on a signal.
            None => Self {
                exit_status: 128 + status.signal().unwrap_or(0),
                success: false,
                signaled: true,
            },
        }
    }
}

/// One complete unit of work: execute the job, log the outcome, dispatch
/// notifications. This is what the scheduler and the control plane spawn.
pub async fn run_and_notify(job: JobDefinition, notifier: Arc<Notifier>) {
    info!("[{}] job started", job.name);

    let record = execute(&job).await;

    info!(
        "[{}] job finished with {}. success: {}, duration: {:?}",
        job.name,
        record.exit_status,
        record.success,
        record.duration
    );

    notifier.notify(&job, &record).await;
}

/// Executes one job to completion and produces its run record
pub async fn execute(job: &JobDefinition) -> RunRecord {
    let started_at = Utc::now();
    let clock = Instant::now();

    let completion = match job.run_mode() {
        RunMode::Native => run_native(job).await,
        RunMode::Docker => run_docker(job).await,
    };

    RunRecord {
        started_at,
        duration: clock.elapsed(),
        exit_status: completion.exit_status,
        success: completion.success,
        signaled: completion.signaled,
    }
}

/// Runs the job as a host process
async fn run_native(job: &JobDefinition) -> Completion {
    let Some(mut cmd) = native_command(job) else {
        error!("[{}] command has no program to run", job.name);
        return Completion::failed(EXIT_FAILURE);
    };

    if let Some(dir) = &job.dir {
        cmd.current_dir(dir);
    }

    // Overrides win over the inherited environment, key by key.
    cmd.envs(&job.environment);

    if let Some(user) = &job.user {
        match resolve_user(user) {
            Some((uid, gid)) => {
                cmd.uid(uid);
                cmd.gid(gid);
            }
            None => {
                error!("[{}] cannot find user {:?}", job.name, user);
                return Completion::failed(EXIT_FAILURE);
            }
        }
    }

    apply_log_redirect(job, &mut cmd);

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(err) => {
            error!("[{}] spawn failed: {}", job.name, err);
            return Completion::failed(err.raw_os_error().unwrap_or(EXIT_FAILURE));
        }
    };

    if job.shell_mode() {
        // The script goes to the shell over stdin, so pipelines and
        // multi-line commands work without any tokenization.
        if let Some(mut stdin) = child.stdin.take() {
            let script = format!("{}\n", job.command.trim());
            if let Err(err) = stdin.write_all(script.as_bytes()).await {
                warn!(
                    "[{}] cannot write script to {}: {}",
                    job.name,
                    job.shell_program(),
                    err
                );
            }
            // Dropping stdin closes the pipe; the shell sees EOF.
        }
    }

    wait_with_timeout(job, child).await
}

/// Builds the bare command for native mode. Returns `None` when the
/// command text has no program token.
fn native_command(job: &JobDefinition) -> Option<Command> {
    if job.shell_mode() {
        let mut cmd = Command::new(job.shell_program());
        cmd.stdin(Stdio::piped());
        Some(cmd)
    } else {
        // Whitespace-naive split, no quoting support.
        let mut parts = job.command.split_whitespace();
        let program = parts.next()?;
        let mut cmd = Command::new(program);
        cmd.args(parts);
        Some(cmd)
    }
}

/// Runs the job inside a container via `docker run`
async fn run_docker(job: &JobDefinition) -> Completion {
    let args = docker_args(job);
    debug!("[{}] docker {}", job.name, args.join(" "));

    let mut cmd = Command::new("docker");
    cmd.args(&args);
    apply_log_redirect(job, &mut cmd);

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(err) => {
            error!("[{}] cannot start docker: {}", job.name, err);
            return Completion::failed(err.raw_os_error().unwrap_or(EXIT_FAILURE));
        }
    };

    // Timeout and run-as-user do not apply in containerized mode.
    wait_child(job, &mut child).await
}

/// Argument list for `docker run`, mirroring the documented invocation:
/// `docker run -i --rm [--workdir <dir>] [-e K=V ...] <image> <command>`
fn docker_args(job: &JobDefinition) -> Vec<String> {
    let mut args = vec!["run".to_string(), "-i".to_string(), "--rm".to_string()];

    if let Some(dir) = &job.dir {
        args.push("--workdir".to_string());
        args.push(dir.clone());
    }

    for (key, value) in &job.environment {
        args.push("-e".to_string());
        args.push(format!("{key}={value}"));
    }

    if let Some(docker) = &job.docker {
        args.push(docker.image.clone());
    }

    args.extend(job.command.split_whitespace().map(str::to_string));
    args
}

/// Redirects stdout/stderr into the job's log file when one is set;
/// otherwise both streams stay inherited. The file handle is scoped to
/// this run and closes on every exit path.
fn apply_log_redirect(job: &JobDefinition, cmd: &mut Command) {
    let Some(path) = &job.log else { return };

    match open_log(path) {
        Ok((stdout, stderr)) => {
            cmd.stdout(stdout);
            cmd.stderr(stderr);
        }
        Err(err) => {
            warn!(
                "[{}] cannot open log file {}: {}",
                job.name,
                path.display(),
                err
            );
        }
    }
}

fn open_log(path: &Path) -> std::io::Result<(Stdio, Stdio)> {
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    let clone = file.try_clone()?;
    Ok((Stdio::from(file), Stdio::from(clone)))
}

fn resolve_user(name: &str) -> Option<(u32, u32)> {
    match nix::unistd::User::from_name(name) {
        Ok(Some(user)) => Some((user.uid.as_raw(), user.gid.as_raw())),
        Ok(None) => None,
        Err(err) => {
            warn!("user lookup failed for {:?}: {}", name, err);
            None
        }
    }
}

/// Waits for the child, bounded by the job's timeout when one is set.
/// On expiry the process is killed and the run is failed.
async fn wait_with_timeout(job: &JobDefinition, mut child: Child) -> Completion {
    match job.timeout.filter(|t| !t.is_zero()) {
        Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
            Ok(status) => finish(job, status),
            Err(_) => {
                warn!("[{}] timed out after {:?}, killing", job.name, limit);
                if let Err(err) = child.kill().await {
                    warn!("[{}] kill failed: {}", job.name, err);
                }
                Completion {
                    exit_status: EXIT_KILLED,
                    success: false,
                    signaled: true,
                }
            }
        },
        None => wait_child(job, &mut child).await,
    }
}

async fn wait_child(job: &JobDefinition, child: &mut Child) -> Completion {
    finish(job, child.wait().await)
}

fn finish(job: &JobDefinition, status: std::io::Result<std::process::ExitStatus>) -> Completion {
    match status {
        Ok(status) => {
            let completion = Completion::from_status(status);
            if !completion.success {
                error!(
                    "[{}] execution error: exit status {}",
                    job.name, completion.exit_status
                );
            }
            completion
        }
        Err(err) => {
            error!("[{}] wait failed: {}", job.name, err);
            Completion::failed(EXIT_FAILURE)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::time::Duration;
    use tickd_core::DockerOptions;

    fn job(name: &str, command: &str) -> JobDefinition {
        JobDefinition {
            name: name.to_string(),
            spec: "* * * * *".to_string(),
            timezone: None,
            command: command.to_string(),
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

    #[tokio::test]
    async fn test_successful_run() {
        let record = execute(&job("ok", "true")).await;
        assert!(record.success);
        assert_eq!(record.exit_status, 0);
        assert!(!record.signaled);
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_failure() {
        let record = execute(&job("nope", "false")).await;
        assert!(!record.success);
        assert_eq!(record.exit_status, 1);
    }

    #[tokio::test]
    async fn test_exit_code_captured() {
        let mut job = job("exit7", "exit 7");
        job.shell = Some("sh".to_string());
        let record = execute(&job).await;
        assert!(!record.success);
        assert_eq!(record.exit_status, 7);
    }

    #[tokio::test]
    async fn test_spawn_failure_is_captured() {
        let record = execute(&job("ghost", "/no/such/binary-anywhere")).await;
        assert!(!record.success);
        assert_ne!(record.exit_status, 0);
    }

    #[tokio::test]
    async fn test_timeout_kills_the_run() {
        let mut job = job("sleepy", "sleep 2");
        job.timeout = Some(Duration::from_millis(200));

        let record = execute(&job).await;
        assert!(!record.success);
        assert!(record.signaled);
        // The run is bounded by the timeout, not by the sleep.
        assert!(record.duration < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_zero_timeout_means_unbounded() {
        let mut job = job("patient", "true");
        job.timeout = Some(Duration::ZERO);
        let record = execute(&job).await;
        assert!(record.success);
    }

    #[tokio::test]
    async fn test_multiline_command_runs_through_shell() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("marker");
        let job = job("script", &format!("touch {}\ntrue", marker.display()));
        assert!(job.shell_mode());

        let record = execute(&job).await;
        assert!(record.success);
        assert!(marker.exists());
    }

    #[tokio::test]
    async fn test_shell_pipeline() {
        let mut job = job("pipe", "echo hello | grep -q hello");
        job.shell = Some("sh".to_string());
        let record = execute(&job).await;
        assert!(record.success);
    }

    #[tokio::test]
    async fn test_environment_overrides_inherited() {
        unsafe { std::env::set_var("TICKD_TEST_ENV", "inherited") };

        let mut job = job("env", "test \"$TICKD_TEST_ENV\" = overridden");
        job.shell = Some("sh".to_string());
        job.environment
            .insert("TICKD_TEST_ENV".to_string(), "overridden".to_string());

        let record = execute(&job).await;
        assert!(record.success);
    }

    #[tokio::test]
    async fn test_working_directory_applied() {
        let dir = tempfile::tempdir().unwrap();
        let mut job = job("cwd", "test \"$PWD\" = \"$TICKD_EXPECTED\"");
        job.shell = Some("sh".to_string());
        job.dir = Some(dir.path().to_string_lossy().into_owned());
        job.environment.insert(
            "TICKD_EXPECTED".to_string(),
            dir.path().to_string_lossy().into_owned(),
        );

        let record = execute(&job).await;
        assert!(record.success);
    }

    #[tokio::test]
    async fn test_unknown_user_fails_without_spawning() {
        let mut job = job("imposter", "true");
        job.user = Some("no-such-user-here".to_string());

        let record = execute(&job).await;
        assert!(!record.success);
        assert_eq!(record.exit_status, 1);
    }

    #[tokio::test]
    async fn test_log_file_captures_output() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("run.log");

        let mut job = job("logged", "echo out; echo err >&2");
        job.shell = Some("sh".to_string());
        job.log = Some(log.clone());

        let record = execute(&job).await;
        assert!(record.success);

        let contents = std::fs::read_to_string(&log).unwrap();
        assert!(contents.contains("out"));
        assert!(contents.contains("err"));
    }

    #[tokio::test]
    async fn test_log_file_appends_across_runs() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("run.log");

        let mut job = job("appender", "echo line");
        job.shell = Some("sh".to_string());
        job.log = Some(log.clone());

        execute(&job).await;
        execute(&job).await;

        let contents = std::fs::read_to_string(&log).unwrap();
        assert_eq!(contents.matches("line").count(), 2);
    }

    #[test]
    fn test_docker_args_full() {
        let mut job = job("containerized", "bin/cleanup --all");
        job.docker = Some(DockerOptions {
            image: "alpine:3.20".to_string(),
        });
        job.dir = Some("/work".to_string());
        job.environment
            .insert("MODE".to_string(), "fast".to_string());

        let args = docker_args(&job);
        assert_eq!(
            args,
            vec![
                "run",
                "-i",
                "--rm",
                "--workdir",
                "/work",
                "-e",
                "MODE=fast",
                "alpine:3.20",
                "bin/cleanup",
                "--all",
            ]
        );
    }

    #[test]
    fn test_docker_args_minimal() {
        let mut job = job("tiny", "true");
        job.docker = Some(DockerOptions {
            image: "busybox".to_string(),
        });

        assert_eq!(docker_args(&job), vec!["run", "-i", "--rm", "busybox", "true"]);
    }
}
