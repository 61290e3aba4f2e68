//! Tickctl
//!
//! Command-line client for the tickd control socket: trigger a job,
//! list schedule states, or force a configuration reload.

mod client;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use colored::*;

#[derive(Parser)]
#[command(name = "tickctl")]
#[command(about = "Control client for the tickd scheduler", long_about = None)]
struct Cli {
    /// Path to the daemon's control socket
    #[arg(long, env = "TICKD_SOCKET", default_value = "/var/run/tickd.sock")]
    socket: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a job immediately
    Trigger {
        /// Name of the job to run
        name: String,
    },
    /// List jobs and their schedule states
    List,
    /// Reload the daemon's configuration file
    Reload,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {:#}", "error:".red().bold(), err);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Trigger { name } => {
            let reply = client::send(&cli.socket, &format!("run {}", name)).await?;
            check(&reply)?;
            println!("{}", reply.green());
        }
        Commands::List => {
            let reply = client::send(&cli.socket, "list").await?;
            check(&reply)?;
            if reply.is_empty() {
                println!("{}", "No jobs configured.".yellow());
            } else {
                for line in reply.lines() {
                    print_state_line(line);
                }
            }
        }
        Commands::Reload => {
            let reply = client::send(&cli.socket, "reload").await?;
            check(&reply)?;
            println!("{}", reply.green());
        }
    }
    Ok(())
}

/// Turns an `err:` reply into a failure
fn check(reply: &str) -> Result<()> {
    if let Some(reason) = reply.strip_prefix("err: ") {
        bail!("{}", reason);
    }
    Ok(())
}

/// Prints one `<name>: <state>` line with the state colorized
fn print_state_line(line: &str) {
    match line.rsplit_once(": ") {
        Some((name, "active")) => println!("{}: {}", name.bold(), "active".green()),
        Some((name, "inactive")) => println!("{}: {}", name.bold(), "inactive".yellow()),
        _ => println!("{}", line),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_passes_ok_replies() {
        assert!(check("ok: scheduled").is_ok());
        assert!(check("backup: active").is_ok());
        assert!(check("").is_ok());
    }

    #[test]
    fn test_check_rejects_err_replies() {
        let err = check("err: not found").unwrap_err();
        assert_eq!(err.to_string(), "not found");
    }
}
