//! CommandTracker - CLI entry point
//!
//! Submits simulated remote commands and awaits their completion.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use serde_json::json;
use tracing::{debug, info};

use commandtracker::cli::{Cli, Command, OutputFormat, RunArgs};
use commandtracker::config::Config;
use commandtracker::{CompletionCoordinator, Response, SimScript, SimulatedRemote};

const EXIT_OK: i32 = 0;
const EXIT_FAILED: i32 = 1;
const EXIT_TIMED_OUT: i32 = 2;

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Determine log level with priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .try_init()
        .map_err(|e| eyre::eyre!("Failed to install subscriber: {}", e))?;

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());

    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Run(args) => {
            debug!(?args, "main: matched Run command");
            let code = cmd_run(&config, args).await?;
            std::process::exit(code);
        }
        Command::Config { write } => {
            debug!(?write, "main: matched Config command");
            cmd_config(&config, write.as_deref())
        }
    }
}

/// Submit one command and wait on it from `--waiters` tasks
async fn cmd_run(config: &Config, args: RunArgs) -> Result<i32> {
    debug!("cmd_run: called");
    let steps = args.steps.unwrap_or(config.wait.steps);
    let interval = args
        .interval_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| config.wait.interval());

    let script = SimScript::default()
        .with_duration(Duration::from_millis(args.duration_ms))
        .with_outcome(args.outcome.to_response(&args.payload))
        .with_push(args.push.to_mode(args.push_delay_ms))
        .with_status_failures(args.status_failures)
        .with_honor_cancel(!args.no_honor_cancel);

    let remote = SimulatedRemote::spawn(&config.sim);
    let handle = remote
        .submit_script(script)
        .await
        .context("Failed to submit command")?;
    info!(id = %handle.id(), session = %handle.session(), "Command submitted");

    let coordinator = Arc::new(CompletionCoordinator::new(handle));

    let canceller = args.cancel_after_ms.map(|delay_ms| {
        let coordinator = coordinator.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            coordinator.cancel().await
        })
    });

    let started = Instant::now();
    let waiters = (0..args.waiters.max(1)).map(|_| {
        let coordinator = coordinator.clone();
        async move { coordinator.wait(steps, interval).await }
    });
    let outcomes = futures::future::join_all(waiters).await;
    let elapsed = started.elapsed();

    let cancel_accepted = match canceller {
        Some(task) => {
            if !task.is_finished() {
                task.abort();
            }
            task.await.ok()
        }
        None => None,
    };

    let timed_out = outcomes.iter().filter(|o| o.is_timed_out()).count();
    let response = coordinator.response();
    let code = exit_code(response.as_deref(), timed_out);

    match args.format {
        OutputFormat::Text => {
            let id = coordinator.handle().id();
            match &response {
                Some(r) if r.is_ok() => println!("{} {} {}", "✓".green(), id.to_string().cyan(), r),
                Some(r) => println!("{} {} {}", "✗".red(), id.to_string().cyan(), r),
                None => println!("{} {} {}", "…".yellow(), id.to_string().cyan(), "timed out".yellow()),
            }
            println!(
                "  waiters: {} ({} timed out), elapsed: {}ms",
                outcomes.len(),
                timed_out,
                elapsed.as_millis()
            );
            if let Some(accepted) = cancel_accepted {
                println!("  cancel accepted: {}", accepted);
            }
            let stats = coordinator.stats();
            println!(
                "  {} status queries, {} transport failures, {} poll runs, finalized by {}",
                stats.status_queries,
                stats.transport_failures,
                stats.poll_runs,
                stats
                    .finalized_by
                    .map(|by| format!("{:?}", by).to_lowercase())
                    .unwrap_or_else(|| "-".to_string())
                    .dimmed()
            );
        }
        OutputFormat::Json => {
            let output = json!({
                "id": coordinator.handle().id(),
                "session": coordinator.handle().session(),
                "submitted_at": coordinator.handle().submitted_at(),
                "timed_out": response.is_none(),
                "response": response.as_deref(),
                "state": coordinator.state(),
                "waiters": outcomes.len(),
                "waiters_timed_out": timed_out,
                "cancel_accepted": cancel_accepted,
                "elapsed_ms": elapsed.as_millis() as u64,
                "stats": coordinator.stats(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    let _ = remote.shutdown().await;
    Ok(code)
}

fn exit_code(response: Option<&Response>, timed_out: usize) -> i32 {
    match response {
        Some(response) if timed_out == 0 && response.is_ok() => EXIT_OK,
        Some(_) if timed_out == 0 => EXIT_FAILED,
        _ => EXIT_TIMED_OUT,
    }
}

/// Print the effective configuration, optionally saving it
fn cmd_config(config: &Config, write: Option<&Path>) -> Result<()> {
    debug!(?write, "cmd_config: called");
    let yaml = serde_yaml::to_string(config).context("Failed to serialize config")?;
    print!("{}", yaml);

    if let Some(path) = write {
        config.save(path)?;
        info!(path = %path.display(), "Wrote config");
    }
    Ok(())
}
