//! CLI command definitions

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::response::Response;
use crate::sim::PushMode;

/// CommandTracker - await remote command completion
#[derive(Debug, Parser)]
#[command(
    name = "ct",
    about = "Submit simulated remote commands and await their completion",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Submit one simulated command and await its outcome
    Run(RunArgs),

    /// Print the effective configuration as YAML
    Config {
        /// Also write it to this file
        #[arg(short, long, value_name = "PATH")]
        write: Option<PathBuf>,
    },
}

/// Arguments for `ct run`
#[derive(Debug, Clone, clap::Args)]
pub struct RunArgs {
    /// Time until the command completes on its own
    #[arg(short, long, default_value = "100")]
    pub duration_ms: u64,

    /// Outcome produced on natural completion
    #[arg(short, long, value_enum, default_value = "ok")]
    pub outcome: OutcomeArg,

    /// Payload for an ok outcome, or `category/name` for an error outcome
    #[arg(short, long, default_value = "done")]
    pub payload: String,

    /// How the completion notification is pushed
    #[arg(long, value_enum, default_value = "deliver")]
    pub push: PushArg,

    /// Push delay when `--push delay` is used
    #[arg(long, default_value = "0")]
    pub push_delay_ms: u64,

    /// Number of initial status queries that fail
    #[arg(long, default_value = "0")]
    pub status_failures: u32,

    /// Make the remote reject cancel requests
    #[arg(long)]
    pub no_honor_cancel: bool,

    /// Request cancellation after this many milliseconds
    #[arg(long)]
    pub cancel_after_ms: Option<u64>,

    /// Number of status polls (defaults to the config value)
    #[arg(long)]
    pub steps: Option<u32>,

    /// Pause between polls (defaults to the config value)
    #[arg(long)]
    pub interval_ms: Option<u64>,

    /// Number of concurrent awaiters
    #[arg(short, long, default_value = "1")]
    pub waiters: usize,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutcomeArg {
    Ok,
    Error,
    Cancelled,
}

impl OutcomeArg {
    /// Build the response the simulated command settles with
    pub fn to_response(self, payload: &str) -> Response {
        match self {
            OutcomeArg::Ok => Response::ok(payload),
            OutcomeArg::Error => match payload.split_once('/') {
                Some((category, name)) => Response::error(category, name),
                None => Response::error("Remote", payload),
            },
            OutcomeArg::Cancelled => Response::Cancelled,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PushArg {
    Deliver,
    Drop,
    Delay,
}

impl PushArg {
    pub fn to_mode(self, delay_ms: u64) -> PushMode {
        match self {
            PushArg::Deliver => PushMode::Deliver,
            PushArg::Drop => PushMode::Drop,
            PushArg::Delay => PushMode::DelayMs(delay_ms),
        }
    }
}

/// Output format for `ct run`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}
