use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use commandry_core::AppConfig;
use tracing::warn;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, reload, EnvFilter, Registry};

mod dispatch;
mod render;
mod setup_flows;

use dispatch::run_cli;

const LOG_ENV: &str = "COMMANDRY_LOG";

#[derive(Parser, Debug)]
#[command(name = "cmdry")]
#[command(about = "Commandry command-line tool", long_about = None)]
struct Cli {
    /// Log every setup step to stderr.
    #[arg(long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Install cmdry for the current user and put it on PATH. Without a subcommand, prints the
    /// plan and changes nothing.
    Setup(SetupArgs),
    Version,
}

#[derive(Args, Debug, Clone, Default)]
struct SetupArgs {
    #[arg(long, global = true)]
    bin_dir: Option<PathBuf>,
    #[arg(long, global = true, default_value = "user")]
    scope: String,
    #[arg(long, global = true)]
    no_path: bool,
    /// Update PATH even when the config file sets `no_path`.
    #[arg(long, global = true, conflicts_with = "no_path")]
    path: bool,
    #[arg(long, global = true, default_value = "none")]
    completion: String,
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Option<SetupCommands>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum SetupCommands {
    /// Report what is installed and whether PATH is set up.
    Status,
    /// Install the running binary and update PATH.
    Apply,
    /// Reverse a previous apply using the recorded state.
    Undo,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let logging = Logging::init(cli.verbose);
    run_cli(cli, &logging)
}

/// Logging starts from the environment and `--verbose`; a configured level is applied once the
/// config file has been read.
struct Logging {
    env_filter: Option<String>,
    verbose: bool,
    handle: reload::Handle<EnvFilter, Registry>,
}

impl Logging {
    fn init(verbose: bool) -> Self {
        let env_filter = std::env::var(LOG_ENV).ok();
        let filter = resolve_log_filter(env_filter.as_deref(), verbose, None);
        let (filter_layer, handle) = reload::Layer::new(EnvFilter::new(filter));
        tracing_subscriber::registry()
            .with(filter_layer)
            .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
            .init();
        Self {
            env_filter,
            verbose,
            handle,
        }
    }

    fn apply_config(&self, config: &AppConfig) {
        let filter = resolve_log_filter(
            self.env_filter.as_deref(),
            self.verbose,
            config.log.level.as_deref(),
        );
        if let Err(err) = self.handle.reload(EnvFilter::new(filter)) {
            warn!("failed to apply configured log level: {err}");
        }
    }
}

fn resolve_log_filter(
    env_filter: Option<&str>,
    verbose: bool,
    configured: Option<&str>,
) -> String {
    if let Some(filter) = env_filter.map(str::trim).filter(|value| !value.is_empty()) {
        return filter.to_string();
    }
    if verbose {
        return "debug".to_string();
    }
    configured
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or("warn")
        .to_string()
}
