use anyhow::Result;
use commandry_core::{load_config, resolve_config_root, AppConfig};
use tracing::warn;

use crate::setup_flows::run_setup_command;
use crate::{Cli, Commands, Logging, SetupCommands};

pub(crate) fn run_cli(cli: Cli, logging: &Logging) -> Result<()> {
    match cli.command {
        Commands::Setup(args) => {
            let loaded = resolve_config_root().and_then(|root| load_config(&root));
            let config = config_for_setup(loaded, args.command)?;
            logging.apply_config(&config);
            run_setup_command(args, &config)?;
        }
        Commands::Version => {
            println!("cmdry {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}

/// Undo works from recorded state, so an unreadable config must not block it.
pub(crate) fn config_for_setup(
    loaded: Result<AppConfig>,
    command: Option<SetupCommands>,
) -> Result<AppConfig> {
    match (loaded, command) {
        (Ok(config), _) => Ok(config),
        (Err(err), Some(SetupCommands::Undo)) => {
            warn!("ignoring unreadable config for undo: {err:#}");
            Ok(AppConfig::default())
        }
        (Err(err), _) => Err(err),
    }
}
