use std::sync::Arc;

use clap::Parser;

use sc_agent::cli::{self, Cli, Command, ConfigCommand};
use sc_agent::logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        // Default to run when no subcommand is given.
        None | Some(Command::Run) => {
            let (config, config_path) = cli::load_config()?;
            logging::init_file_tracing(&config.observability)?;
            tracing::info!(config = %config_path, "starting agent");
            cli::run::run(Arc::new(config)).await
        }
        Some(Command::Clear) => {
            logging::init_cli_tracing();
            let (config, _config_path) = cli::load_config()?;
            println!("{}", cli::clear::clear(&config)?);
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Validate)) => {
            let (config, config_path) = cli::load_config()?;
            if !cli::config::validate(&config, &config_path) {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Show)) => {
            let (config, _config_path) = cli::load_config()?;
            cli::config::show(&config)
        }
    }
}
