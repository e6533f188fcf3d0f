//! Workdesk - workspace file manager and AI chat assistant server
//!
//! Main entry point: parses arguments, loads configuration, and
//! dispatches to the command handlers.

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use workdesk::cli::{Cli, Commands, ConfigCommand, SessionCommand};
use workdesk::commands;
use workdesk::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    init_tracing(cli.verbose);

    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path, &cli)?;
    config.validate()?;

    match &cli.command {
        Commands::Serve { host, port } => {
            tracing::info!("Starting server");
            if let Some(host) = host {
                tracing::debug!("Using host override: {}", host);
            }
            if let Some(port) = port {
                tracing::debug!("Using port override: {}", port);
            }
            commands::serve::run_serve(config).await
        }
        Commands::Sessions { command } => match command {
            SessionCommand::List { user } => commands::sessions::list_sessions(&config, user),
            SessionCommand::Delete { user, id } => {
                commands::sessions::delete_session(&config, user, id)
            }
        },
        Commands::Config { command } => match command {
            ConfigCommand::Validate => {
                println!("Configuration at {} is valid", config_path);
                Ok(())
            }
        },
    }
}

/// Initialize tracing subscriber with environment filter
fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "workdesk=debug"
    } else {
        "workdesk=info"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
