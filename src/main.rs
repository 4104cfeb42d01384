use std::sync::Arc;

use anyhow::{Result, anyhow};
use clap::Parser;

use todowatch::Settings;
use todowatch::cli::commands::{daemon, init, list, scan};
use todowatch::cli::{Cli, Commands};
use todowatch::logging::LogProfile;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Settings::config_path);

    if let Commands::Init { force } = cli.command {
        todowatch::logging::init();
        return init::run_init(&config_path, force);
    }

    let settings = Settings::load_from(&config_path)
        .map_err(|e| anyhow!("failed to load {}: {e}", config_path.display()))?;
    let profile = match cli.command {
        Commands::Daemon => LogProfile::Daemon,
        _ => LogProfile::Cli,
    };
    todowatch::logging::init_with_config(&settings.logging, profile);
    let settings = Arc::new(settings);

    match cli.command {
        Commands::Init { .. } => Ok(()),
        Commands::Config => init::run_config(&settings),
        Commands::Scan { name, path, active } => {
            scan::run_scan(settings, name.as_deref(), path.as_deref(), active).await
        }
        Commands::List { project } => list::run_list(&settings, project.as_deref()),
        Commands::Forget { name } => list::run_forget(settings, &name).await,
        Commands::Daemon => daemon::run_daemon(settings).await,
    }
}
