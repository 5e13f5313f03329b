use clap::Parser;

use timeclock_rs::cli::{self, Cli};
use timeclock_rs::config::Environment;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = cli::load_and_merge_config(&cli)?;
    cli::init_logger_from_settings(&settings)?;

    tracing::debug!(
        app_name = %settings.application.name,
        app_version = %settings.application.version,
        environment = %cli.env.clone().map(Environment::from).unwrap_or_else(Environment::from_env).as_str(),
        cache_backend = ?settings.cache.backend,
        "Configuration loaded"
    );

    if let Err(e) = cli::execute_command(&cli, settings).await {
        tracing::error!(error = %e, "Command failed");
        return Err(e.into());
    }

    Ok(())
}
