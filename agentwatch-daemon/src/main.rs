use anyhow::Result;
use clap::Parser;

use agentwatch_core::config::AgentwatchConfig;
use agentwatch_daemon::cli::DaemonCli;
use agentwatch_daemon::logging;
use agentwatch_daemon::orchestrator::Orchestrator;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();
    let config_path = cli.config_path();

    // file, then environment, then CLI flags; validated last
    let mut config = AgentwatchConfig::from_file(&config_path)
        .await
        .map_err(|e| anyhow::anyhow!("failed to load {}: {}", config_path.display(), e))?;
    config.apply_env_overrides();
    cli.apply_overrides(&mut config);

    if cli.validate {
        Orchestrator::build_from_config(config)?;
        println!("configuration OK: {}", config_path.display());
        return Ok(());
    }

    logging::init_tracing(&config.general)?;
    tracing::info!(config = %config_path.display(), "agentwatch starting");

    let mut orchestrator = Orchestrator::build_from_config(config)?;
    orchestrator.run().await
}
