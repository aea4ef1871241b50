use anyhow::Context;
use clap::Parser;
use discord_mcp_auth::cli::{self, Cli};
use discord_mcp_auth::infrastructure::logging;
use discord_mcp_auth::{AppConfig, AuthCore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = AppConfig::load().context("failed to load configuration")?;
    config.validate()?;
    logging::init_logging(&config.logging);

    let core = AuthCore::from_config(&config).await?;
    cli::run(&core, cli.command).await
}
