//! burngate entry point.

mod cli;

use burngate::GatewayBuilder;
use clap::Parser;
use cli::Cli;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    let cli = Cli::parse();
    let json_logs = cli.json_logs;
    let write_config = cli.write_config.clone();
    let config = cli.into_config()?;

    if let Some(path) = write_config {
        config.to_file(&path)?;
        println!("Configuration written to {}", path.display());
        return Ok(());
    }

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let registry = tracing_subscriber::registry().with(filter);
    if json_logs {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }

    info!("burngate v{}", env!("CARGO_PKG_VERSION"));

    let mut gateway = GatewayBuilder::new(config).build().await?;
    gateway.run().await?;

    info!("Goodbye!");
    Ok(())
}
