//! Docchat Gateway - Main entry point.

use anyhow::Result;
use docchat_common::config::Config;
use docchat_common::logging::init_logging;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::load_with_env()?;

    init_logging(&config.observability.log_level, &config.observability.log_format);

    tracing::info!("Docchat Gateway v{}", env!("CARGO_PKG_VERSION"));

    docchat_gateway::start_server(&config).await
}
