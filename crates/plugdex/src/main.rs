use std::sync::Arc;

use anyhow::Result;
use clap::Parser;

use plugdex_logging::{init_logging, LogConfig};
use plugdex::transport::HttpCatalogClient;

/// Terminal browser for the Vim plugin catalog.
#[derive(Debug, Parser)]
#[command(name = "plugdex", version, about)]
struct Cli {
    /// Base URL of the catalog API
    #[arg(long, env = "PLUGDEX_API_URL", default_value = "https://vimawesome.com")]
    api_url: String,

    /// Verbose logging (the file log under ~/.plugdex/logs is always written)
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(LogConfig {
        app_name: "plugdex",
        verbose: cli.verbose,
        tui_mode: true,
    })?;
    tracing::info!(api_url = %cli.api_url, "starting plugdex");

    let transport = HttpCatalogClient::new(&cli.api_url)?;
    plugdex::tui::run(Arc::new(transport)).await
}
