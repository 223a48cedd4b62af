use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};

use healthcare_etl::config::Config;
use healthcare_etl::{dashboard, logging, metrics};

#[derive(Parser)]
#[command(name = "dashboard")]
#[command(about = "Web dashboard for the loaded healthcare data")]
struct Args {
    /// Path to the TOML configuration file (defaults to ./config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides dashboard.port)
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let _log_guard = logging::init_logging();
    metrics::init_metrics();

    let args = Args::parse();
    let config = Config::load(args.config.as_deref()).map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;
    let port = args.port.unwrap_or(config.dashboard.port);

    info!("Starting dashboard on port {}", port);
    dashboard::start_server(config, port).await
}
