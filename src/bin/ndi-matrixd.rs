//! Routing matrix daemon
//!
//! ```text
//! ndi-matrixd                  Run with ./ndi-matrix.toml (or defaults)
//! ndi-matrixd --config <path>  Load a custom config TOML
//! ndi-matrixd --gen-config     Write default config to stdout
//! ```
//!
//! Sources come from the `[[discovery.sources]]` list in the config file and
//! frames from a built-in test pattern, so the control API can be exercised
//! without the native video library.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use ndi_matrix::catalog::{SourceCatalog, StaticDiscovery};
use ndi_matrix::matrix::{NullRouter, RoutingEngine};
use ndi_matrix::monitor::{MonitorService, TestPatternCapture};
use ndi_matrix::{AppConfig, ControlServer};

#[derive(Parser, Debug)]
#[command(name = "ndi-matrixd", about = "Routing matrix and preview control daemon")]
struct Cli {
    /// Path to configuration TOML file
    #[arg(short, long, default_value = "ndi-matrix.toml")]
    config: PathBuf,

    /// Override the bind address from the config file
    #[arg(short, long)]
    bind: Option<String>,

    /// Print the default configuration to stdout and exit
    #[arg(long)]
    gen_config: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.gen_config {
        println!("{}", AppConfig::default().to_toml()?);
        return Ok(());
    }

    let mut config = AppConfig::load(&cli.config);
    if let Some(bind) = cli.bind {
        config.network.bind = bind;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "ndi-matrixd starting");

    let discovery = Arc::new(StaticDiscovery::new(config.static_sources()));
    let catalog = Arc::new(SourceCatalog::with_config(discovery, config.catalog_config()));
    let capture = TestPatternCapture::new(config.monitor.pattern_width, config.monitor.pattern_height);
    let monitors = Arc::new(MonitorService::with_config(
        Arc::new(capture),
        config.monitor_config(),
    ));
    let engine = Arc::new(RoutingEngine::new(
        config.matrix_config(),
        catalog,
        monitors,
        Arc::new(NullRouter),
    ));

    let server = ControlServer::new(config.server_config()?, engine);
    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        })
        .await?;

    tracing::info!("ndi-matrixd stopped");
    Ok(())
}
