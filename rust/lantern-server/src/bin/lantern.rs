use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::Result;
use clap::Parser;
use lantern_server::{ImageServer, ImageService, ModelRegistry, RequestHandler, ServerConfig};

#[derive(Debug, Parser)]
#[command(name = "lantern")]
#[command(bin_name = "lantern")]
#[command(about = "Serves images over the IIIF Image API", long_about = None)]
pub struct LanternCli {
    /// Path to the JSON server configuration
    pub config: PathBuf,

    /// Bind address, overriding the configured one
    #[arg(short, long)]
    pub address: Option<SocketAddr>,
}

#[tokio::main]
pub async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = LanternCli::parse();

    let mut config = ServerConfig::load(&cli.config).await?;
    if let Some(address) = cli.address {
        config.address = address;
    }

    let registry = ModelRegistry::from_config(&config)?;
    let handler = RequestHandler::new(
        Arc::new(registry),
        config.substitute_image.clone(),
        &config.output_formats,
    )?;

    let server = ImageServer::start(config.address, ImageService::new(handler)).await?;

    tokio::signal::ctrl_c().await?;
    server.stop();

    Ok(())
}
