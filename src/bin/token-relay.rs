//! Token relay server.

// crates.io
use clap::Parser;
// self
use token_relay::server::{self, ServerConfig};

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let config = ServerConfig::parse();

	server::init_logging(config.log_format);
	tracing::debug!(?config, "Loaded relay configuration.");

	server::run(config).await
}
