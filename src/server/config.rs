//! Command-line and environment configuration for the relay binary.

// std
use std::{net::SocketAddr, path::PathBuf};
// crates.io
use clap::{Parser, ValueEnum};
use time::{UtcOffset, macros::format_description};
// self
use crate::{_prelude::*, config::RefreshConfig, error::ConfigError};

/// Log output format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
	/// Human-readable single-line output.
	#[default]
	Compact,
	/// One JSON object per event.
	Json,
}

/// Relay process configuration; every flag falls back to an environment variable.
#[derive(Clone, Parser)]
#[command(name = "token-relay", version, about = "Keeps one upstream access token fresh and serves it.")]
pub struct ServerConfig {
	/// Address the HTTP server binds to.
	#[arg(long, env = "LISTEN_ADDR", default_value = "127.0.0.1:8000")]
	pub listen: SocketAddr,
	/// Upstream refresh endpoint.
	#[arg(long, env = "REFRESH_ENDPOINT")]
	pub refresh_endpoint: Url,
	/// Long-lived refresh secret.
	#[arg(long, env = "REFRESH_TOKEN", hide_env_values = true)]
	pub refresh_token: String,
	/// Bootstrap bearer for the first refresh.
	#[arg(long, env = "ACCESS_TOKEN", hide_env_values = true)]
	pub access_token: Option<String>,
	/// Comma-separated keys accepted in `X-API-Key`.
	#[arg(long, env = "API_KEYS", value_delimiter = ',', hide_env_values = true)]
	pub api_keys: Vec<String>,
	/// JSON Lines token log.
	#[arg(long, env = "TOKEN_STORE_PATH", default_value = "tokens.jsonl")]
	pub token_store_path: PathBuf,
	/// Seconds between automatic refreshes.
	#[arg(long, env = "REFRESH_INTERVAL_SECS", default_value_t = 3_300)]
	pub refresh_interval_secs: u32,
	/// Per-request timeout for the refresh call, in seconds.
	#[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = 30)]
	pub request_timeout_secs: u32,
	/// UTC offset used to render `/status` timestamps, e.g. `+03:30`.
	#[arg(long, env = "DISPLAY_OFFSET", default_value = "+00:00", value_parser = parse_offset)]
	pub display_offset: UtcOffset,
	/// Log output format.
	#[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Compact)]
	pub log_format: LogFormat,
}
impl ServerConfig {
	/// Builds the validated refresh configuration from the parsed flags.
	pub fn refresh_config(&self) -> Result<RefreshConfig, ConfigError> {
		let mut builder = RefreshConfig::builder()
			.endpoint(self.refresh_endpoint.clone())
			.refresh_token(self.refresh_token.clone())
			.refresh_interval(Duration::seconds(self.refresh_interval_secs.into()))
			.request_timeout(Duration::seconds(self.request_timeout_secs.into()));

		if let Some(seed) = self.access_token.as_ref() {
			builder = builder.seed_access_token(seed.clone());
		}

		builder.build()
	}
}
impl Debug for ServerConfig {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ServerConfig")
			.field("listen", &self.listen)
			.field("refresh_endpoint", &self.refresh_endpoint.as_str())
			.field("api_keys", &self.api_keys.len())
			.field("token_store_path", &self.token_store_path)
			.field("refresh_interval_secs", &self.refresh_interval_secs)
			.field("request_timeout_secs", &self.request_timeout_secs)
			.field("display_offset", &self.display_offset)
			.field("log_format", &self.log_format)
			.finish()
	}
}

fn parse_offset(value: &str) -> Result<UtcOffset, String> {
	let value = value.trim();

	if value.eq_ignore_ascii_case("z") || value.eq_ignore_ascii_case("utc") {
		return Ok(UtcOffset::UTC);
	}

	UtcOffset::parse(value, format_description!("[offset_hour sign:mandatory]:[offset_minute]"))
		.map_err(|e| format!("expected an offset like +03:30, got `{value}`: {e}"))
}
