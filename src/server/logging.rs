// crates.io
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
// self
use crate::server::LogFormat;

/// Installs the global subscriber; `RUST_LOG` overrides the default `info` filter.
///
/// Calling it again is a no-op.
pub fn init(format: LogFormat) {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
	let registry = tracing_subscriber::registry().with(filter);

	match format {
		LogFormat::Json => {
			let _ = registry.with(fmt::layer().json().flatten_event(true).with_ansi(false)).try_init();
		},
		LogFormat::Compact => {
			let _ = registry.with(fmt::layer().compact()).try_init();
		},
	}
}
