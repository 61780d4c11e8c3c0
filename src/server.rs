//! HTTP surface for the relay: an axum router guarded by API keys, plus the process entry point
//! that wires the durable store, the coordinator, and the refresh schedule together.

mod auth;
mod config;
mod logging;
mod routes;

pub use auth::*;
pub use config::*;
pub use logging::init as init_logging;
pub use routes::*;

// crates.io
use axum::{
	Router, middleware,
	routing::{get, post},
};
use color_eyre::eyre::WrapErr;
use time::UtcOffset;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
// self
use crate::{_prelude::*, refresh::{self, ReqwestCoordinator}, store::FileStore};

/// Shared state handed to every handler.
#[derive(Clone, Debug)]
pub struct AppState {
	/// Coordinator owning the refresh protocol and the token log.
	pub coordinator: Arc<ReqwestCoordinator>,
	/// Keys accepted in the `X-API-Key` header.
	pub api_keys: Arc<ApiKeys>,
	/// Offset used when rendering timestamps for callers.
	pub display_offset: UtcOffset,
}

/// Builds the relay router: `GET /token`, `POST /refresh`, and `GET /status`, all key-guarded.
pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/token", get(routes::token))
		.route("/refresh", post(routes::refresh))
		.route("/status", get(routes::status))
		.route_layer(middleware::from_fn_with_state(state.clone(), auth::require_api_key))
		.with_state(state)
}

/// Runs the relay until Ctrl-C, then stops the schedule and waits for it to wind down.
pub async fn run(config: ServerConfig) -> color_eyre::Result<()> {
	let refresh_config = config.refresh_config()?;
	let store = FileStore::open(&config.token_store_path).wrap_err_with(|| {
		format!("Failed to open token store at {}.", config.token_store_path.display())
	})?;
	let coordinator = Arc::new(ReqwestCoordinator::new(Arc::new(store), refresh_config)?);
	let api_keys = ApiKeys::new(&config.api_keys);

	if api_keys.is_empty() {
		tracing::warn!("No API keys configured; every request will be rejected.");
	}

	let shutdown = CancellationToken::new();
	let schedule = refresh::spawn_refresh_loop(coordinator.clone(), shutdown.clone());
	let state =
		AppState { coordinator, api_keys: Arc::new(api_keys), display_offset: config.display_offset };
	let listener = TcpListener::bind(config.listen)
		.await
		.wrap_err_with(|| format!("Failed to bind {}.", config.listen))?;

	tracing::info!(addr = %listener.local_addr()?, "Token relay listening.");

	axum::serve(listener, router(state))
		.with_graceful_shutdown(shutdown_signal(shutdown.clone()))
		.await
		.wrap_err("HTTP server terminated unexpectedly.")?;
	shutdown.cancel();
	schedule.await.wrap_err("Refresh schedule panicked.")?;

	Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
	tokio::select! {
		result = tokio::signal::ctrl_c() => {
			if let Err(e) = result {
				tracing::error!(error = %e, "Failed to listen for Ctrl-C.");
			}
		},
		_ = shutdown.cancelled() => {},
	}

	tracing::info!("Shutting down token relay.");
}
