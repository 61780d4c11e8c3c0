//! Helpers shared by the integration tests.

#![allow(dead_code)]

// std
use std::sync::Arc;
// crates.io
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use time::OffsetDateTime;
// self
use token_relay::{
	config::RefreshConfig,
	http::ReqwestHttpClient,
	refresh::{RefreshCoordinator, ReqwestCoordinator},
	store::{MemoryStore, TokenStore},
};

pub const REFRESH_TOKEN: &str = "refresh-secret";
pub const SEED_TOKEN: &str = "seed-access";

pub fn refresh_config(endpoint: &str) -> RefreshConfig {
	RefreshConfig::builder()
		.endpoint_str(endpoint)
		.expect("Test refresh endpoint should parse.")
		.refresh_token(REFRESH_TOKEN)
		.seed_access_token(SEED_TOKEN)
		.build()
		.expect("Test refresh config should be valid.")
}

/// Reqwest-backed coordinator over an in-memory store the test can inspect directly.
pub fn build_coordinator(endpoint: &str) -> (Arc<ReqwestCoordinator>, Arc<MemoryStore>) {
	let store_backend = Arc::new(MemoryStore::default());
	let store: Arc<dyn TokenStore> = store_backend.clone();
	let config = refresh_config(endpoint);
	let http_client = ReqwestHttpClient::with_timeout(config.request_timeout)
		.expect("Failed to build Reqwest client for tests.");
	let coordinator = RefreshCoordinator::with_http_client(store, config, http_client);

	(Arc::new(coordinator), store_backend)
}

/// Unsigned JWT whose payload is `claims`.
pub fn jwt(claims: &serde_json::Value) -> String {
	let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
	let payload = URL_SAFE_NO_PAD.encode(claims.to_string());

	format!("{header}.{payload}.signature")
}

pub fn unix(seconds: i64) -> OffsetDateTime {
	OffsetDateTime::from_unix_timestamp(seconds).expect("Unix timestamp fixture should be valid.")
}
