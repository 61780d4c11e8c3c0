//! `X-API-Key` guard.

// crates.io
use axum::{
	extract::{Request, State},
	middleware::Next,
	response::{IntoResponse, Response},
};
// self
use crate::{
	_prelude::*,
	server::{AppState, routes::ApiError},
};

/// Header carrying the caller's API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Set of accepted API keys; blank entries are dropped.
#[derive(Clone, Default)]
pub struct ApiKeys(Vec<String>);
impl ApiKeys {
	/// Collects keys, trimming whitespace and ignoring blanks and duplicates.
	pub fn new<I, S>(keys: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		let mut accepted = Vec::new();

		for key in keys {
			let key = key.as_ref().trim();

			if !key.is_empty() && !accepted.iter().any(|k: &String| k == key) {
				accepted.push(key.to_owned());
			}
		}

		Self(accepted)
	}

	/// Number of accepted keys.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Returns `true` when no key is accepted, i.e. every request is rejected.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Checks `candidate` against every key without short-circuiting on the first match.
	pub fn contains(&self, candidate: &str) -> bool {
		self.0.iter().fold(false, |matched, key| constant_time_eq(key, candidate) | matched)
	}
}
impl Debug for ApiKeys {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ApiKeys").field("len", &self.0.len()).finish()
	}
}

/// Rejects requests whose `X-API-Key` is missing or unknown with `401`.
pub async fn require_api_key(State(state): State<AppState>, request: Request, next: Next) -> Response {
	let authorized = request
		.headers()
		.get(API_KEY_HEADER)
		.and_then(|value| value.to_str().ok())
		.is_some_and(|key| state.api_keys.contains(key));

	if authorized {
		return next.run(request).await;
	}

	tracing::debug!(path = request.uri().path(), "Rejected request with a missing or invalid API key.");

	ApiError::unauthorized().into_response()
}

fn constant_time_eq(a: &str, b: &str) -> bool {
	let (a, b) = (a.as_bytes(), b.as_bytes());

	if a.len() != b.len() {
		return false;
	}

	a.iter().zip(b).fold(0_u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
