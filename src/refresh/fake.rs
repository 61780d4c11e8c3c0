//! Scripted in-process transport shared by the coordinator and scheduler tests.

// std
use std::{collections::VecDeque, io};
// crates.io
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
// self
use crate::{
	_prelude::*,
	config::RefreshConfig,
	error::TransportError,
	http::{RefreshRequest, RefreshTransport, TransportFuture, TransportResponse},
};

pub(crate) const SEED_TOKEN: &str = "seed-access";

#[derive(Clone, Debug)]
pub(crate) enum Reply {
	Status(u16, String),
	Unreachable,
}
impl Reply {
	pub(crate) fn token(access_token: &str) -> Self {
		Self::Status(200, serde_json::json!({ "data": { "access_token": access_token } }).to_string())
	}
}

/// Answers queued replies first, then repeats the fallback forever.
#[derive(Debug)]
pub(crate) struct ScriptedTransport {
	fallback: Reply,
	queued: Mutex<VecDeque<Reply>>,
	bearers: Mutex<Vec<String>>,
	delay: Option<std::time::Duration>,
}
impl ScriptedTransport {
	pub(crate) fn new(fallback: Reply) -> Self {
		Self { fallback, queued: Default::default(), bearers: Default::default(), delay: None }
	}

	pub(crate) fn then(self, reply: Reply) -> Self {
		self.queued.lock().push_back(reply);

		self
	}

	pub(crate) fn with_delay(mut self, delay: std::time::Duration) -> Self {
		self.delay = Some(delay);

		self
	}

	pub(crate) fn calls(&self) -> usize {
		self.bearers.lock().len()
	}

	pub(crate) fn bearers(&self) -> Vec<String> {
		self.bearers.lock().clone()
	}
}
impl RefreshTransport for ScriptedTransport {
	fn post_refresh<'a>(
		&'a self,
		_endpoint: &'a Url,
		request: RefreshRequest<'a>,
	) -> TransportFuture<'a> {
		self.bearers.lock().push(request.access_token.to_owned());

		let reply = self.queued.lock().pop_front().unwrap_or_else(|| self.fallback.clone());
		let delay = self.delay;

		Box::pin(async move {
			if let Some(delay) = delay {
				tokio::time::sleep(delay).await;
			}

			match reply {
				Reply::Status(status, body) =>
					Ok(TransportResponse { status, body: body.into_bytes() }),
				Reply::Unreachable => Err(TransportError::network(io::Error::new(
					io::ErrorKind::ConnectionRefused,
					"connection refused",
				))),
			}
		})
	}
}

pub(crate) fn config() -> RefreshConfig {
	RefreshConfig::builder()
		.endpoint_str("https://auth.example.com/v1/auth/refresh-token")
		.expect("Fixture endpoint should parse.")
		.refresh_token("refresh-secret")
		.seed_access_token(SEED_TOKEN)
		.build()
		.expect("Fixture config should be valid.")
}

pub(crate) fn jwt_with_exp(exp: i64) -> String {
	let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
	let payload = URL_SAFE_NO_PAD.encode(serde_json::json!({ "sub": "relay", "exp": exp }).to_string());

	format!("{header}.{payload}.sig")
}
