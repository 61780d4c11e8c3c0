//! Transport primitives for refresh exchanges.
//!
//! [`RefreshTransport`] is the relay's only dependency on an HTTP stack: it posts the JSON
//! refresh request and hands back the raw status and body so the coordinator can classify the
//! outcome itself. [`ReqwestHttpClient`] is the default implementation.

// self
use crate::{_prelude::*, error::TransportError};
#[cfg(feature = "reqwest")] use crate::error::ConfigError;

/// Boxed future returned by [`RefreshTransport::post_refresh`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<TransportResponse, TransportError>> + 'a + Send>>;

/// JSON body posted to the refresh endpoint.
#[derive(Clone, Copy, Serialize)]
pub struct RefreshRequest<'a> {
	/// Bearer currently held by the relay (latest stored token or the bootstrap seed).
	pub access_token: &'a str,
	/// Long-lived refresh secret.
	pub refresh_token: &'a str,
}
impl Debug for RefreshRequest<'_> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RefreshRequest")
			.field("access_token", &"<redacted>")
			.field("refresh_token", &"<redacted>")
			.finish()
	}
}

/// Raw response captured from the refresh endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransportResponse {
	/// HTTP status code.
	pub status: u16,
	/// Unparsed response body.
	pub body: Vec<u8>,
}
impl TransportResponse {
	/// Returns `true` for the only status the relay accepts as success.
	pub fn is_ok(&self) -> bool {
		self.status == 200
	}

	/// Body decoded lossily as UTF-8 for error reporting.
	pub fn body_text(&self) -> String {
		String::from_utf8_lossy(&self.body).into_owned()
	}
}

/// Abstraction over HTTP clients capable of posting refresh requests.
///
/// Implementations send `request` as a JSON body with `Content-Type: application/json` and must
/// report every HTTP response, whatever its status, as `Ok`. Only failures to obtain a response
/// (connection errors, timeouts) are [`TransportError`]s.
pub trait RefreshTransport
where
	Self: 'static + Send + Sync,
{
	/// Posts `request` to `endpoint`.
	fn post_refresh<'a>(
		&'a self,
		endpoint: &'a Url,
		request: RefreshRequest<'a>,
	) -> TransportFuture<'a>;
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// Refresh endpoints answer directly, so clients built by [`ReqwestHttpClient::with_timeout`] do
/// not follow redirects; configure any custom [`ReqwestClient`] the same way.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	/// Builds a client with a per-request timeout and redirects disabled.
	pub fn with_timeout(timeout: Duration) -> Result<Self, ConfigError> {
		let client = ReqwestClient::builder()
			.timeout(timeout.unsigned_abs())
			.redirect(reqwest::redirect::Policy::none())
			.build()?;

		Ok(Self(client))
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl RefreshTransport for ReqwestHttpClient {
	fn post_refresh<'a>(
		&'a self,
		endpoint: &'a Url,
		request: RefreshRequest<'a>,
	) -> TransportFuture<'a> {
		Box::pin(async move {
			let response = self.0.post(endpoint.clone()).json(&request).send().await?;
			let status = response.status().as_u16();
			let body = response.bytes().await?.to_vec();

			Ok(TransportResponse { status, body })
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn refresh_request_serializes_expected_shape() {
		let request = RefreshRequest { access_token: "current", refresh_token: "secret" };
		let payload = serde_json::to_value(request).expect("Refresh request should serialize.");

		assert_eq!(payload, serde_json::json!({ "access_token": "current", "refresh_token": "secret" }));
		assert_eq!(
			format!("{request:?}"),
			"RefreshRequest { access_token: \"<redacted>\", refresh_token: \"<redacted>\" }"
		);
	}

	#[test]
	fn only_200_counts_as_success() {
		let ok = TransportResponse { status: 200, body: b"{}".to_vec() };
		let created = TransportResponse { status: 201, body: vec![0xff, b'x'] };

		assert!(ok.is_ok());
		assert!(!created.is_ok());
		assert_eq!(created.body_text(), "\u{fffd}x");
	}
}
