//! Relay-level error types shared by the refresh path, transports, and stores.

// self
use crate::_prelude::*;

/// Relay-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn StdError + Send + Sync>;

/// Canonical refresh error exposed by public APIs.
///
/// Every variant is recoverable: a failed attempt leaves the store and the refresh schedule
/// untouched, and the next trigger simply tries again.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure; the freshly minted token is lost for this cycle.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// The refresh endpoint could not be reached or did not answer in time.
	#[error(transparent)]
	Network(#[from] TransportError),
	/// The refresh endpoint answered with a non-200 status.
	#[error("Refresh endpoint rejected the request with HTTP {status}.")]
	RemoteRejected {
		/// HTTP status code returned by the endpoint.
		status: u16,
		/// Response body, decoded lossily as UTF-8.
		body: String,
	},
	/// The refresh endpoint answered 200 but the payload did not carry a usable token.
	#[error(transparent)]
	MalformedResponse(#[from] ResponseError),
}

/// Configuration and validation failures raised while assembling a relay.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// No refresh endpoint was configured.
	#[error("Missing refresh endpoint.")]
	MissingEndpoint,
	/// Refresh endpoint could not be parsed.
	#[error("Refresh endpoint is not a valid URL.")]
	InvalidEndpoint {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Refresh endpoint must use HTTPS unless it points at a loopback host.
	#[error("The refresh endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// The refresh secret is missing or blank.
	#[error("Refresh token is missing or empty.")]
	MissingRefreshToken,
	/// A configured duration was zero or negative.
	#[error("The {name} must be positive.")]
	NonPositiveDuration {
		/// Which setting failed validation.
		name: &'static str,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, timeouts).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the refresh endpoint.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// The request exceeded the configured timeout.
	#[error("Refresh endpoint did not respond before the request timeout.")]
	Timeout {
		/// Transport-specific timeout error.
		#[source]
		source: BoxError,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Network { source: Box::new(src) }
	}

	/// Wraps a transport-specific timeout error.
	pub fn timeout(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Timeout { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		if e.is_timeout() { Self::timeout(e) } else { Self::network(e) }
	}
}

/// Reasons a 200 response could not be turned into an access token.
#[derive(Debug, ThisError)]
pub enum ResponseError {
	/// The body is not JSON or lacks `data.access_token` as a string.
	#[error("Refresh response is malformed at `{}`.", .0.path())]
	Parse(#[from] serde_path_to_error::Error<serde_json::Error>),
	/// The endpoint returned an empty access token.
	#[error("Refresh response carried an empty access token.")]
	EmptyAccessToken,
}
