//! Validated refresh configuration shared by the coordinator and the scheduler.

// crates.io
use url::Host;
// self
use crate::{_prelude::*, error::ConfigError, token::TokenSecret};

/// Everything the relay needs to talk to the upstream authority.
#[derive(Clone)]
pub struct RefreshConfig {
	/// Refresh endpoint receiving `POST {"access_token", "refresh_token"}`.
	pub endpoint: Url,
	/// Long-lived refresh secret; never sent anywhere but the refresh endpoint.
	pub refresh_token: TokenSecret,
	/// Bearer presented on the very first refresh, before the store holds any record.
	pub seed_access_token: Option<TokenSecret>,
	/// Fixed cadence between automatic refreshes, independent of the token's own lifetime.
	pub refresh_interval: Duration,
	/// Upper bound for a single refresh request.
	pub request_timeout: Duration,
}
impl RefreshConfig {
	/// Default automatic refresh cadence.
	pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::minutes(55);
	/// Default per-request timeout.
	pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::seconds(30);

	/// Creates an empty builder.
	pub fn builder() -> RefreshConfigBuilder {
		RefreshConfigBuilder::default()
	}
}
impl Debug for RefreshConfig {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RefreshConfig")
			.field("endpoint", &self.endpoint.as_str())
			.field("seed_access_token_set", &self.seed_access_token.is_some())
			.field("refresh_interval", &self.refresh_interval)
			.field("request_timeout", &self.request_timeout)
			.finish()
	}
}

/// Builder for [`RefreshConfig`] values.
#[derive(Debug, Default)]
pub struct RefreshConfigBuilder {
	endpoint: Option<Url>,
	refresh_token: Option<TokenSecret>,
	seed_access_token: Option<TokenSecret>,
	refresh_interval: Option<Duration>,
	request_timeout: Option<Duration>,
}
impl RefreshConfigBuilder {
	/// Sets the refresh endpoint.
	pub fn endpoint(mut self, url: Url) -> Self {
		self.endpoint = Some(url);

		self
	}

	/// Parses and sets the refresh endpoint.
	pub fn endpoint_str(self, url: &str) -> Result<Self, ConfigError> {
		let url = Url::parse(url).map_err(|source| ConfigError::InvalidEndpoint { source })?;

		Ok(self.endpoint(url))
	}

	/// Sets the refresh secret.
	pub fn refresh_token(mut self, token: impl Into<String>) -> Self {
		self.refresh_token = Some(TokenSecret::new(token));

		self
	}

	/// Sets the bootstrap bearer; blank values are treated as absent.
	pub fn seed_access_token(mut self, token: impl Into<String>) -> Self {
		let token = TokenSecret::new(token);

		self.seed_access_token = (!token.is_blank()).then_some(token);

		self
	}

	/// Overrides the automatic refresh cadence (defaults to 55 minutes).
	pub fn refresh_interval(mut self, interval: Duration) -> Self {
		self.refresh_interval = Some(interval);

		self
	}

	/// Overrides the per-request timeout (defaults to 30 seconds).
	pub fn request_timeout(mut self, timeout: Duration) -> Self {
		self.request_timeout = Some(timeout);

		self
	}

	/// Consumes the builder and validates the resulting config.
	pub fn build(self) -> Result<RefreshConfig, ConfigError> {
		let endpoint = self.endpoint.ok_or(ConfigError::MissingEndpoint)?;
		let refresh_token = self
			.refresh_token
			.filter(|token| !token.is_blank())
			.ok_or(ConfigError::MissingRefreshToken)?;
		let refresh_interval =
			self.refresh_interval.unwrap_or(RefreshConfig::DEFAULT_REFRESH_INTERVAL);
		let request_timeout = self.request_timeout.unwrap_or(RefreshConfig::DEFAULT_REQUEST_TIMEOUT);

		validate_endpoint(&endpoint)?;
		validate_positive("refresh interval", refresh_interval)?;
		validate_positive("request timeout", request_timeout)?;

		Ok(RefreshConfig {
			endpoint,
			refresh_token,
			seed_access_token: self.seed_access_token,
			refresh_interval,
			request_timeout,
		})
	}
}

fn validate_endpoint(url: &Url) -> Result<(), ConfigError> {
	match url.scheme() {
		"https" => Ok(()),
		"http" if is_loopback(url) => Ok(()),
		_ => Err(ConfigError::InsecureEndpoint { url: url.to_string() }),
	}
}

fn is_loopback(url: &Url) -> bool {
	match url.host() {
		Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
		Some(Host::Ipv4(ip)) => ip.is_loopback(),
		Some(Host::Ipv6(ip)) => ip.is_loopback(),
		None => false,
	}
}

fn validate_positive(name: &'static str, value: Duration) -> Result<(), ConfigError> {
	if value.is_positive() { Ok(()) } else { Err(ConfigError::NonPositiveDuration { name }) }
}
