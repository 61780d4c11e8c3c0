//! Refresh orchestration with at-most-one-in-flight guards, claim decoding, and metrics.
//!
//! [`RefreshCoordinator`] owns the whole refresh protocol: it presents the current bearer and the
//! refresh secret to the upstream endpoint, extracts the new access token, reads its expiry from
//! the embedded claims, appends it to the [`TokenStore`], and pushes the next scheduled refresh
//! out by the configured fixed interval. Timer ticks and manual triggers share one path; a
//! trigger that arrives while another refresh is in flight returns [`RefreshOutcome::Skipped`]
//! immediately instead of queuing. Reads go straight to the store and never wait on a refresh.

mod metrics;
mod schedule;

#[cfg(test)] pub(crate) mod fake;

pub use metrics::RefreshMetrics;
pub use schedule::*;

// self
use crate::{
	_prelude::*,
	config::RefreshConfig,
	error::ResponseError,
	http::{RefreshRequest, RefreshTransport, TransportResponse},
	obs::{self, FlowOutcome, RefreshSpan, RefreshTrigger},
	store::TokenStore,
	token::{self, ClaimsError, StatusView, TokenRecord, TokenSecret, record::whole_seconds},
};
// crates.io
use tokio::task::JoinHandle;
#[cfg(feature = "reqwest")] use crate::http::ReqwestHttpClient;

#[cfg(feature = "reqwest")]
/// Coordinator specialized for the crate's default reqwest transport.
pub type ReqwestCoordinator = RefreshCoordinator<ReqwestHttpClient>;

/// Reads a token's expiry from its claims; `Ok(None)` means the token carries no expiry.
pub type ExpiryDecoder = fn(&str) -> Result<Option<OffsetDateTime>, ClaimsError>;

/// Result of a refresh trigger that did not fail.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RefreshOutcome {
	/// This trigger ran the protocol and persisted a new record.
	Refreshed(TokenRecord),
	/// Another refresh was already in flight; nothing was done.
	Skipped,
}
impl RefreshOutcome {
	/// Returns the new record, if this trigger produced one.
	pub fn record(&self) -> Option<&TokenRecord> {
		match self {
			Self::Refreshed(record) => Some(record),
			Self::Skipped => None,
		}
	}

	/// Consumes the outcome and returns the new record, if any.
	pub fn into_record(self) -> Option<TokenRecord> {
		match self {
			Self::Refreshed(record) => Some(record),
			Self::Skipped => None,
		}
	}

	/// Returns `true` when the trigger collapsed into an in-flight refresh.
	pub fn is_skipped(&self) -> bool {
		matches!(self, Self::Skipped)
	}
}

/// Keeps exactly one authoritative access token fresh for one downstream identity.
///
/// Construct one per process, share it behind an [`Arc`], and hand it to both the scheduler
/// ([`spawn_refresh_loop`]) and whatever serves callers.
pub struct RefreshCoordinator<C>
where
	C: ?Sized + RefreshTransport,
{
	/// HTTP client used for every refresh request.
	pub http_client: Arc<C>,
	/// Append-only log of issued tokens.
	pub store: Arc<dyn TokenStore>,
	/// Endpoint, secrets, and cadence.
	pub config: RefreshConfig,
	/// Shared counters for refresh outcomes.
	pub metrics: Arc<RefreshMetrics>,
	expiry_decoder: ExpiryDecoder,
	in_flight: AsyncMutex<()>,
	next_refresh_at: RwLock<OffsetDateTime>,
}
impl<C> RefreshCoordinator<C>
where
	C: ?Sized + RefreshTransport,
{
	/// Creates a coordinator that reuses the caller-provided transport.
	///
	/// The schedule starts at the epoch; it is only meaningful after the first successful refresh.
	pub fn with_http_client(
		store: Arc<dyn TokenStore>,
		config: RefreshConfig,
		http_client: impl Into<Arc<C>>,
	) -> Self {
		Self {
			http_client: http_client.into(),
			store,
			config,
			metrics: Default::default(),
			expiry_decoder: token::decode_expiry,
			in_flight: AsyncMutex::new(()),
			next_refresh_at: RwLock::new(OffsetDateTime::UNIX_EPOCH),
		}
	}

	/// Replaces the JWT claim reader, e.g. for upstreams that issue opaque tokens.
	pub fn with_expiry_decoder(mut self, decoder: ExpiryDecoder) -> Self {
		self.expiry_decoder = decoder;

		self
	}

	/// Runs the refresh protocol as a manual trigger.
	pub async fn refresh(&self) -> Result<RefreshOutcome> {
		self.refresh_as(RefreshTrigger::Manual).await
	}

	/// Runs a manual refresh on its own task.
	///
	/// Dropping the returned handle (or the future awaiting it) does not cancel the refresh, so an
	/// exchange the upstream already accepted is always persisted.
	pub fn spawn_refresh(self: &Arc<Self>) -> JoinHandle<Result<RefreshOutcome>> {
		let coordinator = self.clone();

		tokio::spawn(async move { coordinator.refresh().await })
	}

	/// Runs the refresh protocol on behalf of `trigger`.
	pub async fn refresh_as(&self, trigger: RefreshTrigger) -> Result<RefreshOutcome> {
		self.run(trigger, OffsetDateTime::now_utc).await
	}

	/// Runs the refresh protocol as a manual trigger, stamping the record with `now`.
	pub async fn refresh_at(&self, now: OffsetDateTime) -> Result<RefreshOutcome> {
		self.run(RefreshTrigger::Manual, move || now).await
	}

	/// Returns the latest stored record, if any.
	pub async fn latest(&self) -> Result<Option<TokenRecord>> {
		Ok(self.store.latest().await?)
	}

	/// Returns the latest bearer verbatim, expired or not; `None` when nothing was issued yet.
	pub async fn current_token(&self) -> Result<Option<TokenSecret>> {
		Ok(self.latest().await?.map(|record| record.access_token))
	}

	/// Instant of the next scheduled automatic refresh.
	pub fn next_refresh_at(&self) -> OffsetDateTime {
		*self.next_refresh_at.read()
	}

	/// Composes the latest record with `now` and the schedule; `None` when nothing was issued yet.
	pub async fn status_at(&self, now: OffsetDateTime) -> Result<Option<StatusView>> {
		let latest = self.latest().await?;

		Ok(latest.map(|record| StatusView::compose(record, now, self.next_refresh_at())))
	}

	/// Convenience helper that computes the status using the current UTC instant.
	pub async fn status(&self) -> Result<Option<StatusView>> {
		self.status_at(OffsetDateTime::now_utc()).await
	}

	async fn run<F>(&self, trigger: RefreshTrigger, clock: F) -> Result<RefreshOutcome>
	where
		F: Send + FnOnce() -> OffsetDateTime,
	{
		let Some(_in_flight) = self.in_flight.try_lock() else {
			self.metrics.record_skipped();
			obs::record_refresh_outcome(trigger, FlowOutcome::Skipped);
			tracing::debug!(trigger = trigger.as_str(), "Refresh already in flight; trigger skipped.");

			return Ok(RefreshOutcome::Skipped);
		};
		let span = RefreshSpan::new(trigger);

		self.metrics.record_attempt();
		obs::record_refresh_outcome(trigger, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let result = self.exchange(clock).await;

				match &result {
					Ok(record) => tracing::info!(
						record_id = %record.id,
						expires_at = record.expires_at.unix_timestamp(),
						next_refresh_at = self.next_refresh_at().unix_timestamp(),
						"Access token refreshed."
					),
					Err(err) => tracing::warn!(error = %err, "Access token refresh failed."),
				}

				result
			})
			.await;

		match &result {
			Ok(_) => {
				self.metrics.record_success();
				obs::record_refresh_outcome(trigger, FlowOutcome::Success);
			},
			Err(_) => {
				self.metrics.record_failure();
				obs::record_refresh_outcome(trigger, FlowOutcome::Failure);
			},
		}

		result.map(RefreshOutcome::Refreshed)
	}

	async fn exchange<F>(&self, clock: F) -> Result<TokenRecord>
	where
		F: Send + FnOnce() -> OffsetDateTime,
	{
		let bearer = self.current_bearer().await?;
		let request = RefreshRequest {
			access_token: bearer.expose(),
			refresh_token: self.config.refresh_token.expose(),
		};
		let response = self.http_client.post_refresh(&self.config.endpoint, request).await?;
		let access_token = parse_response(response)?;
		let expires_at = self.expiry_or_unknown(&access_token);
		let issued_at = whole_seconds(clock());
		let record = self.store.insert(access_token, issued_at, expires_at).await?;

		*self.next_refresh_at.write() = issued_at + self.config.refresh_interval;

		Ok(record)
	}

	async fn current_bearer(&self) -> Result<TokenSecret> {
		if let Some(record) = self.store.latest().await? {
			return Ok(record.access_token);
		}

		match self.config.seed_access_token.as_ref() {
			Some(seed) => Ok(seed.clone()),
			None => {
				tracing::warn!("Store is empty and no seed access token is configured; sending an empty bearer.");

				Ok(TokenSecret::default())
			},
		}
	}

	fn expiry_or_unknown(&self, access_token: &TokenSecret) -> OffsetDateTime {
		match (self.expiry_decoder)(access_token.expose()) {
			Ok(Some(expires_at)) => expires_at,
			Ok(None) => {
				tracing::warn!("Access token carries no exp claim; recording an unknown expiry.");

				OffsetDateTime::UNIX_EPOCH
			},
			Err(err) => {
				tracing::warn!(error = %err, "Could not decode access token claims; recording an unknown expiry.");

				OffsetDateTime::UNIX_EPOCH
			},
		}
	}
}
#[cfg(feature = "reqwest")]
impl RefreshCoordinator<ReqwestHttpClient> {
	/// Creates a coordinator with its own reqwest transport honoring `config.request_timeout`.
	pub fn new(store: Arc<dyn TokenStore>, config: RefreshConfig) -> Result<Self> {
		let http_client = ReqwestHttpClient::with_timeout(config.request_timeout)?;

		Ok(Self::with_http_client(store, config, http_client))
	}
}
impl<C> Debug for RefreshCoordinator<C>
where
	C: ?Sized + RefreshTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RefreshCoordinator")
			.field("config", &self.config)
			.field("next_refresh_at", &self.next_refresh_at())
			.finish()
	}
}

#[derive(Deserialize)]
struct RefreshEnvelope {
	data: RefreshData,
}

#[derive(Deserialize)]
struct RefreshData {
	access_token: String,
}

fn parse_response(response: TransportResponse) -> Result<TokenSecret> {
	if !response.is_ok() {
		return Err(Error::RemoteRejected { status: response.status, body: response.body_text() });
	}

	let mut de = serde_json::Deserializer::from_slice(&response.body);
	let envelope: RefreshEnvelope =
		serde_path_to_error::deserialize(&mut de).map_err(ResponseError::from)?;

	if envelope.data.access_token.is_empty() {
		return Err(ResponseError::EmptyAccessToken.into());
	}

	Ok(TokenSecret::new(envelope.data.access_token))
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		refresh::fake::{self, Reply, ScriptedTransport},
		store::{MemoryStore, StoreError, StoreFuture},
		token::RecordId,
	};

	type TestCoordinator = RefreshCoordinator<ScriptedTransport>;

	fn at(secs: i64) -> OffsetDateTime {
		OffsetDateTime::from_unix_timestamp(secs).expect("Timestamp fixture should be valid.")
	}

	fn build(
		transport: ScriptedTransport,
	) -> (Arc<TestCoordinator>, Arc<ScriptedTransport>, Arc<MemoryStore>) {
		let transport = Arc::new(transport);
		let store = Arc::new(MemoryStore::default());
		let coordinator =
			RefreshCoordinator::with_http_client(store.clone(), fake::config(), transport.clone());

		(Arc::new(coordinator), transport, store)
	}

	struct FailingStore;
	impl TokenStore for FailingStore {
		fn insert(
			&self,
			_access_token: TokenSecret,
			_issued_at: OffsetDateTime,
			_expires_at: OffsetDateTime,
		) -> StoreFuture<'_, TokenRecord> {
			Box::pin(async { Err(StoreError::Backend { message: "disk full".into() }) })
		}

		fn latest(&self) -> StoreFuture<'_, Option<TokenRecord>> {
			Box::pin(async { Ok(None) })
		}
	}

	#[tokio::test]
	async fn overlapping_triggers_collapse_into_one_exchange() {
		let transport = ScriptedTransport::new(Reply::token(&fake::jwt_with_exp(1_700_003_600)))
			.with_delay(std::time::Duration::from_millis(50));
		let (coordinator, transport, store) = build(transport);
		let (a, b, c, d, e) = tokio::join!(
			coordinator.refresh(),
			coordinator.refresh(),
			coordinator.refresh_as(RefreshTrigger::Schedule),
			coordinator.refresh(),
			coordinator.refresh_as(RefreshTrigger::Schedule),
		);
		let outcomes = [a, b, c, d, e]
			.into_iter()
			.map(|outcome| outcome.expect("Overlapping triggers should not fail."))
			.collect::<Vec<_>>();

		assert_eq!(transport.calls(), 1);
		assert_eq!(outcomes.iter().filter(|outcome| outcome.is_skipped()).count(), 4);
		assert!(outcomes[0].record().is_some());
		assert_eq!(store.len(), 1);
		assert_eq!(coordinator.metrics.attempts(), 1);
		assert_eq!(coordinator.metrics.skipped(), 4);
	}

	#[tokio::test(start_paused = true)]
	async fn abandoned_caller_still_persists_the_exchange() {
		let transport = ScriptedTransport::new(Reply::token(&fake::jwt_with_exp(1_700_003_600)))
			.with_delay(std::time::Duration::from_millis(100));
		let (coordinator, transport, store) = build(transport);
		let abandoned =
			tokio::time::timeout(std::time::Duration::from_millis(20), coordinator.spawn_refresh())
				.await;

		assert!(abandoned.is_err());
		assert_eq!(transport.calls(), 1);

		tokio::time::sleep(std::time::Duration::from_millis(200)).await;

		assert_eq!(store.len(), 1);
		assert!(coordinator.next_refresh_at() > OffsetDateTime::UNIX_EPOCH);
		assert_eq!(coordinator.metrics.successes(), 1);
	}

	#[tokio::test]
	async fn spawned_refresh_reports_its_outcome() {
		let (coordinator, _, _) = build(ScriptedTransport::new(Reply::Status(503, "busy".into())));
		let err = coordinator
			.spawn_refresh()
			.await
			.expect("Refresh task should not panic.")
			.expect_err("HTTP 503 should fail.");

		assert!(matches!(err, Error::RemoteRejected { status: 503, .. }));
	}

	#[tokio::test]
	async fn success_advances_schedule_by_fixed_interval() {
		let token = fake::jwt_with_exp(1_700_086_400);
		let (coordinator, _, _) = build(ScriptedTransport::new(Reply::token(&token)));
		let record = coordinator
			.refresh_at(at(1_700_000_000))
			.await
			.expect("Refresh should succeed.")
			.into_record()
			.expect("Refresh should not be skipped.");

		assert_eq!(record.id, RecordId::FIRST);
		assert_eq!(record.issued_at, at(1_700_000_000));
		assert_eq!(record.expires_at, at(1_700_086_400));
		assert_eq!(coordinator.next_refresh_at(), at(1_700_000_000 + 55 * 60));
	}

	#[tokio::test]
	async fn failures_leave_store_and_schedule_untouched() {
		let transport = ScriptedTransport::new(Reply::Unreachable)
			.then(Reply::Status(500, "upstream down".into()))
			.then(Reply::token(&fake::jwt_with_exp(1_700_003_600)))
			.then(Reply::Unreachable)
			.then(Reply::Status(200, r#"{"data":{}}"#.into()))
			.then(Reply::Status(200, r#"{"data":{"access_token":""}}"#.into()));
		let (coordinator, _, store) = build(transport);
		let err = coordinator
			.refresh_at(at(1_699_990_000))
			.await
			.expect_err("Initial HTTP 500 should fail.");

		assert!(
			matches!(&err, Error::RemoteRejected { status: 500, body } if body == "upstream down")
		);
		assert!(store.is_empty());
		assert_eq!(coordinator.next_refresh_at(), OffsetDateTime::UNIX_EPOCH);

		coordinator.refresh_at(at(1_700_000_000)).await.expect("Second refresh should succeed.");

		let scheduled = coordinator.next_refresh_at();
		let err = coordinator.refresh_at(at(1_700_000_100)).await.expect_err("Network should fail.");

		assert!(matches!(err, Error::Network(_)));

		let err = coordinator.refresh_at(at(1_700_000_200)).await.expect_err("Missing token.");

		assert!(matches!(err, Error::MalformedResponse(ResponseError::Parse(_))));
		assert!(err.to_string().contains("data"));

		let err = coordinator.refresh_at(at(1_700_000_300)).await.expect_err("Empty token.");

		assert!(matches!(err, Error::MalformedResponse(ResponseError::EmptyAccessToken)));
		assert_eq!(coordinator.next_refresh_at(), scheduled);
		assert_eq!(store.len(), 1);
		assert_eq!(coordinator.metrics.failures(), 4);
		assert_eq!(coordinator.metrics.successes(), 1);
	}

	#[tokio::test]
	async fn bootstrap_presents_seed_then_latest_token() {
		let first = fake::jwt_with_exp(1_700_003_600);
		let second = fake::jwt_with_exp(1_700_007_200);
		let transport = ScriptedTransport::new(Reply::token(&second)).then(Reply::token(&first));
		let (coordinator, transport, _) = build(transport);

		assert!(coordinator.current_token().await.expect("Read should succeed.").is_none());

		coordinator.refresh().await.expect("Bootstrap refresh should succeed.");
		coordinator.refresh().await.expect("Follow-up refresh should succeed.");

		assert_eq!(transport.bearers(), vec![fake::SEED_TOKEN.to_owned(), first]);
		assert_eq!(
			coordinator.current_token().await.expect("Read should succeed.").map(|t| t.expose().to_owned()),
			Some(second)
		);
	}

	#[tokio::test]
	async fn undecodable_claims_store_unknown_expiry() {
		let (coordinator, _, _) = build(ScriptedTransport::new(Reply::token("opaque-token")));
		let record = coordinator
			.refresh_at(at(1_700_000_000))
			.await
			.expect("Opaque tokens should still be stored.")
			.into_record()
			.expect("Refresh should not be skipped.");

		assert_eq!(record.expires_at, OffsetDateTime::UNIX_EPOCH);
		assert_eq!(record.access_token.expose(), "opaque-token");

		for now in [at(0), at(1_700_000_000), at(4_000_000_000)] {
			let status = coordinator
				.status_at(now)
				.await
				.expect("Status read should succeed.")
				.expect("A record should exist.");

			assert!(status.is_expired);
			assert_eq!(status.expires_in_seconds, 0);
		}
	}

	#[tokio::test]
	async fn custom_expiry_decoder_feeds_status() {
		fn fixed(_: &str) -> Result<Option<OffsetDateTime>, ClaimsError> {
			Ok(OffsetDateTime::from_unix_timestamp(1_700_000_055).ok())
		}

		let (coordinator, _, _) = build(ScriptedTransport::new(Reply::token("tok123")));
		let coordinator = Arc::try_unwrap(coordinator)
			.expect("Coordinator should not be shared yet.")
			.with_expiry_decoder(fixed);

		assert!(coordinator.status_at(at(1_700_000_000)).await.expect("Read.").is_none());

		coordinator.refresh_at(at(1_700_000_000)).await.expect("Refresh should succeed.");

		let status = coordinator
			.status_at(at(1_700_000_000))
			.await
			.expect("Status read should succeed.")
			.expect("A record should exist.");

		assert!(!status.is_expired);
		assert_eq!(status.expires_in_seconds, 55);
		assert_eq!(status.next_refresh_at, at(1_700_003_300));
	}

	#[tokio::test]
	async fn storage_failure_is_reported_and_lock_released() {
		let transport = Arc::new(ScriptedTransport::new(Reply::token("opaque")));
		let coordinator: TestCoordinator = RefreshCoordinator::with_http_client(
			Arc::new(FailingStore),
			fake::config(),
			transport.clone(),
		);
		let err = coordinator.refresh().await.expect_err("Storage failure should surface.");

		assert!(matches!(err, Error::Storage(StoreError::Backend { .. })));
		assert_eq!(coordinator.next_refresh_at(), OffsetDateTime::UNIX_EPOCH);

		let err = coordinator.refresh().await.expect_err("The next attempt should run again.");

		assert!(matches!(err, Error::Storage(_)));
		assert_eq!(transport.calls(), 2);
	}

	#[test]
	fn parse_response_extracts_nested_token() {
		let token = parse_response(TransportResponse {
			status: 200,
			body: br#"{"status":"ok","data":{"access_token":"tok123","extra":1}}"#.to_vec(),
		})
		.expect("Well-formed response should parse.");

		assert_eq!(token.expose(), "tok123");

		let err = parse_response(TransportResponse { status: 200, body: b"<html>".to_vec() })
			.expect_err("Non-JSON body should be rejected.");

		assert!(matches!(err, Error::MalformedResponse(_)));
	}
}
