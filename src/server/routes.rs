//! Request handlers and their JSON bodies.

// crates.io
use axum::{
	Json,
	extract::State,
	http::StatusCode,
	response::{IntoResponse, Response},
};
use time::{UtcOffset, format_description::well_known::Rfc3339};
// self
use crate::{
	_prelude::*,
	refresh::RefreshOutcome,
	server::AppState,
	token::{RecordId, StatusView},
};

/// Body of `GET /token`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBody {
	/// Latest stored bearer, returned even when expired.
	pub access_token: String,
}

/// Body of `POST /refresh`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RefreshBody {
	/// This request ran the refresh and persisted a new record.
	Refreshed {
		/// Identifier of the new record.
		record_id: RecordId,
		/// Issue instant, RFC 3339 in the display offset.
		issued_at: String,
		/// Expiry instant, RFC 3339 in the display offset; the epoch when unknown.
		expiry: String,
	},
	/// Another refresh was in flight, so this request did nothing.
	AlreadyRunning,
}

/// Body of `GET /status`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusBody {
	/// Latest stored bearer.
	pub access_token: String,
	/// Issue instant of the latest record.
	pub issued_at: String,
	/// Expiry instant of the latest record.
	pub expiry: String,
	/// Instant the status was computed at.
	pub now: String,
	/// Whether `now` is at or past the expiry.
	pub is_expired: bool,
	/// Whole seconds until expiry, never negative.
	pub expires_in_seconds: i64,
	/// Instant of the next scheduled refresh.
	pub next_refresh: String,
}
impl StatusBody {
	/// Renders `view` with every timestamp shifted into `offset`.
	pub fn render(view: &StatusView, offset: UtcOffset) -> Result<Self, ApiError> {
		Ok(Self {
			access_token: view.record.access_token.expose().to_owned(),
			issued_at: rfc3339(view.issued_at(), offset)?,
			expiry: rfc3339(view.expires_at(), offset)?,
			now: rfc3339(view.now, offset)?,
			is_expired: view.is_expired,
			expires_in_seconds: view.expires_in_seconds,
			next_refresh: rfc3339(view.next_refresh_at, offset)?,
		})
	}
}

/// Error body `{"detail": "..."}` paired with an HTTP status.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiError {
	/// Response status.
	pub status: StatusCode,
	/// Human-readable message placed in the `detail` field.
	pub detail: String,
}
impl ApiError {
	/// `401 Invalid API key`.
	pub fn unauthorized() -> Self {
		Self { status: StatusCode::UNAUTHORIZED, detail: "Invalid API key".into() }
	}

	/// `404 No token found.`
	pub fn no_token() -> Self {
		Self { status: StatusCode::NOT_FOUND, detail: "No token found.".into() }
	}

	/// `500` with the provided message.
	pub fn internal(detail: impl Into<String>) -> Self {
		Self { status: StatusCode::INTERNAL_SERVER_ERROR, detail: detail.into() }
	}
}
impl From<Error> for ApiError {
	fn from(err: Error) -> Self {
		let status = match &err {
			Error::Network(_) | Error::RemoteRejected { .. } | Error::MalformedResponse(_) =>
				StatusCode::BAD_GATEWAY,
			Error::Storage(_) | Error::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
		};

		Self { status, detail: err.to_string() }
	}
}
impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		(self.status, Json(serde_json::json!({ "detail": self.detail }))).into_response()
	}
}

/// `GET /token`: the latest bearer, or `404` before the first successful refresh.
pub async fn token(State(state): State<AppState>) -> Result<Json<TokenBody>, ApiError> {
	let token = state.coordinator.current_token().await?.ok_or_else(ApiError::no_token)?;

	Ok(Json(TokenBody { access_token: token.expose().to_owned() }))
}

/// `POST /refresh`: runs the refresh protocol unless one is already in flight.
///
/// The refresh runs on its own task and completes even if the client disconnects.
pub async fn refresh(State(state): State<AppState>) -> Result<Json<RefreshBody>, ApiError> {
	let outcome = state
		.coordinator
		.spawn_refresh()
		.await
		.map_err(|e| ApiError::internal(format!("Refresh task did not complete: {e}")))??;
	let body = match outcome {
		RefreshOutcome::Refreshed(record) => RefreshBody::Refreshed {
			record_id: record.id,
			issued_at: rfc3339(record.issued_at, state.display_offset)?,
			expiry: rfc3339(record.expires_at, state.display_offset)?,
		},
		RefreshOutcome::Skipped => RefreshBody::AlreadyRunning,
	};

	Ok(Json(body))
}

/// `GET /status`: the latest record composed with the current instant and the schedule.
pub async fn status(State(state): State<AppState>) -> Result<Json<StatusBody>, ApiError> {
	let view = state.coordinator.status().await?.ok_or_else(ApiError::no_token)?;

	Ok(Json(StatusBody::render(&view, state.display_offset)?))
}

fn rfc3339(instant: OffsetDateTime, offset: UtcOffset) -> Result<String, ApiError> {
	instant
		.checked_to_offset(offset)
		.ok_or_else(|| ApiError::internal(format!("Timestamp {instant} cannot be shifted to {offset}.")))?
		.format(&Rfc3339)
		.map_err(|e| ApiError::internal(format!("Failed to render timestamp {instant}: {e}")))
}
