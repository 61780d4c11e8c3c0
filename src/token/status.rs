//! Point-in-time status composed from the latest record and the refresh schedule.

// self
use crate::{
	_prelude::*,
	token::{TokenRecord, record::whole_seconds},
};

/// Snapshot describing the latest token relative to a caller-supplied `now`.
///
/// All instants are absolute; rendering them in a particular timezone is left to the presentation
/// layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusView {
	/// Latest record the view was computed from.
	pub record: TokenRecord,
	/// Instant the view was computed for.
	pub now: OffsetDateTime,
	/// `true` iff `now >= record.expires_at`; unknown expiries always report expired.
	pub is_expired: bool,
	/// Whole seconds left before expiry, never negative.
	pub expires_in_seconds: i64,
	/// Next scheduled automatic refresh; the epoch until the first successful refresh.
	pub next_refresh_at: OffsetDateTime,
}
impl StatusView {
	/// Composes a view from the latest record, `now`, and the coordinator's schedule.
	///
	/// `now` is truncated to whole seconds, the resolution records are stored at.
	pub fn compose(record: TokenRecord, now: OffsetDateTime, next_refresh_at: OffsetDateTime) -> Self {
		let now = whole_seconds(now);
		let is_expired = record.is_expired_at(now);
		let expires_in_seconds = record.expires_in_at(now).whole_seconds();

		Self { record, now, is_expired, expires_in_seconds, next_refresh_at }
	}

	/// Issued-at instant of the latest record.
	pub fn issued_at(&self) -> OffsetDateTime {
		self.record.issued_at
	}

	/// Expiry instant of the latest record.
	pub fn expires_at(&self) -> OffsetDateTime {
		self.record.expires_at
	}
}
