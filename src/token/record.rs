//! Immutable token records as persisted by the store.

// self
use crate::{_prelude::*, token::TokenSecret};

/// Monotonically increasing sequence assigned by the store at insert time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(u64);
impl RecordId {
	/// First identifier handed out by an empty store.
	pub const FIRST: Self = Self(1);

	/// Wraps a raw sequence value.
	pub const fn new(value: u64) -> Self {
		Self(value)
	}

	/// Returns the raw sequence value.
	pub const fn get(self) -> u64 {
		self.0
	}

	/// Returns the identifier that follows this one.
	pub const fn next(self) -> Self {
		Self(self.0 + 1)
	}
}
impl Display for RecordId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		Display::fmt(&self.0, f)
	}
}

/// Immutable record describing one issued access token.
///
/// Records are append-only: once the store hands one out it is never updated or deleted. The
/// latest token is always the record with the highest [`RecordId`].
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
	/// Sequence assigned at insert time.
	pub id: RecordId,
	/// Bearer value exactly as returned by the upstream authority.
	pub access_token: TokenSecret,
	/// Local instant at which the record was created, in whole seconds.
	#[serde(with = "time::serde::timestamp")]
	pub issued_at: OffsetDateTime,
	/// Expiry taken from the token's own claims; [`OffsetDateTime::UNIX_EPOCH`] when unknown.
	#[serde(with = "time::serde::timestamp")]
	pub expires_at: OffsetDateTime,
}
impl TokenRecord {
	/// Returns `true` when the expiry could be read from the token's claims.
	pub fn expiry_known(&self) -> bool {
		self.expires_at != OffsetDateTime::UNIX_EPOCH
	}

	/// Returns `true` if the record has expired at the provided instant.
	///
	/// Records with an unknown expiry are always treated as expired.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		instant >= self.expires_at
	}

	/// Time left before expiry at `instant`, clamped to zero.
	pub fn expires_in_at(&self, instant: OffsetDateTime) -> Duration {
		let remaining = self.expires_at - instant;

		if remaining.is_negative() { Duration::ZERO } else { remaining }
	}
}
impl Debug for TokenRecord {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenRecord")
			.field("id", &self.id)
			.field("access_token", &"<redacted>")
			.field("issued_at", &self.issued_at)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

/// Drops the sub-second part so in-memory and on-disk instants compare equal.
pub(crate) fn whole_seconds(instant: OffsetDateTime) -> OffsetDateTime {
	instant - Duration::nanoseconds(i64::from(instant.nanosecond()))
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	fn record(expires_at: OffsetDateTime) -> TokenRecord {
		TokenRecord {
			id: RecordId::FIRST,
			access_token: TokenSecret::new("access"),
			issued_at: macros::datetime!(2025-01-01 00:00 UTC),
			expires_at,
		}
	}

	#[test]
	fn expiry_boundary_counts_as_expired() {
		let expires = macros::datetime!(2025-01-01 01:00 UTC);
		let record = record(expires);

		assert!(!record.is_expired_at(macros::datetime!(2025-01-01 00:59:59 UTC)));
		assert!(record.is_expired_at(expires));
		assert!(record.is_expired_at(macros::datetime!(2025-01-01 01:00:01 UTC)));
		assert_eq!(record.expires_in_at(macros::datetime!(2025-01-01 00:59 UTC)), Duration::minutes(1));
		assert_eq!(record.expires_in_at(macros::datetime!(2025-01-01 02:00 UTC)), Duration::ZERO);
	}

	#[test]
	fn unknown_expiry_is_always_expired() {
		let record = record(OffsetDateTime::UNIX_EPOCH);

		assert!(!record.expiry_known());
		assert!(record.is_expired_at(OffsetDateTime::UNIX_EPOCH));
		assert!(record.is_expired_at(macros::datetime!(2025-01-01 00:00 UTC)));
	}

	#[test]
	fn record_serializes_unix_seconds() {
		let record = record(macros::datetime!(2023-11-14 22:14:15 UTC));
		let payload = serde_json::to_value(&record).expect("TokenRecord should serialize.");

		assert_eq!(payload["id"], 1);
		assert_eq!(payload["access_token"], "access");
		assert_eq!(payload["issued_at"], 1_735_689_600);
		assert_eq!(payload["expires_at"], 1_700_000_055);
	}

	#[test]
	fn whole_seconds_truncates_fraction() {
		let instant = macros::datetime!(2025-01-01 00:00:05.750 UTC);

		assert_eq!(whole_seconds(instant), macros::datetime!(2025-01-01 00:00:05 UTC));
		assert_eq!(RecordId::FIRST.next(), RecordId::new(2));
	}
}
