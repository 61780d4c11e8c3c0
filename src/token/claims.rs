//! Unverified JWT claim decoding used to learn a token's expiry.
//!
//! The relay never validates signatures: the upstream authority is the only party that accepts
//! these tokens, so the claims are read purely for status reporting.

// crates.io
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
// self
use crate::_prelude::*;

/// Reasons the embedded claims could not be read.
///
/// None of these are fatal to a refresh; the record is stored with an unknown expiry instead.
#[derive(Debug, ThisError)]
pub enum ClaimsError {
	/// The token does not have the `header.payload.signature` shape.
	#[error("Token has {segments} dot-separated segments; expected 3.")]
	Malformed {
		/// Number of segments found.
		segments: usize,
	},
	/// The payload segment is not URL-safe base64.
	#[error("Token payload is not valid base64url.")]
	Base64(#[from] base64::DecodeError),
	/// The payload is not a JSON object.
	#[error("Token payload is not a JSON object.")]
	Payload(#[from] serde_json::Error),
	/// The `exp` claim is not a representable unix timestamp.
	#[error("The exp claim {exp} is out of range.")]
	ExpiryOutOfRange {
		/// Raw claim value.
		exp: i64,
	},
}

/// Registered claims the relay cares about.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Claims {
	/// Expiry as seconds since the epoch; some issuers emit floats.
	#[serde(default)]
	pub exp: Option<serde_json::Number>,
}
impl Claims {
	/// Decodes the payload segment of `token` without verifying the signature.
	pub fn decode(token: &str) -> Result<Self, ClaimsError> {
		let segments = token.split('.').collect::<Vec<_>>();

		if segments.len() != 3 {
			return Err(ClaimsError::Malformed { segments: segments.len() });
		}

		let payload = URL_SAFE_NO_PAD.decode(segments[1].trim_end_matches('='))?;
		let object: serde_json::Map<String, serde_json::Value> = serde_json::from_slice(&payload)?;

		Ok(serde_json::from_value(serde_json::Value::Object(object))?)
	}

	/// Returns the expiry instant, or `None` when the token carries no `exp` claim.
	pub fn expires_at(&self) -> Result<Option<OffsetDateTime>, ClaimsError> {
		let Some(raw) = self.exp.as_ref() else {
			return Ok(None);
		};
		let exp = match raw.as_i64() {
			Some(secs) => secs,
			None => match raw.as_f64().filter(|secs| secs.is_finite()) {
				Some(secs) if (i64::MIN as f64..=i64::MAX as f64).contains(&secs) => secs as i64,
				_ => return Err(ClaimsError::ExpiryOutOfRange { exp: i64::MAX }),
			},
		};

		OffsetDateTime::from_unix_timestamp(exp)
			.map(Some)
			.map_err(|_| ClaimsError::ExpiryOutOfRange { exp })
	}
}

/// Reads the `exp` claim of `token`.
pub fn decode_expiry(token: &str) -> Result<Option<OffsetDateTime>, ClaimsError> {
	Claims::decode(token)?.expires_at()
}
