//! Append-only storage contract and built-in store implementations for issued tokens.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{
	_prelude::*,
	token::{TokenRecord, TokenSecret},
};

/// Boxed future returned by [`TokenStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Durable, ordered log of every token the relay has issued.
///
/// Implementations must serialize [`insert`](TokenStore::insert) calls so sequence assignment
/// stays monotonic, and must let [`latest`](TokenStore::latest) run concurrently with writers
/// without waiting on storage I/O.
pub trait TokenStore
where
	Self: Send + Sync,
{
	/// Appends a record and returns it with its freshly assigned [`RecordId`](crate::token::RecordId).
	fn insert(
		&self,
		access_token: TokenSecret,
		issued_at: OffsetDateTime,
		expires_at: OffsetDateTime,
	) -> StoreFuture<'_, TokenRecord>;

	/// Returns the record with the highest sequence, or `None` when nothing was stored yet.
	fn latest(&self) -> StoreFuture<'_, Option<TokenRecord>>;
}

/// Error type produced by [`TokenStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend, including corrupt log entries.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}
