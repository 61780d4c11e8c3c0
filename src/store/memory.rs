//! Thread-safe in-memory [`TokenStore`] implementation for local development and tests.

// self
use crate::{
	_prelude::*,
	store::{StoreError, StoreFuture, TokenStore},
	token::{RecordId, TokenRecord, TokenSecret},
};

type StoreLog = Arc<RwLock<Vec<TokenRecord>>>;

/// Storage backend that keeps the token log in-process; nothing survives a restart.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(StoreLog);
impl MemoryStore {
	/// Returns every stored record in insertion order.
	pub fn records(&self) -> Vec<TokenRecord> {
		self.0.read().clone()
	}

	/// Number of stored records.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Returns `true` when nothing was stored yet.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}

	fn insert_now(
		log: StoreLog,
		access_token: TokenSecret,
		issued_at: OffsetDateTime,
		expires_at: OffsetDateTime,
	) -> Result<TokenRecord, StoreError> {
		let mut guard = log.write();
		let id = guard.last().map_or(RecordId::FIRST, |last| last.id.next());
		let record = TokenRecord { id, access_token, issued_at, expires_at };

		guard.push(record.clone());

		Ok(record)
	}

	fn latest_now(log: StoreLog) -> Option<TokenRecord> {
		log.read().last().cloned()
	}
}
impl TokenStore for MemoryStore {
	fn insert(
		&self,
		access_token: TokenSecret,
		issued_at: OffsetDateTime,
		expires_at: OffsetDateTime,
	) -> StoreFuture<'_, TokenRecord> {
		let log = self.0.clone();

		Box::pin(async move { Self::insert_now(log, access_token, issued_at, expires_at) })
	}

	fn latest(&self) -> StoreFuture<'_, Option<TokenRecord>> {
		let log = self.0.clone();

		Box::pin(async move { Ok(Self::latest_now(log)) })
	}
}
