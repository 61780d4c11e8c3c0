//! Append-only JSON Lines [`TokenStore`] that survives process restarts.

// std
use std::{
	fs::{self, File, OpenOptions},
	io::{self, Write},
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	store::{StoreError, StoreFuture, TokenStore},
	token::{RecordId, TokenRecord, TokenSecret},
};

/// Persists every record as one JSON line and caches the latest record in memory.
///
/// Appends are serialized by a writer lock and flushed before the in-memory view advances, so a
/// record returned by [`TokenStore::insert`] is durable. Readers only touch the cached latest
/// record and never wait on file I/O.
#[derive(Debug)]
pub struct FileStore {
	path: PathBuf,
	writer: Mutex<LogWriter>,
	latest: RwLock<Option<TokenRecord>>,
}
impl FileStore {
	/// Opens (or creates) the log at the provided path, replaying existing entries.
	///
	/// A trailing entry without a newline is the remnant of an interrupted append; it is dropped
	/// and the file truncated. Any other unreadable entry fails the open.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		Self::ensure_parent_exists(&path)?;

		let replay = Self::replay(&path)?;
		let file = OpenOptions::new().create(true).append(true).open(&path).map_err(|e| {
			StoreError::Backend { message: format!("Failed to open {}: {e}", path.display()) }
		})?;

		if replay.torn {
			tracing::warn!(
				path = %path.display(),
				valid_len = replay.valid_len,
				"Dropping torn trailing entry from token log."
			);

			file.set_len(replay.valid_len).map_err(|e| StoreError::Backend {
				message: format!("Failed to truncate {}: {e}", path.display()),
			})?;
		}

		let next_id = replay.latest.as_ref().map_or(RecordId::FIRST, |record| record.id.next());
		let writer = LogWriter { file, len: replay.valid_len, next_id, poisoned: false };

		Ok(Self { path, writer: Mutex::new(writer), latest: RwLock::new(replay.latest) })
	}

	/// Location of the backing log file.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn replay(path: &Path) -> Result<Replay, StoreError> {
		let mut replay = Replay::default();

		if !path.exists() {
			return Ok(replay);
		}

		let bytes = fs::read(path).map_err(|e| StoreError::Backend {
			message: format!("Failed to read {}: {e}", path.display()),
		})?;
		let mut offset = 0;
		let mut line_no = 0;

		while offset < bytes.len() {
			let rest = &bytes[offset..];
			let Some(end) = rest.iter().position(|b| *b == b'\n') else {
				replay.torn = true;

				break;
			};
			let line = &rest[..end];

			line_no += 1;
			offset += end + 1;

			if line.iter().all(u8::is_ascii_whitespace) {
				replay.valid_len = offset as u64;

				continue;
			}

			let record: TokenRecord =
				serde_json::from_slice(line).map_err(|e| StoreError::Serialization {
					message: format!("Failed to parse {} line {line_no}: {e}", path.display()),
				})?;

			if let Some(previous) = replay.latest.as_ref().filter(|prev| record.id <= prev.id) {
				return Err(StoreError::Serialization {
					message: format!(
						"{} line {line_no} has id {} after id {}",
						path.display(),
						record.id,
						previous.id
					),
				});
			}

			replay.latest = Some(record);
			replay.valid_len = offset as u64;
		}

		Ok(replay)
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
				message: format!("Failed to create store directory {}: {e}", parent.display()),
			})?;
		}

		Ok(())
	}

	fn insert_now(
		&self,
		access_token: TokenSecret,
		issued_at: OffsetDateTime,
		expires_at: OffsetDateTime,
	) -> Result<TokenRecord, StoreError> {
		let mut writer = self.writer.lock();

		if writer.poisoned {
			return Err(StoreError::Backend {
				message: format!(
					"{} may hold a partial entry; reopen the store before appending",
					self.path.display()
				),
			});
		}

		let record = TokenRecord { id: writer.next_id, access_token, issued_at, expires_at };
		let mut line = serde_json::to_vec(&record).map_err(|e| StoreError::Serialization {
			message: format!("Failed to serialize record {}: {e}", record.id),
		})?;

		line.push(b'\n');

		if let Err(e) = writer.append(&line) {
			// Drop whatever part of the line reached the file so the next append starts clean.
			if let Err(rollback) = writer.file.set_len(writer.len) {
				writer.poisoned = true;

				tracing::error!(
					path = %self.path.display(),
					error = %rollback,
					"Failed to roll back a partial append; refusing further writes until reopen."
				);

				return Err(StoreError::Backend {
					message: format!(
						"Failed to append to {}: {e}; rollback also failed: {rollback}",
						self.path.display()
					),
				});
			}

			return Err(StoreError::Backend {
				message: format!("Failed to append to {}: {e}", self.path.display()),
			});
		}

		writer.len += line.len() as u64;
		writer.next_id = record.id.next();
		*self.latest.write() = Some(record.clone());

		Ok(record)
	}
}
impl TokenStore for FileStore {
	fn insert(
		&self,
		access_token: TokenSecret,
		issued_at: OffsetDateTime,
		expires_at: OffsetDateTime,
	) -> StoreFuture<'_, TokenRecord> {
		Box::pin(async move { self.insert_now(access_token, issued_at, expires_at) })
	}

	fn latest(&self) -> StoreFuture<'_, Option<TokenRecord>> {
		Box::pin(async move { Ok(self.latest.read().clone()) })
	}
}

#[derive(Debug)]
struct LogWriter {
	file: File,
	len: u64,
	next_id: RecordId,
	// Set when a failed append could not be rolled back.
	poisoned: bool,
}
impl LogWriter {
	fn append(&mut self, line: &[u8]) -> io::Result<()> {
		self.file.write_all(line)?;
		self.file.sync_data()
	}
}

#[derive(Debug, Default)]
struct Replay {
	latest: Option<TokenRecord>,
	valid_len: u64,
	torn: bool,
}
