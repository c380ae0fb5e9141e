use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use beacon_ids::{hash_to_alphabet, is_alphabet_char};
use serde_json::Value;

use super::{StateField, StateStore, StoreProvider};
use crate::error::StoreError;
use crate::state::{OwnerKey, SessionState};

/// One JSON document per owner under a directory.
#[derive(Debug, Clone)]
pub struct FileStoreProvider {
	dir: PathBuf,
}

impl FileStoreProvider {
	/// Uses `dir`, creating it if needed.
	pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let dir = dir.into();
		std::fs::create_dir_all(&dir).map_err(|error| StoreError::io(&dir, error))?;
		Ok(Self { dir })
	}

	pub fn dir(&self) -> &Path {
		&self.dir
	}

	/// Path of the document holding `key`'s state.
	pub fn path_for(&self, key: &OwnerKey) -> PathBuf {
		self.dir.join(format!("{}.json", file_stem(key)))
	}
}

/// Marks hashed file names. Never a character of a safe key.
const HASHED_PREFIX: char = '@';

/// Keys are visitor-supplied; anything outside the id character set is hashed.
fn file_stem(key: &OwnerKey) -> String {
	let raw = key.as_str();
	let safe = !raw.is_empty() && raw.len() <= 64 && raw.chars().all(|ch| is_alphabet_char(ch) || ch == '-');
	if safe {
		raw.to_owned()
	} else {
		format!("{HASHED_PREFIX}{}", hash_to_alphabet(&Value::String(raw.to_owned()), 16))
	}
}

impl StoreProvider for FileStoreProvider {
	fn open(&self, key: &OwnerKey) -> Result<Arc<dyn StateStore>, StoreError> {
		Ok(Arc::new(FileStore { path: self.path_for(key) }))
	}
}

struct FileStore {
	path: PathBuf,
}

impl FileStore {
	async fn read(&self) -> Result<SessionState, StoreError> {
		match tokio::fs::read(&self.path).await {
			Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
			Err(error) if error.kind() == ErrorKind::NotFound => Ok(SessionState::default()),
			Err(error) => Err(StoreError::io(&self.path, error)),
		}
	}

	/// Replaces the document atomically via a sibling temp file.
	async fn write(&self, state: &SessionState) -> Result<(), StoreError> {
		let bytes = serde_json::to_vec_pretty(state)?;
		let tmp = self.path.with_extension("json.tmp");
		tokio::fs::write(&tmp, bytes).await.map_err(|error| StoreError::io(&tmp, error))?;
		tokio::fs::rename(&tmp, &self.path).await.map_err(|error| StoreError::io(&self.path, error))
	}
}

#[async_trait]
impl StateStore for FileStore {
	async fn get(&self, field: StateField) -> Result<Option<String>, StoreError> {
		let mut state = self.read().await?;
		Ok(field.slot(&mut state).take())
	}

	async fn put(&self, field: StateField, value: &str) -> Result<(), StoreError> {
		let mut state = self.read().await?;
		*field.slot(&mut state) = Some(value.to_owned());
		self.write(&state).await
	}

	async fn clear(&self) -> Result<(), StoreError> {
		match tokio::fs::remove_file(&self.path).await {
			Err(error) if error.kind() != ErrorKind::NotFound => Err(StoreError::io(&self.path, error)),
			_ => Ok(()),
		}
	}

	async fn load(&self) -> Result<SessionState, StoreError> {
		self.read().await
	}

	async fn save(&self, state: &SessionState) -> Result<(), StoreError> {
		let mut merged = self.read().await?;
		for field in StateField::ALL {
			let mut incoming = state.clone();
			if let Some(value) = field.slot(&mut incoming).take() {
				*field.slot(&mut merged) = Some(value);
			}
		}
		self.write(&merged).await
	}
}
