use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{StateField, StateStore, StoreProvider};
use crate::error::StoreError;
use crate::state::{OwnerKey, SessionState};

type Records = Arc<Mutex<HashMap<OwnerKey, BTreeMap<StateField, String>>>>;

/// In-process storage. Records outlive the owners that wrote them.
#[derive(Debug, Clone, Default)]
pub struct MemoryStoreProvider {
	records: Records,
}

impl MemoryStoreProvider {
	pub fn new() -> Self {
		Self::default()
	}

	/// Stored state for `key`, if anything was written.
	pub fn snapshot(&self, key: &OwnerKey) -> Option<SessionState> {
		let records = self.records.lock();
		let fields = records.get(key)?;
		let mut state = SessionState::default();
		for (field, value) in fields {
			*field.slot(&mut state) = Some(value.clone());
		}
		Some(state)
	}

	/// Number of owners with stored state.
	pub fn len(&self) -> usize {
		self.records.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

impl StoreProvider for MemoryStoreProvider {
	fn open(&self, key: &OwnerKey) -> Result<Arc<dyn StateStore>, StoreError> {
		Ok(Arc::new(MemoryStore {
			key: key.clone(),
			records: Arc::clone(&self.records),
		}))
	}
}

struct MemoryStore {
	key: OwnerKey,
	records: Records,
}

#[async_trait]
impl StateStore for MemoryStore {
	async fn get(&self, field: StateField) -> Result<Option<String>, StoreError> {
		Ok(self.records.lock().get(&self.key).and_then(|fields| fields.get(&field).cloned()))
	}

	async fn put(&self, field: StateField, value: &str) -> Result<(), StoreError> {
		self.records.lock().entry(self.key.clone()).or_default().insert(field, value.to_owned());
		Ok(())
	}

	async fn clear(&self) -> Result<(), StoreError> {
		self.records.lock().remove(&self.key);
		Ok(())
	}
}
