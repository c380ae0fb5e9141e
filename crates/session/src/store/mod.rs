//! Durable per-owner storage of the identifier triple.

mod file;
mod memory;

use std::sync::Arc;

use async_trait::async_trait;

pub use self::file::FileStoreProvider;
pub use self::memory::MemoryStoreProvider;
use crate::error::StoreError;
use crate::state::{OwnerKey, SessionState};

/// One persisted field of [`SessionState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StateField {
	ClientId,
	SessionId,
	LastEventId,
}

impl StateField {
	pub const ALL: [Self; 3] = [Self::ClientId, Self::SessionId, Self::LastEventId];

	/// Storage key name. Stable across releases.
	pub const fn key(self) -> &'static str {
		match self {
			Self::ClientId => "clientID",
			Self::SessionId => "sessionID",
			Self::LastEventId => "lastEventID",
		}
	}

	pub(crate) fn slot(self, state: &mut SessionState) -> &mut Option<String> {
		match self {
			Self::ClientId => &mut state.client_id,
			Self::SessionId => &mut state.session_id,
			Self::LastEventId => &mut state.last_event_id,
		}
	}
}

/// Key-value storage scoped to a single owner.
#[async_trait]
pub trait StateStore: Send + Sync {
	async fn get(&self, field: StateField) -> Result<Option<String>, StoreError>;

	async fn put(&self, field: StateField, value: &str) -> Result<(), StoreError>;

	/// Deletes everything stored for this owner.
	async fn clear(&self) -> Result<(), StoreError>;

	async fn load(&self) -> Result<SessionState, StoreError> {
		let mut state = SessionState::default();
		for field in StateField::ALL {
			*field.slot(&mut state) = self.get(field).await?;
		}
		Ok(state)
	}

	/// Writes every present field; absent fields are left untouched.
	async fn save(&self, state: &SessionState) -> Result<(), StoreError> {
		let mut state = state.clone();
		for field in StateField::ALL {
			if let Some(value) = field.slot(&mut state).take() {
				self.put(field, &value).await?;
			}
		}
		Ok(())
	}
}

/// Opens the store for an owner key.
pub trait StoreProvider: Send + Sync {
	fn open(&self, key: &OwnerKey) -> Result<Arc<dyn StateStore>, StoreError>;
}
