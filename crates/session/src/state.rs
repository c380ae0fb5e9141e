use std::fmt;

use beacon_ids::decode;
use serde::{Deserialize, Serialize};

use crate::fingerprint::FINGERPRINT_LEN;

/// The persisted identifier triple of one visitor.
///
/// Any field may be absent; a partially written triple is still a valid state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionState {
	#[serde(rename = "clientID")]
	pub client_id: Option<String>,
	#[serde(rename = "sessionID")]
	pub session_id: Option<String>,
	#[serde(rename = "lastEventID")]
	pub last_event_id: Option<String>,
}

impl SessionState {
	pub fn new(client_id: impl Into<String>, session_id: impl Into<String>, last_event_id: impl Into<String>) -> Self {
		Self {
			client_id: Some(client_id.into()),
			session_id: Some(session_id.into()),
			last_event_id: Some(last_event_id.into()),
		}
	}

	pub fn is_empty(&self) -> bool {
		self.client_id.is_none() && self.session_id.is_none() && self.last_event_id.is_none()
	}

	/// Creation time of the client id, `None` when absent or malformed.
	pub fn client_time(&self) -> Option<u64> {
		id_time(self.client_id.as_deref())
	}

	pub fn session_time(&self) -> Option<u64> {
		id_time(self.session_id.as_deref())
	}

	pub fn last_event_time(&self) -> Option<u64> {
		id_time(self.last_event_id.as_deref())
	}
}

/// Embedded time of an identifier; malformed ids read as "no time".
pub(crate) fn id_time(id: Option<&str>) -> Option<u64> {
	id.and_then(|id| decode(id).ok()).map(|decoded| decoded.time_ms)
}

/// Name of one state owner: a client id, or a stable fingerprint key for
/// visitors that have none yet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerKey(String);

impl OwnerKey {
	pub fn new(key: impl Into<String>) -> Self {
		Self(key.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	/// Stable keys are exactly [`FINGERPRINT_LEN`] characters; minted client
	/// ids are always longer.
	pub fn is_fingerprint_derived(&self) -> bool {
		self.0.len() == FINGERPRINT_LEN
	}
}

impl fmt::Display for OwnerKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}
