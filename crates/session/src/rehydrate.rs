use serde::{Deserialize, Serialize};

use crate::state::SessionState;

/// Identifier values carried by the request itself (signed cookies).
///
/// Used to route to an existing owner and to rebuild state that was
/// garbage-collected while the visitor kept their cookies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CookieIds {
	#[serde(rename = "clientID")]
	pub client_id: Option<String>,
	#[serde(rename = "sessionID")]
	pub session_id: Option<String>,
	#[serde(rename = "lastEventID")]
	pub last_event_id: Option<String>,
	pub fingerprint: Option<String>,
}

impl CookieIds {
	/// Client id, if present and non-empty.
	pub fn client_id(&self) -> Option<&str> {
		non_empty(self.client_id.as_deref())
	}

	pub fn fingerprint(&self) -> Option<&str> {
		non_empty(self.fingerprint.as_deref())
	}
}

fn non_empty(value: Option<&str>) -> Option<&str> {
	value.filter(|value| !value.is_empty())
}

/// Rebuilds a previous state from request-carried ids.
///
/// Returns `None` without a client id; that visitor is new.
pub fn rehydrate(cookies: &CookieIds) -> Option<SessionState> {
	let client_id = cookies.client_id()?;
	Some(SessionState {
		client_id: Some(client_id.to_owned()),
		session_id: non_empty(cookies.session_id.as_deref()).map(str::to_owned),
		last_event_id: non_empty(cookies.last_event_id.as_deref()).map(str::to_owned),
	})
}
