use serde::{Deserialize, Serialize};

use crate::engine::Transition;
use crate::rehydrate::CookieIds;
use crate::state::{OwnerKey, SessionState, id_time};

/// Identity handed back to the caller for one request.
///
/// Client, session and event ids are always present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityContext {
	#[serde(rename = "clientID")]
	pub client_id: String,
	#[serde(rename = "sessionID")]
	pub session_id: String,
	#[serde(rename = "eventID")]
	pub event_id: String,
	pub client_time: Option<u64>,
	pub session_time: Option<u64>,
	pub event_time: u64,
	pub old_state: SessionState,
	pub is_new_client: bool,
	pub is_new_session: bool,
	/// The owner was located by stable key rather than client id.
	pub is_new_lookup_by_fingerprint: bool,
	/// The request's fingerprint differs from the one it carried.
	pub is_new_fingerprint: bool,
	pub fingerprint: String,
	pub lookup_key: OwnerKey,
	/// Whether the caller should write cookies for these ids.
	pub persist: bool,
	pub degraded: bool,
}

/// Request-level facts the owner does not know about.
#[derive(Debug, Clone)]
pub(crate) struct Lookup {
	pub(crate) key: OwnerKey,
	pub(crate) by_fingerprint: bool,
	pub(crate) fingerprint: String,
}

impl Lookup {
	pub(crate) fn is_new_fingerprint(&self, cookies: &CookieIds) -> bool {
		cookies.fingerprint() != Some(self.fingerprint.as_str())
	}
}

impl IdentityContext {
	pub(crate) fn from_transition(transition: Transition, lookup: Lookup, cookies: &CookieIds) -> Self {
		let is_new_fingerprint = lookup.is_new_fingerprint(cookies);
		let Transition {
			state,
			previous,
			changes,
			event,
		} = transition;
		let client_id = state.client_id.unwrap_or_else(|| event.id.clone());
		let session_id = state.session_id.unwrap_or_else(|| event.id.clone());

		Self {
			client_time: id_time(Some(&client_id)),
			session_time: id_time(Some(&session_id)),
			event_time: event.time_ms,
			client_id,
			session_id,
			event_id: event.id,
			old_state: previous,
			is_new_client: changes.is_new_client,
			is_new_session: changes.is_new_session,
			is_new_lookup_by_fingerprint: lookup.by_fingerprint,
			is_new_fingerprint,
			fingerprint: lookup.fingerprint,
			lookup_key: lookup.key,
			persist: true,
			degraded: false,
		}
	}
}
