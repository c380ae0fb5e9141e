//! Identifier lifecycle: the pure transition from a previous triple to the next.
//!
//! Every call mints exactly one identifier, the event id. It becomes the
//! client id for a first-time visitor and the session id whenever the session
//! rotates, so a brand new visitor has `client == session == event`.

use std::time::Duration;

use beacon_ids::{IdMinter, MintedId};
use rand::RngCore;
use serde::Serialize;

use crate::state::SessionState;

/// Per-request change flags. Never persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeFlags {
	pub is_new_client: bool,
	pub is_new_session: bool,
}

/// Result of one lifecycle step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
	pub state: SessionState,
	pub previous: SessionState,
	pub changes: ChangeFlags,
	pub event: MintedId,
}

/// Most recent activity: last event, else session start, else client creation.
pub fn last_activity(state: &SessionState) -> Option<u64> {
	state.last_event_time().or_else(|| state.session_time()).or_else(|| state.client_time())
}

/// Whether a session whose last activity was at `last` has lapsed at `now_ms`.
///
/// Unknown activity counts as expired. Activity in the future never expires.
pub fn is_expired(last: Option<u64>, now_ms: u64, session_timeout: Duration) -> bool {
	let timeout_ms = u64::try_from(session_timeout.as_millis()).unwrap_or(u64::MAX);
	last.is_none_or(|last| now_ms.saturating_sub(last) > timeout_ms)
}

/// Advances `previous` to the state for a request at `now_ms`.
pub fn advance<R>(previous: SessionState, now_ms: u64, session_timeout: Duration, minter: &mut IdMinter<R>) -> Transition
where
	R: RngCore,
{
	let expired = is_expired(last_activity(&previous), now_ms, session_timeout);
	let changes = ChangeFlags {
		is_new_client: previous.client_id.is_none(),
		is_new_session: previous.session_id.is_none() || expired,
	};

	let event = minter.mint_at(now_ms);
	let client_id = previous.client_id.clone().unwrap_or_else(|| event.id.clone());
	let session_id = match &previous.session_id {
		Some(session) if !changes.is_new_session => session.clone(),
		_ => event.id.clone(),
	};

	Transition {
		state: SessionState::new(client_id, session_id, event.id.clone()),
		previous,
		changes,
		event,
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use beacon_ids::{ManualClock, decode, encode_time};
	use pretty_assertions::assert_eq;
	use proptest::prelude::*;

	use super::*;

	const T0: u64 = 1_700_000_000_000;
	const TIMEOUT: Duration = Duration::from_millis(1_800_000);

	fn minter() -> IdMinter {
		IdMinter::seeded(Arc::new(ManualClock::new(T0)), 11)
	}

	fn id_at(time_ms: u64, suffix: &str) -> String {
		format!("{}{suffix}", encode_time(time_ms))
	}

	#[test]
	fn first_contact_mints_one_id_for_everything() {
		let t = advance(SessionState::default(), T0, TIMEOUT, &mut minter());

		assert_eq!(t.changes, ChangeFlags { is_new_client: true, is_new_session: true });
		assert_eq!(t.state.client_id.as_deref(), Some(t.event.id.as_str()));
		assert_eq!(t.state.session_id.as_deref(), Some(t.event.id.as_str()));
		assert_eq!(t.state.last_event_id.as_deref(), Some(t.event.id.as_str()));
		assert_eq!(t.event.time_ms, T0);
		assert!(t.previous.is_empty());
	}

	#[test]
	fn recent_activity_keeps_session() {
		let previous = SessionState::new(id_at(T0 - 60_000, "clientclient"), id_at(T0 - 60_000, "sessionsessi"), id_at(T0 - 1_000, "eventeventev"));
		let t = advance(previous.clone(), T0, TIMEOUT, &mut minter());

		assert_eq!(t.changes, ChangeFlags::default());
		assert_eq!(t.state.client_id, previous.client_id);
		assert_eq!(t.state.session_id, previous.session_id);
		assert_ne!(t.state.last_event_id, previous.last_event_id);
		assert_eq!(t.previous, previous);
	}

	#[test]
	fn timeout_boundary_is_strict() {
		let at = |last: u64| SessionState::new(id_at(last, "clientclient"), id_at(last, "sessionsessi"), id_at(last, "eventeventev"));

		let t = advance(at(T0 - 1_800_000), T0, TIMEOUT, &mut minter());
		assert!(!t.changes.is_new_session);

		let t = advance(at(T0 - 1_800_001), T0, TIMEOUT, &mut minter());
		assert!(t.changes.is_new_session);
		assert!(!t.changes.is_new_client);
		assert_eq!(t.state.session_id.as_deref(), Some(t.event.id.as_str()));
		assert_eq!(t.state.client_id.as_deref(), Some(id_at(T0 - 1_800_001, "clientclient").as_str()));
	}

	#[test]
	fn activity_falls_back_to_session_then_client_time() {
		let previous = SessionState {
			client_id: Some(id_at(T0 - 10_000_000, "clientclient")),
			session_id: Some(id_at(T0 - 1_000, "sessionsessi")),
			last_event_id: None,
		};
		assert_eq!(last_activity(&previous), Some(T0 - 1_000));
		assert!(!advance(previous, T0, TIMEOUT, &mut minter()).changes.is_new_session);

		let client_only = SessionState {
			client_id: Some(id_at(T0 - 1_000, "clientclient")),
			..SessionState::default()
		};
		assert_eq!(last_activity(&client_only), Some(T0 - 1_000));
		// No session id is always a new session, however recent the client.
		assert!(advance(client_only, T0, TIMEOUT, &mut minter()).changes.is_new_session);
	}

	#[test]
	fn malformed_client_id_is_kept_verbatim() {
		let previous = SessionState {
			client_id: Some("not-an-id".into()),
			session_id: Some("garbage".into()),
			last_event_id: None,
		};
		let t = advance(previous, T0, TIMEOUT, &mut minter());

		assert!(!t.changes.is_new_client);
		assert!(t.changes.is_new_session);
		assert_eq!(t.state.client_id.as_deref(), Some("not-an-id"));
	}

	#[test]
	fn future_activity_is_not_expired() {
		assert!(!is_expired(Some(T0 + 5_000), T0, TIMEOUT));
		assert!(is_expired(None, T0, TIMEOUT));
	}

	#[test]
	fn three_request_scenario() {
		let mut minter = minter();
		let first = advance(SessionState::default(), T0, TIMEOUT, &mut minter);
		let second = advance(first.state.clone(), T0 + 1_000, TIMEOUT, &mut minter);
		let third = advance(second.state.clone(), T0 + 1_000 + 1_800_001, TIMEOUT, &mut minter);

		assert_eq!(second.changes, ChangeFlags::default());
		assert_eq!(second.state.client_id, first.state.client_id);
		assert_eq!(second.state.session_id, first.state.session_id);

		assert_eq!(third.changes, ChangeFlags { is_new_client: false, is_new_session: true });
		assert_eq!(third.state.client_id, first.state.client_id);
		assert_eq!(third.state.session_id.as_deref(), Some(third.event.id.as_str()));
		assert_eq!(third.state.session_time(), Some(T0 + 1_000 + 1_800_001));
	}

	fn arb_id() -> impl Strategy<Value = Option<String>> {
		prop_oneof![
			Just(None),
			(0u64..=T0 * 2).prop_map(|t| Some(id_at(t, "suffixsuffix"))),
			"[a-z]{0,12}".prop_map(Some),
		]
	}

	proptest! {
		#[test]
		fn mints_exactly_one_id_at_now(client in arb_id(), session in arb_id(), event in arb_id(), now in 0u64..=T0 * 2) {
			let previous = SessionState { client_id: client, session_id: session, last_event_id: event };
			let t = advance(previous.clone(), now, TIMEOUT, &mut minter());

			prop_assert_eq!(decode(&t.event.id).map(|d| d.time_ms), Ok(now));
			prop_assert_eq!(t.state.last_event_id.as_deref(), Some(t.event.id.as_str()));
			if let Some(client) = &previous.client_id {
				prop_assert_eq!(t.state.client_id.as_ref(), Some(client));
			}
			let minted = [&t.state.client_id, &t.state.session_id]
				.iter()
				.filter(|id| id.as_deref() == Some(t.event.id.as_str()))
				.count();
			prop_assert_eq!(minted, usize::from(t.changes.is_new_client) + usize::from(t.changes.is_new_session));
		}
	}
}
