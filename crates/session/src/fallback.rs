use std::fmt::Display;
use std::sync::Arc;

use beacon_ids::{Clock, IdMinter};
use parking_lot::Mutex;

use crate::context::IdentityContext;
use crate::fingerprint::{RequestAttributes, fingerprint, stable_key};
use crate::rehydrate::CookieIds;
use crate::state::SessionState;

/// Builds the "first visit" context served when no owner can answer.
///
/// Degraded contexts are never persisted, so the next healthy request starts
/// from whatever state the owner still has.
#[derive(Debug)]
pub struct FallbackBuilder {
	minter: Mutex<IdMinter>,
}

impl FallbackBuilder {
	pub fn new(clock: Arc<dyn Clock>, suffix_len: usize) -> Self {
		Self::with_minter(IdMinter::new(clock).with_suffix_len(suffix_len))
	}

	pub fn with_minter(minter: IdMinter) -> Self {
		Self { minter: Mutex::new(minter) }
	}

	pub fn build(&self, request: &RequestAttributes, cookies: &CookieIds, reason: &dyn Display) -> IdentityContext {
		let event = {
			let mut minter = self.minter.lock();
			let now = minter.now_ms();
			minter.mint_at(now)
		};
		let fingerprint = fingerprint(request);
		let lookup_key = stable_key(request);
		tracing::warn!(%reason, key = %lookup_key, had_client = cookies.client_id().is_some(), "identity.fallback");

		IdentityContext {
			client_id: event.id.clone(),
			session_id: event.id.clone(),
			event_id: event.id,
			client_time: Some(event.time_ms),
			session_time: Some(event.time_ms),
			event_time: event.time_ms,
			old_state: SessionState::default(),
			is_new_client: true,
			is_new_session: true,
			is_new_lookup_by_fingerprint: true,
			is_new_fingerprint: true,
			fingerprint,
			lookup_key,
			persist: false,
			degraded: true,
		}
	}
}
