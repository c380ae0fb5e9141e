//! The single writer of one visitor's identifier triple.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use beacon_ids::{Clock, IdMinter};
use beacon_worker::{Actor, ActorContext, ActorFlow, ActorHandle, ActorSpec, TaskClass};
use tokio::sync::oneshot;

use crate::directory::GcAlarm;
use crate::engine::{self, Transition};
use crate::error::{OwnerError, StoreError};
use crate::rehydrate::{CookieIds, rehydrate};
use crate::state::{OwnerKey, SessionState};
use crate::store::StateStore;

/// Owners emit at most one event per command and are rarely observed.
const EVENT_BUFFER: usize = 16;

/// Commands accepted by a [`StateOwner`].
#[derive(Debug)]
pub enum OwnerCmd {
	/// Advance the triple for one request and reply with the transition.
	Resolve {
		cookies: CookieIds,
		fingerprint: String,
		reply: oneshot::Sender<Result<Resolution, OwnerError>>,
	},
	/// Delete stored state if `generation` is still the current lease.
	Purge { generation: u64 },
}

/// Events broadcast by a [`StateOwner`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnerEvent {
	Advanced { key: OwnerKey, state: SessionState },
	Purged { key: OwnerKey },
}

/// Reply to [`OwnerCmd::Resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
	pub transition: Transition,
	/// The loaded state had no client id and was rebuilt from the request.
	pub rehydrated: bool,
}

pub type OwnerHandle = ActorHandle<OwnerCmd, OwnerEvent>;

/// Everything an owner needs besides its key. Shared by every restart.
#[derive(Clone)]
pub struct OwnerDeps {
	pub store: Arc<dyn StateStore>,
	pub alarm: Arc<dyn GcAlarm>,
	pub clock: Arc<dyn Clock>,
	pub session_timeout: Duration,
	pub suffix_len: usize,
}

/// Actor owning one key's state. The cache is per instance; a restarted
/// owner reloads from the store.
pub struct StateOwner {
	key: OwnerKey,
	deps: OwnerDeps,
	minter: IdMinter,
	cache: Option<SessionState>,
	lease: Option<u64>,
}

impl StateOwner {
	pub fn new(key: OwnerKey, deps: OwnerDeps) -> Self {
		let minter = IdMinter::new(Arc::clone(&deps.clock)).with_suffix_len(deps.suffix_len);
		Self {
			key,
			deps,
			minter,
			cache: None,
			lease: None,
		}
	}

	/// Actor spec that builds a fresh owner for `key` on every (re)start.
	pub fn spec(key: OwnerKey, deps: OwnerDeps, mailbox_capacity: usize) -> ActorSpec<Self> {
		let name = format!("owner:{key}");
		ActorSpec::new(name, TaskClass::Request, move || Self::new(key.clone(), deps.clone()))
			.mailbox_capacity(mailbox_capacity)
			.event_buffer(EVENT_BUFFER)
	}

	/// Advances the triple for one request.
	///
	/// Returns `None` without minting or saving when the caller has already
	/// given up on `reply`, so ids are only persisted once someone receives them.
	async fn resolve<T>(&mut self, cookies: &CookieIds, reply: &oneshot::Sender<T>) -> Result<Option<Resolution>, StoreError> {
		let loaded = match self.cache.take() {
			Some(state) => state,
			None => self.deps.store.load().await?,
		};
		if reply.is_closed() {
			self.cache = Some(loaded);
			return Ok(None);
		}
		let (previous, rehydrated) = match rehydrate(cookies) {
			Some(rebuilt) if loaded.client_id.is_none() => (rebuilt, true),
			_ => (loaded, false),
		};

		let now = self.deps.clock.now_ms();
		let transition = engine::advance(previous, now, self.deps.session_timeout, &mut self.minter);
		self.deps.store.save(&transition.state).await?;
		self.cache = Some(transition.state.clone());
		self.lease = Some(self.deps.alarm.reset(&self.key));

		Ok(Some(Resolution { transition, rehydrated }))
	}
}

#[async_trait]
impl Actor for StateOwner {
	type Cmd = OwnerCmd;
	type Evt = OwnerEvent;

	async fn handle(&mut self, cmd: Self::Cmd, ctx: &mut ActorContext<Self::Evt>) -> Result<ActorFlow, String> {
		match cmd {
			OwnerCmd::Resolve { cookies, fingerprint, reply } => {
				let result = self.resolve(&cookies, &reply).await;
				match &result {
					Ok(Some(resolution)) => {
						let transition = &resolution.transition;
						tracing::debug!(
							key = %self.key,
							%fingerprint,
							is_new_client = transition.changes.is_new_client,
							is_new_session = transition.changes.is_new_session,
							rehydrated = resolution.rehydrated,
							"owner.resolve"
						);
						ctx.emit(OwnerEvent::Advanced {
							key: self.key.clone(),
							state: transition.state.clone(),
						});
					}
					Ok(None) => tracing::debug!(key = %self.key, "owner.resolve abandoned by caller"),
					Err(error) => tracing::warn!(key = %self.key, %error, "owner.resolve failed"),
				}
				if let Some(result) = result.transpose() {
					// The caller may still time out and go away.
					let _ = reply.send(result.map_err(OwnerError::from));
				}
				Ok(ActorFlow::Continue)
			}
			OwnerCmd::Purge { generation } => {
				if self.lease.is_some_and(|lease| lease != generation) {
					tracing::debug!(key = %self.key, generation, lease = ?self.lease, "owner.purge stale");
					return Ok(ActorFlow::Continue);
				}
				self.deps.store.clear().await.map_err(|error| error.to_string())?;
				self.cache = None;
				tracing::info!(key = %self.key, generation, "owner.purge");
				ctx.emit(OwnerEvent::Purged { key: self.key.clone() });
				Ok(ActorFlow::Stop)
			}
		}
	}
}
