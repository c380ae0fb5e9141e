//! Registry of live state owners and their garbage-collection leases.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use beacon_ids::Clock;
use beacon_worker::{ShutdownMode, ShutdownReport, TaskClass, spawn, spawn_supervised_actor};
use parking_lot::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::BeaconConfig;
use crate::error::StoreError;
use crate::owner::{OwnerCmd, OwnerDeps, OwnerHandle, StateOwner};
use crate::state::OwnerKey;
use crate::store::StoreProvider;

/// Inactivity timer guarding an owner's stored state.
pub trait GcAlarm: Send + Sync {
	/// Restarts the lease for `key` and returns its new generation.
	///
	/// Only the most recent generation may purge.
	fn reset(&self, key: &OwnerKey) -> u64;
}

/// Creates owners on demand, one per key, and purges them after `state_ttl`
/// without activity.
#[derive(Clone)]
pub struct OwnerDirectory {
	inner: Arc<DirectoryInner>,
}

struct DirectoryInner {
	owners: Mutex<Owners>,
	leases: Mutex<HashMap<OwnerKey, Lease>>,
	next_lease: AtomicU64,
	provider: Arc<dyn StoreProvider>,
	clock: Arc<dyn Clock>,
	session_timeout: Duration,
	suffix_len: usize,
	state_ttl: Duration,
	owner_timeout: Duration,
	mailbox_capacity: usize,
}

#[derive(Default)]
struct Owners {
	live: HashMap<OwnerKey, Arc<OwnerHandle>>,
	/// Keys whose state is being purged. The token is cancelled when the purge ends.
	purging: HashMap<OwnerKey, CancellationToken>,
}

/// Latest lease of a key. One timer task per key follows `deadline` as it moves.
struct Lease {
	generation: u64,
	deadline: Instant,
}

/// Alarm handed to owners. Weak so owners do not keep the directory alive.
struct LeaseAlarm {
	directory: Weak<DirectoryInner>,
}

impl GcAlarm for LeaseAlarm {
	fn reset(&self, key: &OwnerKey) -> u64 {
		match self.directory.upgrade() {
			Some(inner) => inner.reset_lease(key),
			None => 0,
		}
	}
}

/// Holds a key in [`Owners::purging`] until dropped.
struct PurgeMarker {
	directory: Arc<DirectoryInner>,
	key: OwnerKey,
	done: CancellationToken,
}

impl Drop for PurgeMarker {
	fn drop(&mut self) {
		self.directory.owners.lock().purging.remove(&self.key);
		self.done.cancel();
	}
}

impl OwnerDirectory {
	pub fn new(provider: Arc<dyn StoreProvider>, clock: Arc<dyn Clock>, config: &BeaconConfig) -> Self {
		Self {
			inner: Arc::new(DirectoryInner {
				owners: Mutex::new(Owners::default()),
				leases: Mutex::new(HashMap::new()),
				next_lease: AtomicU64::new(0),
				provider,
				clock,
				session_timeout: config.session_timeout,
				suffix_len: config.suffix_len,
				state_ttl: config.state_ttl,
				owner_timeout: config.owner_timeout,
				mailbox_capacity: config.mailbox_capacity,
			}),
		}
	}

	/// Returns the live owner for `key`, spawning one if needed.
	///
	/// Lookup and spawn happen under one lock, so concurrent callers for one
	/// key always share an owner. While the key's state is being purged this
	/// waits for the purge to finish.
	pub async fn get_or_spawn(&self, key: &OwnerKey) -> Result<Arc<OwnerHandle>, StoreError> {
		loop {
			let purge = {
				let mut owners = self.inner.owners.lock();
				match owners.purging.get(key).cloned() {
					Some(done) => done,
					None => return self.spawn_locked(&mut owners, key),
				}
			};
			purge.cancelled().await;
		}
	}

	fn spawn_locked(&self, owners: &mut Owners, key: &OwnerKey) -> Result<Arc<OwnerHandle>, StoreError> {
		if let Some(handle) = owners.live.get(key).filter(|handle| !handle.is_finished()) {
			return Ok(Arc::clone(handle));
		}

		let deps = OwnerDeps {
			store: self.inner.provider.open(key)?,
			alarm: Arc::new(LeaseAlarm {
				directory: Arc::downgrade(&self.inner),
			}),
			clock: Arc::clone(&self.inner.clock),
			session_timeout: self.inner.session_timeout,
			suffix_len: self.inner.suffix_len,
		};
		let handle = Arc::new(spawn_supervised_actor(StateOwner::spec(key.clone(), deps, self.inner.mailbox_capacity)));
		owners.live.insert(key.clone(), Arc::clone(&handle));
		tracing::info!(key = %key, by_fingerprint = key.is_fingerprint_derived(), "directory.spawn");
		Ok(handle)
	}

	/// Keys with a running owner, sorted.
	pub fn snapshot(&self) -> Vec<OwnerKey> {
		let owners = self.inner.owners.lock();
		let mut keys: Vec<OwnerKey> = owners.live.iter().filter(|(_, handle)| !handle.is_finished()).map(|(key, _)| key.clone()).collect();
		keys.sort();
		keys
	}

	/// Current lease generation of `key`, if one is pending.
	pub fn lease(&self, key: &OwnerKey) -> Option<u64> {
		self.inner.leases.lock().get(key).map(|lease| lease.generation)
	}

	/// Stops the owner for `key` without touching its stored state.
	pub async fn evict(&self, key: &OwnerKey) -> Option<ShutdownReport> {
		let handle = self.inner.owners.lock().live.remove(key)?;
		Some(handle.shutdown(ShutdownMode::Graceful { timeout: self.inner.owner_timeout }).await)
	}

	/// Stops every owner, letting queued requests finish.
	pub async fn shutdown_all(&self) {
		let owners: Vec<_> = self.inner.owners.lock().live.drain().collect();
		for (key, handle) in owners {
			let report = handle.shutdown(ShutdownMode::Graceful { timeout: self.inner.owner_timeout }).await;
			if report.timed_out() {
				tracing::warn!(key = %key, "owner did not stop in time");
			}
		}
	}
}

impl DirectoryInner {
	fn reset_lease(self: &Arc<Self>, key: &OwnerKey) -> u64 {
		let generation = self.next_lease.fetch_add(1, Ordering::AcqRel) + 1;
		let deadline = Instant::now() + self.state_ttl;
		let armed = self.leases.lock().insert(key.clone(), Lease { generation, deadline }).is_some();
		if !armed {
			spawn(TaskClass::Maintenance, run_lease_timer(Arc::downgrade(self), key.clone(), deadline));
		}
		generation
	}

	/// Purges `key` once its lease ran out.
	///
	/// The owner map is never locked across an await. The purging marker keeps
	/// `get_or_spawn` from starting a replacement owner until the purge is over.
	async fn expire(self: &Arc<Self>, key: OwnerKey, generation: u64) {
		let (handle, _marker) = loop {
			let pending = {
				let mut owners = self.owners.lock();
				match owners.purging.get(&key).cloned() {
					Some(done) => done,
					None => {
						let done = CancellationToken::new();
						owners.purging.insert(key.clone(), done.clone());
						let marker = PurgeMarker {
							directory: Arc::clone(self),
							key: key.clone(),
							done,
						};
						break (owners.live.remove(&key), marker);
					}
				}
			};
			pending.cancelled().await;
		};

		let Some(handle) = handle else {
			self.clear_state(&key, generation).await;
			return;
		};

		let sent = matches!(
			tokio::time::timeout(self.owner_timeout, handle.send(OwnerCmd::Purge { generation })).await,
			Ok(Ok(()))
		);
		let report = if sent {
			handle.shutdown(ShutdownMode::Graceful { timeout: self.owner_timeout }).await
		} else {
			tracing::warn!(key = %key, generation, "lease expired but owner is unreachable; cancelling it");
			handle.shutdown(ShutdownMode::Immediate).await
		};
		if !sent || report.timed_out() {
			self.clear_state(&key, generation).await;
		}
		tracing::info!(actor = handle.name(), generation, completed = report.completed(), "directory.evict");
	}

	/// Clears stored state directly, unless a newer lease has been armed.
	async fn clear_state(&self, key: &OwnerKey, generation: u64) {
		if self.leases.lock().contains_key(key) {
			tracing::debug!(key = %key, generation, "lease superseded; keeping state");
			return;
		}
		let store = match self.provider.open(key) {
			Ok(store) => store,
			Err(error) => {
				tracing::warn!(key = %key, %error, "lease expired but store could not be opened");
				return;
			}
		};
		match tokio::time::timeout(self.owner_timeout, store.clear()).await {
			Ok(Ok(())) => tracing::info!(key = %key, generation, "owner.purge"),
			Ok(Err(error)) => tracing::warn!(key = %key, %error, "lease expired but state could not be cleared"),
			Err(_) => tracing::warn!(key = %key, generation, "lease expired but clearing state timed out"),
		}
	}
}

/// Sleeps until the key's latest deadline, following resets, then expires the lease.
async fn run_lease_timer(directory: Weak<DirectoryInner>, key: OwnerKey, mut deadline: Instant) {
	loop {
		tokio::time::sleep_until(deadline).await;
		let Some(inner) = directory.upgrade() else {
			return;
		};

		let expired = {
			let mut leases = inner.leases.lock();
			let Some(lease) = leases.get(&key) else {
				return;
			};
			if lease.deadline > Instant::now() {
				deadline = lease.deadline;
				None
			} else {
				let generation = lease.generation;
				leases.remove(&key);
				Some(generation)
			}
		};
		if let Some(generation) = expired {
			inner.expire(key, generation).await;
			return;
		}
	}
}
