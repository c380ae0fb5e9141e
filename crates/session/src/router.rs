use std::sync::Arc;
use std::time::Duration;

use beacon_ids::Clock;
use tokio::sync::oneshot;

use crate::config::BeaconConfig;
use crate::context::{IdentityContext, Lookup};
use crate::directory::OwnerDirectory;
use crate::error::RouteError;
use crate::fallback::FallbackBuilder;
use crate::fingerprint::{RequestAttributes, fingerprint, stable_key};
use crate::owner::{OwnerCmd, Resolution};
use crate::rehydrate::CookieIds;
use crate::state::OwnerKey;
use crate::store::StoreProvider;

/// Stateless entry point: picks the owner for a request and turns its reply
/// into an [`IdentityContext`]. Never fails; problems yield a degraded context.
pub struct IdentityRouter {
	directory: OwnerDirectory,
	fallback: FallbackBuilder,
	owner_timeout: Duration,
}

impl IdentityRouter {
	pub fn new(provider: Arc<dyn StoreProvider>, clock: Arc<dyn Clock>, config: &BeaconConfig) -> Self {
		Self {
			directory: OwnerDirectory::new(provider, Arc::clone(&clock), config),
			fallback: FallbackBuilder::new(clock, config.suffix_len),
			owner_timeout: config.owner_timeout,
		}
	}

	pub fn directory(&self) -> &OwnerDirectory {
		&self.directory
	}

	pub async fn resolve(&self, request: &RequestAttributes, cookies: &CookieIds) -> IdentityContext {
		let lookup = match cookies.client_id() {
			Some(client_id) => Lookup {
				key: OwnerKey::new(client_id),
				by_fingerprint: false,
				fingerprint: fingerprint(request),
			},
			None => Lookup {
				key: stable_key(request),
				by_fingerprint: true,
				fingerprint: fingerprint(request),
			},
		};

		match self.ask_owner(&lookup, cookies).await {
			Ok(resolution) => IdentityContext::from_transition(resolution.transition, lookup, cookies),
			Err(error) => self.fallback.build(request, cookies, &error),
		}
	}

	/// Finds the owner, sends the request and waits for the reply, all within `owner_timeout`.
	async fn ask_owner(&self, lookup: &Lookup, cookies: &CookieIds) -> Result<Resolution, RouteError> {
		let (reply, rx) = oneshot::channel();
		let cmd = OwnerCmd::Resolve {
			cookies: cookies.clone(),
			fingerprint: lookup.fingerprint.clone(),
			reply,
		};

		let exchange = async {
			let handle = self.directory.get_or_spawn(&lookup.key).await.map_err(RouteError::Open)?;
			handle.send(cmd).await?;
			let resolution = rx.await.map_err(|_| RouteError::Dropped)??;
			Ok::<_, RouteError>(resolution)
		};
		tokio::time::timeout(self.owner_timeout, exchange)
			.await
			.map_err(|_| RouteError::Timeout(self.owner_timeout))?
	}
}
