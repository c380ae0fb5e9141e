use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use beacon_ids::ManualClock;
use beacon_session::{
	BeaconConfig, CookieIds, IdentityContext, IdentityRouter, MemoryStoreProvider, OwnerKey, RequestAttributes, StateField, StateStore,
	StoreError, StoreProvider, stable_key,
};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;

const T0: u64 = 1_700_000_000_000;

fn request(colo: &str) -> RequestAttributes {
	RequestAttributes {
		remote_addr: Some("203.0.113.7".into()),
		user_agent: Some("Mozilla/5.0".into()),
		accept_language: Some("en-US".into()),
		accept_encoding: Some("gzip, br".into()),
		tls_cipher: Some("AEAD-AES128-GCM-SHA256".into()),
		tls_version: Some("TLSv1.3".into()),
		colo: Some(colo.into()),
	}
}

/// Cookies a browser would send back after receiving `ctx`.
fn cookies_from(ctx: &IdentityContext) -> CookieIds {
	CookieIds {
		client_id: Some(ctx.client_id.clone()),
		session_id: Some(ctx.session_id.clone()),
		last_event_id: Some(ctx.event_id.clone()),
		fingerprint: Some(ctx.fingerprint.clone()),
	}
}

struct Harness {
	router: IdentityRouter,
	provider: MemoryStoreProvider,
	clock: Arc<ManualClock>,
}

fn harness() -> Harness {
	let provider = MemoryStoreProvider::new();
	let clock = Arc::new(ManualClock::new(T0));
	let router = IdentityRouter::new(Arc::new(provider.clone()), clock.clone(), &BeaconConfig::default());
	Harness { router, provider, clock }
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn first_contact_routes_by_stable_key() {
	let h = harness();
	let ctx = h.router.resolve(&request("AMS"), &CookieIds::default()).await;

	assert!(ctx.is_new_client && ctx.is_new_session);
	assert!(ctx.is_new_lookup_by_fingerprint);
	assert!(ctx.is_new_fingerprint);
	assert!(ctx.persist && !ctx.degraded);
	assert_eq!(ctx.lookup_key.as_str(), "MsIljMdk1pzxjqRd");
	assert_eq!(ctx.fingerprint, "p8yig4SgLMroTvTj");
	assert_eq!(ctx.client_id, ctx.session_id);
	assert_eq!(ctx.session_id, ctx.event_id);
	assert_eq!(ctx.event_time, T0);
	assert_eq!(h.provider.snapshot(&ctx.lookup_key).and_then(|s| s.client_id), Some(ctx.client_id.clone()));
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn returning_visitor_routes_by_client_id() {
	let h = harness();
	let first = h.router.resolve(&request("AMS"), &CookieIds::default()).await;

	h.clock.advance(1_000);
	let second = h.router.resolve(&request("AMS"), &cookies_from(&first)).await;

	assert_eq!(second.lookup_key, OwnerKey::new(first.client_id.clone()));
	assert!(!second.is_new_lookup_by_fingerprint);
	assert!(!second.is_new_fingerprint);
	assert!(!second.is_new_client);
	assert!(!second.is_new_session);
	assert_eq!(second.client_id, first.client_id);
	assert_eq!(second.session_id, first.session_id);
	assert_ne!(second.event_id, first.event_id);
	assert_eq!(second.old_state.client_id.as_deref(), Some(first.client_id.as_str()));
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn three_requests_rotate_session_after_timeout() {
	let h = harness();
	let first = h.router.resolve(&request("AMS"), &CookieIds::default()).await;

	h.clock.advance(1_000);
	let second = h.router.resolve(&request("AMS"), &cookies_from(&first)).await;

	h.clock.advance(1_800_001);
	let third = h.router.resolve(&request("SJC"), &cookies_from(&second)).await;

	assert!(!third.is_new_client);
	assert!(third.is_new_session);
	assert!(third.is_new_fingerprint);
	assert_eq!(third.client_id, first.client_id);
	assert_eq!(third.session_id, third.event_id);
	assert_eq!(third.session_time, Some(T0 + 1_000 + 1_800_001));
	assert_eq!(third.client_time, Some(T0));
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn concurrent_first_contacts_converge() {
	let h = harness();
	let (req_a, req_b, no_cookies) = (request("AMS"), request("SJC"), CookieIds::default());
	let (a, b) = tokio::join!(h.router.resolve(&req_a, &no_cookies), h.router.resolve(&req_b, &no_cookies));

	assert_eq!(a.lookup_key, b.lookup_key);
	assert_eq!(a.client_id, b.client_id);
	assert_ne!(a.fingerprint, b.fingerprint);
	assert_eq!(usize::from(a.is_new_client) + usize::from(b.is_new_client), 1);
	assert_eq!(h.router.directory().snapshot(), [stable_key(&request("AMS"))]);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn garbage_collected_state_is_rehydrated_from_cookies() {
	let h = harness();
	let first = h.router.resolve(&request("AMS"), &CookieIds::default()).await;
	let second = h.router.resolve(&request("AMS"), &cookies_from(&first)).await;

	// Wipe everything the client-id owner knows.
	let key = second.lookup_key.clone();
	h.router.directory().evict(&key).await.unwrap();
	h.provider.open(&key).unwrap().clear().await.unwrap();

	h.clock.advance(5_000);
	let third = h.router.resolve(&request("AMS"), &cookies_from(&second)).await;
	assert!(!third.is_new_client);
	assert!(!third.is_new_session);
	assert_eq!(third.client_id, first.client_id);
	assert_eq!(third.session_id, first.session_id);
}

struct BrokenProvider;

struct BrokenStore;

#[async_trait]
impl StateStore for BrokenStore {
	async fn get(&self, _field: StateField) -> Result<Option<String>, StoreError> {
		Err(StoreError::Unavailable("disk on fire".into()))
	}

	async fn put(&self, _field: StateField, _value: &str) -> Result<(), StoreError> {
		Err(StoreError::Unavailable("disk on fire".into()))
	}

	async fn clear(&self) -> Result<(), StoreError> {
		Ok(())
	}
}

impl StoreProvider for BrokenProvider {
	fn open(&self, _key: &OwnerKey) -> Result<Arc<dyn StateStore>, StoreError> {
		Ok(Arc::new(BrokenStore))
	}
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn failing_store_yields_degraded_context() {
	let router = IdentityRouter::new(Arc::new(BrokenProvider), Arc::new(ManualClock::new(T0)), &BeaconConfig::default());
	let ctx = router.resolve(&request("AMS"), &CookieIds::default()).await;

	assert!(ctx.degraded);
	assert!(!ctx.persist);
	assert!(ctx.is_new_client && ctx.is_new_session && ctx.is_new_fingerprint);
	assert_eq!(ctx.client_id, ctx.event_id);
	assert_eq!(ctx.lookup_key.as_str(), "MsIljMdk1pzxjqRd");
}

struct HangingProvider;

struct HangingStore;

#[async_trait]
impl StateStore for HangingStore {
	async fn get(&self, _field: StateField) -> Result<Option<String>, StoreError> {
		std::future::pending().await
	}

	async fn put(&self, _field: StateField, _value: &str) -> Result<(), StoreError> {
		std::future::pending().await
	}

	async fn clear(&self) -> Result<(), StoreError> {
		Ok(())
	}
}

impl StoreProvider for HangingProvider {
	fn open(&self, _key: &OwnerKey) -> Result<Arc<dyn StateStore>, StoreError> {
		Ok(Arc::new(HangingStore))
	}
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn slow_owner_times_out_into_fallback() {
	let config = BeaconConfig {
		owner_timeout: Duration::from_millis(100),
		..BeaconConfig::default()
	};
	let router = IdentityRouter::new(Arc::new(HangingProvider), Arc::new(ManualClock::new(T0)), &config);
	let ctx = router.resolve(&request("AMS"), &CookieIds::default()).await;

	assert!(ctx.degraded);
	assert!(!ctx.persist);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn unopenable_store_yields_degraded_context() {
	struct Unopenable;

	impl StoreProvider for Unopenable {
		fn open(&self, _key: &OwnerKey) -> Result<Arc<dyn StateStore>, StoreError> {
			Err(StoreError::Unavailable("no backend".into()))
		}
	}

	let router = IdentityRouter::new(Arc::new(Unopenable), Arc::new(ManualClock::new(T0)), &BeaconConfig::default());
	let ctx = router.resolve(&request("AMS"), &CookieIds::default()).await;
	assert!(ctx.degraded);
	assert!(router.directory().snapshot().is_empty());
}

/// How a [`FlakyStore`] treats reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Health {
	Slow(Duration),
	Hung,
}

/// Memory-backed stores whose health can change per key mid-test.
#[derive(Clone, Default)]
struct FlakyProvider {
	inner: MemoryStoreProvider,
	health: Arc<Mutex<HashMap<OwnerKey, Health>>>,
}

impl FlakyProvider {
	fn set(&self, key: &OwnerKey, health: Option<Health>) {
		let mut map = self.health.lock();
		match health {
			Some(health) => map.insert(key.clone(), health),
			None => map.remove(key),
		};
	}
}

struct FlakyStore {
	key: OwnerKey,
	inner: Arc<dyn StateStore>,
	health: Arc<Mutex<HashMap<OwnerKey, Health>>>,
}

impl FlakyStore {
	async fn stall(&self) {
		let health = self.health.lock().get(&self.key).copied();
		match health {
			None => {}
			Some(Health::Slow(delay)) => tokio::time::sleep(delay).await,
			Some(Health::Hung) => std::future::pending().await,
		}
	}
}

#[async_trait]
impl StateStore for FlakyStore {
	async fn get(&self, field: StateField) -> Result<Option<String>, StoreError> {
		self.stall().await;
		self.inner.get(field).await
	}

	async fn put(&self, field: StateField, value: &str) -> Result<(), StoreError> {
		self.stall().await;
		self.inner.put(field, value).await
	}

	async fn clear(&self) -> Result<(), StoreError> {
		self.stall().await;
		self.inner.clear().await
	}
}

impl StoreProvider for FlakyProvider {
	fn open(&self, key: &OwnerKey) -> Result<Arc<dyn StateStore>, StoreError> {
		Ok(Arc::new(FlakyStore {
			key: key.clone(),
			inner: self.inner.open(key)?,
			health: Arc::clone(&self.health),
		}))
	}
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn degraded_response_leaves_store_untouched() {
	let provider = FlakyProvider::default();
	let config = BeaconConfig {
		owner_timeout: Duration::from_millis(100),
		..BeaconConfig::default()
	};
	let router = IdentityRouter::new(Arc::new(provider.clone()), Arc::new(ManualClock::new(T0)), &config);
	let key = stable_key(&request("AMS"));
	provider.set(&key, Some(Health::Slow(Duration::from_millis(200))));

	let degraded = router.resolve(&request("AMS"), &CookieIds::default()).await;
	assert!(degraded.degraded && !degraded.persist);

	// Let the owner finish the request nobody is waiting for.
	tokio::time::sleep(Duration::from_secs(1)).await;
	assert_eq!(provider.inner.snapshot(&key), None);
	assert_eq!(router.directory().lease(&key), None);

	provider.set(&key, None);
	let healthy = router.resolve(&request("AMS"), &CookieIds::default()).await;
	assert!(!healthy.degraded);
	assert!(healthy.is_new_client);
	assert_ne!(healthy.client_id, degraded.client_id);
	assert_eq!(provider.inner.snapshot(&key).and_then(|s| s.client_id), Some(healthy.client_id));
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn expiring_a_wedged_owner_does_not_block_other_visitors() {
	let provider = FlakyProvider::default();
	let config = BeaconConfig {
		owner_timeout: Duration::from_millis(100),
		state_ttl: Duration::from_secs(5),
		mailbox_capacity: 1,
		..BeaconConfig::default()
	};
	let router = IdentityRouter::new(Arc::new(provider.clone()), Arc::new(ManualClock::new(T0)), &config);
	let key = stable_key(&request("AMS"));

	let first = router.resolve(&request("AMS"), &CookieIds::default()).await;
	assert!(!first.degraded);
	assert_eq!(first.lookup_key, key);

	// One request wedges the owner on the store, the next fills its mailbox.
	provider.set(&key, Some(Health::Hung));
	let (req_a, req_b, no_cookies) = (request("AMS"), request("AMS"), CookieIds::default());
	let (a, b) = tokio::join!(router.resolve(&req_a, &no_cookies), router.resolve(&req_b, &no_cookies));
	assert!(a.degraded && b.degraded);

	// The wedged key's lease runs out and its purge cannot get through.
	tokio::time::sleep(Duration::from_secs(6)).await;

	let mut other = request("AMS");
	other.remote_addr = Some("198.51.100.23".into());
	let ctx = tokio::time::timeout(Duration::from_secs(1), router.resolve(&other, &CookieIds::default()))
		.await
		.expect("an unrelated visitor must not wait on another key's purge");
	assert!(!ctx.degraded);
	assert!(ctx.is_new_client);
	assert_eq!(router.directory().snapshot(), [stable_key(&other)]);
}
