//! Anonymous visitor identity.
//!
//! # Purpose
//!
//! - Assign each visitor a long-lived client id, a session id that rotates after inactivity, and a fresh event id per request.
//! - Persist that triple per visitor and delete it after a period of inactivity.
//! - Locate a first-time visitor's state by a deterministic stable key so concurrent first requests converge.
//! - Never fail a request: when state is unreachable, serve a non-persisted "first visit" context.
//!
//! # Mental model
//!
//! - [`IdentityRouter`] is stateless. It picks an [`OwnerKey`] (cookie client id, else [`stable_key`]) and asks that key's owner.
//! - [`OwnerDirectory`] keeps exactly one [`StateOwner`] actor per key and runs its garbage-collection lease.
//! - A [`StateOwner`] loads state (cache, else [`StateStore`]), rehydrates it from cookies when the stored client id is gone,
//!   runs the lifecycle [`engine`], saves the result and resets its lease.
//! - [`engine::advance`] is a pure function; everything async lives around it.
//!
//! # Key types
//!
//! | Type | Meaning | Constraints | Constructed / mutated in |
//! |---|---|---|---|
//! | [`SessionState`] | Persisted `(clientID, sessionID, lastEventID)` | Any field may be absent | `engine::advance`, `StateStore::load` |
//! | [`Transition`] | One lifecycle step | Exactly one id minted | `engine::advance` |
//! | [`OwnerKey`] | Owner name | 16 chars iff fingerprint-derived | `IdentityRouter::resolve` |
//! | [`IdentityContext`] | Per-request output | ids always present; `persist == false` iff degraded | `IdentityContext::from_transition`, `FallbackBuilder::build` |
//! | [`BeaconConfig`] | Tunables | Invalid values fall back to defaults | `BeaconConfig::from_toml_str` |
//!
//! # Invariants
//!
//! 1. A client id never changes once set.
//!    - Enforced in: `engine::advance`
//!    - Tested by: `engine::tests::mints_exactly_one_id_at_now`
//!    - Failure symptom: returning visitors are counted as new.
//! 2. The session rotates only when absent or after strictly more than `session_timeout` of inactivity.
//!    - Enforced in: `engine::is_expired`
//!    - Tested by: `engine::tests::timeout_boundary_is_strict`
//! 3. One owner per key; all mutations of a key's state are serialized by that owner's mailbox.
//!    - Enforced in: `OwnerDirectory::get_or_spawn`
//!    - Tested by: `directory::tests::one_owner_per_key`
//! 4. Only the most recent lease generation may purge state.
//!    - Enforced in: `run_lease_timer`, `StateOwner::handle` (`Purge`)
//!    - Tested by: `directory::tests::activity_resets_the_lease`
//!    - Failure symptom: active visitors lose their client id.
//! 5. Degraded contexts are never persisted, and the owner writes nothing for a request whose caller gave up.
//!    - Enforced in: `FallbackBuilder::build`, `StateOwner::resolve`
//!    - Tested by: `fallback::tests::degraded_context_is_a_neutral_first_visit`, `tests/router.rs::degraded_response_leaves_store_untouched`
//!    - Failure symptom: a visitor is told they are new, then reported as returning under an id they never received.
//! 6. Expiring one key never blocks requests for another.
//!    - Enforced in: `DirectoryInner::expire` (no map lock across awaits), `IdentityRouter::ask_owner` (lookup inside `owner_timeout`)
//!    - Tested by: `tests/router.rs::expiring_a_wedged_owner_does_not_block_other_visitors`
//!
//! # Data flow
//!
//! 1. `IdentityRouter::resolve` computes the fingerprint and the lookup key.
//! 2. `OwnerDirectory::get_or_spawn` returns the owner handle.
//! 3. The router sends `OwnerCmd::Resolve` and waits for the reply. Steps 2 and 3 share one `owner_timeout`.
//! 4. The owner replies with a [`Resolution`]; the router builds the [`IdentityContext`].
//! 5. Any failure along the way goes to [`FallbackBuilder::build`].
//!
//! # Lifecycle
//!
//! - Owners are spawned on first use and supervised; a handler failure restarts the owner with an empty cache.
//! - Each successful resolve bumps the key's lease generation and moves its deadline to now + `state_ttl`.
//!   One timer task per key follows the deadline.
//! - On expiry the directory marks the key as purging, removes the owner, sends `Purge` and stops it.
//!
//! # Failure modes
//!
//! - Store errors: replied as [`OwnerError`]; the router falls back.
//! - Owner timeout or closed mailbox: the router falls back; the owner keeps running.
//! - Config errors: unreadable or unparsable files are [`ConfigError`]; bad values are [`ConfigWarning`]s.

pub mod config;
pub mod context;
pub mod directory;
pub mod engine;
pub mod error;
pub mod fallback;
pub mod fingerprint;
pub mod owner;
pub mod rehydrate;
pub mod router;
pub mod state;
pub mod store;

pub use config::BeaconConfig;
pub use context::IdentityContext;
pub use directory::{GcAlarm, OwnerDirectory};
pub use engine::{ChangeFlags, Transition};
pub use error::{ConfigError, ConfigWarning, OwnerError, RouteError, StoreError};
pub use fallback::FallbackBuilder;
pub use fingerprint::{FINGERPRINT_LEN, HintPolicy, RequestAttributes, fingerprint, raw_attributes, stable_key};
pub use owner::{OwnerCmd, OwnerEvent, OwnerHandle, Resolution, StateOwner};
pub use rehydrate::{CookieIds, rehydrate};
pub use router::IdentityRouter;
pub use state::{OwnerKey, SessionState};
pub use store::{FileStoreProvider, MemoryStoreProvider, StateField, StateStore, StoreProvider};
