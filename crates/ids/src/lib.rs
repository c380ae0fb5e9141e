//! Identifier primitives for Beacon.
//!
//! # Purpose
//!
//! - Encode millisecond timestamps into fixed-width, lexicographically sortable strings.
//! - Mint and decode identifiers of the form `<time><suffix>` (legacy) or `<time>-<tag>-<suffix>` (tagged).
//! - Derive deterministic, key-order-independent hashes of structured data for fingerprinting.
//!
//! # Key types
//!
//! | Type | Meaning | Constraints |
//! |---|---|---|
//! | [`IdMinter`] | Mints identifiers from an injected clock and RNG | MUST NOT share state between owners; callers keep any "last id" themselves |
//! | [`MintedId`] | Result of one mint | `id` always decodes back to `time_ms`, `tag`, `suffix` |
//! | [`DecodedId`] | Parsed identifier parts | Only produced for well-formed input |
//! | [`Clock`] | Source of "now" | Injectable; tests use [`ManualClock`] |
//!
//! # Invariants
//!
//! 1. Identifiers minted later sort after identifiers minted earlier, to millisecond resolution.
//!    - Enforced in: [`encode_time`] (alphabet is in ASCII order, big-endian digits)
//!    - Tested by: `codec::tests::encoding_preserves_numeric_order`
//! 2. Decoding never panics; malformed input is an [`IdError`].
//!    - Enforced in: [`decode`], [`decode_time`]
//!    - Tested by: `id::tests::*_is_invalid`
//! 3. Hashing is invariant to object key order and sensitive to array order.
//!    - Enforced in: [`canonical_string`]
//!    - Tested by: `hash::tests::object_key_order_is_irrelevant`, `hash::tests::array_order_matters`

mod clock;
mod codec;
mod error;
mod hash;
mod id;
mod mint;

pub use clock::{Clock, ManualClock, SystemClock};
pub use codec::{ALPHABET, MAX_TIME_MS, TIME_LEN, decode_time, encode_time, is_alphabet_char};
pub use error::{HashError, IdError};
pub use hash::{canonical_string, hash_canonical, hash_to_alphabet, hash_value};
pub use id::{DELIMITER, DecodedId, decode};
pub use mint::{IdMinter, MIN_SUFFIX_LEN, MintOptions, MintedId};
