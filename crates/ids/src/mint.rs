//! Identifier minting.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use serde_json::Value;

use crate::codec::{ALPHABET, encode_time};
use crate::hash::hash_to_alphabet;
use crate::id::{DELIMITER, check_segment};
use crate::{Clock, IdError};

/// Minimum suffix length; shorter requests are raised to this.
pub const MIN_SUFFIX_LEN: usize = 12;

/// Options for one [`IdMinter::mint`] call.
///
/// Suffix precedence: explicit suffix, then hash of content, then random.
#[derive(Debug, Clone, Default)]
pub struct MintOptions {
	time_ms: Option<u64>,
	tag: Option<String>,
	length: Option<usize>,
	suffix: Option<String>,
	content: Option<Value>,
}

impl MintOptions {
	/// Creates options that mint a random, untagged identifier at "now".
	pub fn new() -> Self {
		Self::default()
	}

	/// Stamps the identifier with `time_ms` instead of the clock reading.
	#[must_use]
	pub fn at(mut self, time_ms: u64) -> Self {
		self.time_ms = Some(time_ms);
		self
	}

	/// Uses the tagged form. An empty tag keeps the legacy form.
	#[must_use]
	pub fn tag(mut self, tag: impl Into<String>) -> Self {
		self.tag = Some(tag.into());
		self
	}

	/// Suffix length for random and hashed suffixes.
	#[must_use]
	pub fn length(mut self, length: usize) -> Self {
		self.length = Some(length);
		self
	}

	/// Uses `suffix` verbatim.
	#[must_use]
	pub fn suffix(mut self, suffix: impl Into<String>) -> Self {
		self.suffix = Some(suffix.into());
		self
	}

	/// Derives the suffix from a hash of `content`.
	#[must_use]
	pub fn content(mut self, content: impl Into<Value>) -> Self {
		self.content = Some(content.into());
		self
	}
}

/// One freshly minted identifier and its parts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MintedId {
	/// Serialized identifier.
	pub id: String,
	/// Suffix segment.
	pub suffix: String,
	/// Embedded time in UNIX milliseconds.
	pub time_ms: u64,
	/// Tag segment, if the tagged form was used.
	pub tag: Option<String>,
}

/// Mints identifiers from an injected clock and random source.
///
/// Each owner holds its own minter; nothing is shared process-wide.
pub struct IdMinter<R = StdRng> {
	clock: Arc<dyn Clock>,
	rng: R,
	suffix_len: usize,
}

impl IdMinter<StdRng> {
	/// Creates a minter seeded from OS entropy.
	pub fn new(clock: Arc<dyn Clock>) -> Self {
		Self::with_rng(clock, StdRng::from_entropy())
	}

	/// Creates a minter with a deterministic RNG.
	pub fn seeded(clock: Arc<dyn Clock>, seed: u64) -> Self {
		Self::with_rng(clock, StdRng::seed_from_u64(seed))
	}
}

impl<R> IdMinter<R>
where
	R: RngCore,
{
	/// Creates a minter from an explicit RNG.
	pub fn with_rng(clock: Arc<dyn Clock>, rng: R) -> Self {
		Self {
			clock,
			rng,
			suffix_len: MIN_SUFFIX_LEN,
		}
	}

	/// Sets the default suffix length, raised to [`MIN_SUFFIX_LEN`].
	#[must_use]
	pub fn with_suffix_len(mut self, suffix_len: usize) -> Self {
		self.suffix_len = suffix_len.max(MIN_SUFFIX_LEN);
		self
	}

	/// Default suffix length.
	pub fn suffix_len(&self) -> usize {
		self.suffix_len
	}

	/// Current reading of the injected clock.
	pub fn now_ms(&self) -> u64 {
		self.clock.now_ms()
	}

	/// Mints one legacy-form identifier with a random suffix at `time_ms`.
	pub fn mint_at(&mut self, time_ms: u64) -> MintedId {
		let suffix = self.random_suffix(self.suffix_len);
		MintedId {
			id: format!("{}{suffix}", encode_time(time_ms)),
			suffix,
			time_ms,
			tag: None,
		}
	}

	/// Mints one identifier according to `options`.
	pub fn mint(&mut self, options: MintOptions) -> Result<MintedId, IdError> {
		let time_ms = options.time_ms.unwrap_or_else(|| self.clock.now_ms());
		let length = options.length.unwrap_or(self.suffix_len).max(MIN_SUFFIX_LEN);

		let suffix = match (options.suffix, options.content) {
			(Some(suffix), _) => {
				if suffix.is_empty() || check_segment(&suffix).is_err() {
					return Err(IdError::InvalidSuffix(suffix));
				}
				suffix
			}
			(None, Some(content)) => hash_to_alphabet(&content, length),
			(None, None) => self.random_suffix(length),
		};

		let tag = options.tag.filter(|tag| !tag.is_empty());
		let time = encode_time(time_ms);
		let id = match &tag {
			None => format!("{time}{suffix}"),
			Some(tag) => {
				if check_segment(tag).is_err() {
					return Err(IdError::InvalidTag(tag.clone()));
				}
				format!("{time}{DELIMITER}{tag}{DELIMITER}{suffix}")
			}
		};

		Ok(MintedId { id, suffix, time_ms, tag })
	}

	fn random_suffix(&mut self, len: usize) -> String {
		let symbols = ALPHABET.as_bytes();
		(0..len).map(|_| symbols[self.rng.gen_range(0..symbols.len())] as char).collect()
	}
}

impl<R> std::fmt::Debug for IdMinter<R> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("IdMinter").field("suffix_len", &self.suffix_len).finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;
	use serde_json::json;

	use super::*;
	use crate::{ManualClock, decode};

	const T0: u64 = 1_700_000_000_000;

	fn minter() -> IdMinter {
		IdMinter::seeded(Arc::new(ManualClock::new(T0)), 7)
	}

	#[test]
	fn defaults_to_clock_time_and_legacy_form() {
		let minted = minter().mint(MintOptions::new()).unwrap();
		assert_eq!(minted.time_ms, T0);
		assert_eq!(minted.tag, None);
		assert_eq!(minted.id.len(), 8 + MIN_SUFFIX_LEN);
		assert!(minted.id.starts_with("0OkFuMW0"));
		let decoded = decode(&minted.id).unwrap();
		assert_eq!(decoded.time_ms, T0);
		assert_eq!(decoded.suffix, minted.suffix);
	}

	#[test]
	fn tagged_form_roundtrips() {
		let minted = minter().mint(MintOptions::new().tag("evt").at(T0 + 5)).unwrap();
		assert_eq!(minted.id, format!("{}-evt-{}", encode_time(T0 + 5), minted.suffix));
		let decoded = decode(&minted.id).unwrap();
		assert_eq!(decoded.tag.as_deref(), Some("evt"));
		assert_eq!(decoded.time_ms, T0 + 5);
	}

	#[test]
	fn empty_tag_uses_legacy_form() {
		let minted = minter().mint(MintOptions::new().tag("")).unwrap();
		assert_eq!(minted.tag, None);
		assert!(!minted.id.contains(DELIMITER));
	}

	#[test]
	fn explicit_suffix_wins_over_content() {
		let minted = minter().mint(MintOptions::new().suffix("fixedSuffix").content(json!({"a": 1}))).unwrap();
		assert_eq!(minted.suffix, "fixedSuffix");
	}

	#[test]
	fn content_suffix_is_deterministic() {
		let a = minter().mint(MintOptions::new().content(json!({"a": 1, "b": 2})).length(16)).unwrap();
		let b = IdMinter::seeded(Arc::new(ManualClock::new(T0)), 99)
			.mint(MintOptions::new().content(json!({"b": 2, "a": 1})).length(16))
			.unwrap();
		assert_eq!(a.suffix, "s4zJHmU6_ilAi6rN");
		assert_eq!(a.id, b.id);
	}

	#[test]
	fn short_length_is_raised_to_minimum() {
		let minted = minter().mint(MintOptions::new().length(4)).unwrap();
		assert_eq!(minted.suffix.len(), MIN_SUFFIX_LEN);
	}

	#[test]
	fn invalid_tag_and_suffix_are_rejected() {
		assert_eq!(
			minter().mint(MintOptions::new().tag("a-b")).unwrap_err(),
			IdError::InvalidTag("a-b".to_string())
		);
		assert_eq!(
			minter().mint(MintOptions::new().suffix("has space")).unwrap_err(),
			IdError::InvalidSuffix("has space".to_string())
		);
	}

	#[test]
	fn seeded_minters_are_reproducible() {
		assert_eq!(minter().mint_at(T0), minter().mint_at(T0));
		let mut m = minter();
		assert_ne!(m.mint_at(T0).suffix, m.mint_at(T0).suffix);
	}

	#[test]
	fn later_mints_sort_after_earlier_ones() {
		let mut m = minter();
		let earlier = m.mint_at(T0);
		let later = m.mint_at(T0 + 1);
		assert!(earlier.id < later.id);
	}
}
