//! Deterministic, order-independent hashing of structured data.
//!
//! The algorithm is fixed and pinned by test vectors: four 32-bit lanes are
//! updated per input byte of the canonical string, cross-mixed once at the
//! end, and each output character draws six bits from lane `i % 4`, re-mixing
//! that lane after use. Changing any constant changes every stored lookup key.
//! Not suitable for authentication or integrity checks.

use serde::Serialize;
use serde_json::Value;

use crate::mint::MIN_SUFFIX_LEN;
use crate::{ALPHABET, HashError};

const SEEDS: [u32; 4] = [0x6a09_e667, 0xbb67_ae85, 0x3c6e_f372, 0xa54f_f53a];
const MULTIPLIERS: [u32; 4] = [0x239b_961b, 0xab0e_9789, 0x38b3_4ae5, 0xa1e3_8b93];
const OUTPUT_MIX: u32 = 0x85eb_ca6b;

/// Emitted for `null`; JSON escaping keeps it out of every other literal.
const NULL_SENTINEL: char = '\u{0}';

/// Serializes a JSON value with object keys sorted.
///
/// Arrays keep their order. Strings are JSON-quoted, numbers and booleans use
/// their JSON literal form, and `null` becomes a NUL sentinel.
pub fn canonical_string(value: &Value) -> String {
	let mut out = String::new();
	write_canonical(value, &mut out);
	out
}

fn write_canonical(value: &Value, out: &mut String) {
	match value {
		Value::Null => out.push(NULL_SENTINEL),
		Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
		Value::Number(n) => out.push_str(&n.to_string()),
		Value::String(s) => write_quoted(s, out),
		Value::Array(items) => {
			out.push('[');
			for (i, item) in items.iter().enumerate() {
				if i > 0 {
					out.push(',');
				}
				write_canonical(item, out);
			}
			out.push(']');
		}
		Value::Object(map) => {
			let mut entries: Vec<(&String, &Value)> = map.iter().collect();
			entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
			out.push('{');
			for (i, (key, item)) in entries.into_iter().enumerate() {
				if i > 0 {
					out.push(',');
				}
				write_quoted(key, out);
				out.push(':');
				write_canonical(item, out);
			}
			out.push('}');
		}
	}
}

fn write_quoted(s: &str, out: &mut String) {
	out.push_str(&Value::from(s).to_string());
}

fn mix_lanes(input: &[u8]) -> [u32; 4] {
	let [mut h1, mut h2, mut h3, mut h4] = SEEDS;
	let [m1, m2, m3, m4] = MULTIPLIERS;
	for &byte in input {
		let k = u32::from(byte);
		h1 = h2 ^ (h1 ^ k).wrapping_mul(m1);
		h2 = h3 ^ (h2 ^ k).wrapping_mul(m2);
		h3 = h4 ^ (h3 ^ k).wrapping_mul(m3);
		h4 = h1 ^ (h4 ^ k).wrapping_mul(m4);
	}
	h1 = (h3 ^ (h1 >> 18)).wrapping_mul(m1);
	h2 = (h4 ^ (h2 >> 22)).wrapping_mul(m2);
	h3 = (h1 ^ (h3 >> 17)).wrapping_mul(m3);
	h4 = (h2 ^ (h4 >> 19)).wrapping_mul(m4);
	h1 ^= h2 ^ h3 ^ h4;
	h2 ^= h1;
	h3 ^= h1;
	h4 ^= h1;
	[h1, h2, h3, h4]
}

fn validate_alphabet(alphabet: &str) -> Result<&[u8], HashError> {
	let bytes = alphabet.as_bytes();
	let mut seen = [false; 128];
	let distinct_ascii = bytes.len() == 64
		&& bytes.iter().all(|&b| {
			let fresh = b.is_ascii() && !seen[b as usize];
			if b.is_ascii() {
				seen[b as usize] = true;
			}
			fresh
		});
	if distinct_ascii {
		Ok(bytes)
	} else {
		Err(HashError::Alphabet {
			len: alphabet.chars().count(),
		})
	}
}

/// Hashes an already-built JSON value to `length` characters of `alphabet`.
///
/// Lengths below [`MIN_SUFFIX_LEN`] are raised to it.
pub fn hash_canonical(value: &Value, length: usize, alphabet: &str) -> Result<String, HashError> {
	let symbols = validate_alphabet(alphabet)?;
	Ok(render(value, length, symbols))
}

/// [`hash_canonical`] over [`ALPHABET`], which needs no validation.
pub fn hash_to_alphabet(value: &Value, length: usize) -> String {
	render(value, length, ALPHABET.as_bytes())
}

fn render(value: &Value, length: usize, symbols: &[u8]) -> String {
	let mut lanes = mix_lanes(canonical_string(value).as_bytes());
	let length = length.max(MIN_SUFFIX_LEN);
	let mut out = String::with_capacity(length);
	for i in 0..length {
		let lane = &mut lanes[i % 4];
		out.push(symbols[(*lane & 63) as usize] as char);
		*lane = ((*lane ^ (*lane >> 16)).wrapping_mul(OUTPUT_MIX)).rotate_left(6);
	}
	out
}

/// Hashes any serializable value; see [`hash_canonical`].
pub fn hash_value<T>(value: &T, length: usize, alphabet: &str) -> Result<String, HashError>
where
	T: Serialize + ?Sized,
{
	let value = serde_json::to_value(value)?;
	hash_canonical(&value, length, alphabet)
}
