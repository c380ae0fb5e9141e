//! Sortable base-64 timestamp codec.

use crate::IdError;

/// Identifier alphabet, in ASCII order so byte-wise comparison matches digit order.
///
/// Contains no `-`, which is reserved as the tagged-form delimiter.
pub const ALPHABET: &str = "0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ_abcdefghijklmnopqrstuvwxyz~";

/// Width of an encoded time segment.
pub const TIME_LEN: usize = 8;

/// Largest encodable timestamp (`64^8 - 1` ms). Larger inputs saturate.
pub const MAX_TIME_MS: u64 = (1 << (6 * TIME_LEN)) - 1;

const INVALID: u8 = u8::MAX;

/// Reverse lookup from ASCII byte to digit value.
const DIGITS: [u8; 128] = {
	let mut table = [INVALID; 128];
	let bytes = ALPHABET.as_bytes();
	let mut i = 0;
	while i < bytes.len() {
		table[bytes[i] as usize] = i as u8;
		i += 1;
	}
	table
};

fn digit(byte: u8) -> Option<u64> {
	match DIGITS.get(byte as usize) {
		Some(&d) if d != INVALID => Some(u64::from(d)),
		_ => None,
	}
}

/// Returns `true` if `ch` belongs to [`ALPHABET`].
pub fn is_alphabet_char(ch: char) -> bool {
	ch.is_ascii() && digit(ch as u8).is_some()
}

/// Encodes a millisecond timestamp as [`TIME_LEN`] big-endian base-64 digits.
pub fn encode_time(ms: u64) -> String {
	let mut value = ms.min(MAX_TIME_MS);
	let alphabet = ALPHABET.as_bytes();
	let mut out = [0u8; TIME_LEN];
	for slot in out.iter_mut().rev() {
		*slot = alphabet[(value & 63) as usize];
		value >>= 6;
	}
	out.iter().map(|&b| b as char).collect()
}

/// Decodes a time segment produced by [`encode_time`].
pub fn decode_time(segment: &str) -> Result<u64, IdError> {
	if segment.len() != TIME_LEN {
		return Err(IdError::TimeLength {
			expected: TIME_LEN,
			len: segment.len(),
		});
	}
	segment.bytes().enumerate().try_fold(0u64, |acc, (index, byte)| {
		let d = digit(byte).ok_or_else(|| IdError::InvalidChar {
			ch: segment[index..].chars().next().unwrap_or(char::REPLACEMENT_CHARACTER),
			index,
		})?;
		Ok((acc << 6) | d)
	})
}
