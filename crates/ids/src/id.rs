//! Identifier parsing for the legacy and tagged serialization forms.

use crate::IdError;
use crate::codec::{TIME_LEN, decode_time, is_alphabet_char};

/// Separator between time, tag and suffix in the tagged form.
pub const DELIMITER: char = '-';

/// Parts recovered from a well-formed identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DecodedId {
	/// Embedded creation time in UNIX milliseconds.
	pub time_ms: u64,
	/// Type tag, present only for the tagged form.
	pub tag: Option<String>,
	/// Random or content-derived suffix.
	pub suffix: String,
}

/// Validates that every character of `segment` is in the alphabet.
pub(crate) fn check_segment(segment: &str) -> Result<(), IdError> {
	match segment.char_indices().find(|&(_, ch)| !is_alphabet_char(ch)) {
		Some((index, ch)) => Err(IdError::InvalidChar { ch, index }),
		None => Ok(()),
	}
}

/// Parses either serialization form.
///
/// The delimited form is attempted first whenever the input contains
/// [`DELIMITER`]; since the alphabet excludes the delimiter, a legacy
/// identifier never contains one.
pub fn decode(id: &str) -> Result<DecodedId, IdError> {
	if id.is_empty() {
		return Err(IdError::Empty);
	}

	if id.contains(DELIMITER) {
		let parts: Vec<&str> = id.split(DELIMITER).collect();
		let [time, tag, suffix] = parts.as_slice() else {
			return Err(IdError::DelimiterCount { parts: parts.len() });
		};
		let time_ms = decode_time(time)?;
		if tag.is_empty() || check_segment(tag).is_err() {
			return Err(IdError::InvalidTag((*tag).to_string()));
		}
		if suffix.is_empty() || check_segment(suffix).is_err() {
			return Err(IdError::InvalidSuffix((*suffix).to_string()));
		}
		return Ok(DecodedId {
			time_ms,
			tag: Some((*tag).to_string()),
			suffix: (*suffix).to_string(),
		});
	}

	if id.len() <= TIME_LEN {
		return Err(IdError::TooShort { len: id.len() });
	}
	check_segment(id)?;
	let (time, suffix) = id.split_at(TIME_LEN);
	Ok(DecodedId {
		time_ms: decode_time(time)?,
		tag: None,
		suffix: suffix.to_string(),
	})
}
