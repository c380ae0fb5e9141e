//! Error types for identifier decoding, minting and hashing.

use thiserror::Error;

/// Reasons an identifier or one of its segments is invalid.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
	/// The input was empty.
	#[error("identifier is empty")]
	Empty,

	/// The input is shorter than a time segment plus one suffix character.
	#[error("identifier too short: {len} characters")]
	TooShort {
		/// Length of the rejected input.
		len: usize,
	},

	/// A time segment was not exactly [`crate::TIME_LEN`] characters.
	#[error("time segment must be {expected} characters, got {len}")]
	TimeLength {
		/// Required segment length.
		expected: usize,
		/// Actual segment length.
		len: usize,
	},

	/// A character outside the identifier alphabet.
	#[error("invalid character {ch:?} at byte {index}")]
	InvalidChar {
		/// The offending character.
		ch: char,
		/// Byte offset within the inspected segment.
		index: usize,
	},

	/// The delimited form must have exactly three parts.
	#[error("expected 3 delimited parts, got {parts}")]
	DelimiterCount {
		/// Number of parts found.
		parts: usize,
	},

	/// The tag segment is empty or contains characters outside the alphabet.
	#[error("invalid tag: {0:?}")]
	InvalidTag(String),

	/// The suffix segment is empty or contains characters outside the alphabet.
	#[error("invalid suffix: {0:?}")]
	InvalidSuffix(String),
}

/// Errors raised while hashing structured data.
#[derive(Debug, Error)]
pub enum HashError {
	/// The value could not be converted into a JSON data model.
	#[error("value is not serializable: {0}")]
	Serialize(#[from] serde_json::Error),

	/// The output alphabet is not 64 distinct ASCII symbols.
	#[error("alphabet must be 64 distinct ASCII symbols, got {len} characters")]
	Alphabet {
		/// Length of the rejected alphabet in characters.
		len: usize,
	},
}
