//! Runtime configuration loaded from TOML.
//!
//! ```toml
//! session_timeout_secs = 1800
//! suffix_len = 12
//! state_ttl_secs = 604800
//! owner_timeout_ms = 2000
//! mailbox_capacity = 64
//! ```
//!
//! Bad values never fail the load: they are replaced by defaults and reported
//! in [`BeaconConfig::warnings`].

use std::path::Path;
use std::time::Duration;

use beacon_ids::MIN_SUFFIX_LEN;

use crate::error::{ConfigError, ConfigWarning, Result};

/// Tunables for the identity service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeaconConfig {
	/// Inactivity after which the session id rotates.
	pub session_timeout: Duration,
	/// Random suffix length of minted ids.
	pub suffix_len: usize,
	/// Inactivity after which an owner's stored state is deleted.
	pub state_ttl: Duration,
	/// How long the router waits for an owner before falling back.
	pub owner_timeout: Duration,
	pub mailbox_capacity: usize,
	/// Non-fatal problems found while loading.
	pub warnings: Vec<ConfigWarning>,
}

impl Default for BeaconConfig {
	fn default() -> Self {
		Self {
			session_timeout: Duration::from_secs(30 * 60),
			suffix_len: MIN_SUFFIX_LEN,
			state_ttl: Duration::from_secs(7 * 24 * 60 * 60),
			owner_timeout: Duration::from_secs(2),
			mailbox_capacity: 64,
			warnings: Vec::new(),
		}
	}
}

impl BeaconConfig {
	/// Parses a TOML document.
	pub fn from_toml_str(input: &str) -> Result<Self> {
		let table: toml::Table = toml::from_str(input)?;
		let mut config = Self::default();
		let mut warnings = Vec::new();

		for (key, value) in &table {
			let read = |min: u64, warnings: &mut Vec<ConfigWarning>| positive_int(key, value, min, warnings);
			match key.as_str() {
				"session_timeout_secs" => {
					if let Some(secs) = read(1, &mut warnings) {
						config.session_timeout = Duration::from_secs(secs);
					}
				}
				"suffix_len" => {
					if let Some(len) = read(MIN_SUFFIX_LEN as u64, &mut warnings).and_then(|len| usize::try_from(len).ok()) {
						config.suffix_len = len;
					}
				}
				"state_ttl_secs" => {
					if let Some(secs) = read(1, &mut warnings) {
						config.state_ttl = Duration::from_secs(secs);
					}
				}
				"owner_timeout_ms" => {
					if let Some(ms) = read(1, &mut warnings) {
						config.owner_timeout = Duration::from_millis(ms);
					}
				}
				"mailbox_capacity" => {
					if let Some(capacity) = read(1, &mut warnings).and_then(|capacity| usize::try_from(capacity).ok()) {
						config.mailbox_capacity = capacity;
					}
				}
				_ => warnings.push(ConfigWarning {
					key: key.clone(),
					message: "unknown key ignored".into(),
				}),
			}
		}

		config.warnings = warnings;
		Ok(config)
	}

	/// Loads configuration from a file.
	pub fn load(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		let content = std::fs::read_to_string(path).map_err(|error| ConfigError::Io {
			path: path.to_path_buf(),
			error,
		})?;
		Self::from_toml_str(&content)
	}
}

fn positive_int(key: &str, value: &toml::Value, min: u64, warnings: &mut Vec<ConfigWarning>) -> Option<u64> {
	let parsed = match value {
		toml::Value::Integer(n) => u64::try_from(*n).ok().filter(|n| *n >= min),
		toml::Value::String(s) => s.trim().parse::<u64>().ok().filter(|n| *n >= min),
		_ => None,
	};
	if parsed.is_none() {
		warnings.push(ConfigWarning {
			key: key.to_owned(),
			message: format!("expected an integer >= {min}, got {value}; using default"),
		});
	}
	parsed
}
