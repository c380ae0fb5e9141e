//! Error types for storage, state owners and configuration.

use std::fmt;
use std::path::PathBuf;

use beacon_worker::ActorSendError;
use thiserror::Error;

/// Errors from a [`StateStore`](crate::store::StateStore).
#[derive(Debug, Error)]
pub enum StoreError {
	/// Filesystem failure.
	#[error("I/O error on {path}: {error}")]
	Io {
		path: PathBuf,
		#[source]
		error: std::io::Error,
	},

	/// Stored document could not be encoded or decoded.
	#[error("state serialization failed: {0}")]
	Serialize(#[from] serde_json::Error),

	/// Backend refused the operation.
	#[error("store unavailable: {0}")]
	Unavailable(String),
}

impl StoreError {
	pub(crate) fn io(path: impl Into<PathBuf>, error: std::io::Error) -> Self {
		Self::Io { path: path.into(), error }
	}
}

/// Failure reported by a state owner in reply to a request.
#[derive(Debug, Error)]
pub enum OwnerError {
	#[error(transparent)]
	Store(#[from] StoreError),
}

/// Why the router served a degraded context.
#[derive(Debug, Error)]
pub enum RouteError {
	#[error("could not open state for owner: {0}")]
	Open(#[source] StoreError),

	#[error("owner unreachable: {0}")]
	Send(#[from] ActorSendError),

	#[error("owner did not answer within {0:?}")]
	Timeout(std::time::Duration),

	#[error("owner dropped the reply")]
	Dropped,

	#[error(transparent)]
	Owner(#[from] OwnerError),
}

/// Errors that make a configuration file unusable.
#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("I/O error reading {path}: {error}")]
	Io {
		path: PathBuf,
		#[source]
		error: std::io::Error,
	},

	#[error("TOML parse error: {0}")]
	Toml(#[from] toml::de::Error),
}

/// Result type for configuration loading.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// A configuration value that was ignored in favour of its default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
	pub key: String,
	pub message: String,
}

impl fmt::Display for ConfigWarning {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}: {}", self.key, self.message)
	}
}
