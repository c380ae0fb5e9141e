use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of the current UNIX time in milliseconds.
pub trait Clock: Send + Sync + 'static {
	/// Returns the current time in milliseconds since the UNIX epoch.
	fn now_ms(&self) -> u64;
}

/// Wall clock backed by [`SystemTime`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
	fn now_ms(&self) -> u64 {
		// A clock set before 1970 reads as the epoch.
		SystemTime::now()
			.duration_since(UNIX_EPOCH)
			.map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
			.unwrap_or(0)
	}
}

/// Manually driven clock shared between clones.
#[derive(Debug, Default, Clone)]
pub struct ManualClock {
	now: Arc<AtomicU64>,
}

impl ManualClock {
	/// Creates a clock reading `now_ms`.
	pub fn new(now_ms: u64) -> Self {
		Self {
			now: Arc::new(AtomicU64::new(now_ms)),
		}
	}

	/// Sets the current reading.
	pub fn set(&self, now_ms: u64) {
		self.now.store(now_ms, Ordering::Release);
	}

	/// Moves the clock forward by `delta_ms`.
	pub fn advance(&self, delta_ms: u64) {
		self.now.fetch_add(delta_ms, Ordering::AcqRel);
	}
}

impl Clock for ManualClock {
	fn now_ms(&self) -> u64 {
		self.now.load(Ordering::Acquire)
	}
}
