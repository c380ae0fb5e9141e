use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio_util::sync::CancellationToken;

/// Monotonic generation counter for one supervised actor.
#[derive(Debug, Default, Clone)]
pub(crate) struct GenerationClock {
	next: Arc<AtomicU64>,
}

impl GenerationClock {
	pub(crate) fn new() -> Self {
		Self::default()
	}

	/// Returns the next generation, starting at 1.
	pub(crate) fn next(&self) -> u64 {
		self.next.fetch_add(1, Ordering::AcqRel).wrapping_add(1)
	}
}

/// Cancellation scoped to one actor generation.
#[derive(Debug, Clone)]
pub(crate) struct GenerationToken {
	generation: u64,
	cancel: CancellationToken,
}

impl GenerationToken {
	pub(crate) fn new(generation: u64, cancel: CancellationToken) -> Self {
		Self { generation, cancel }
	}

	pub(crate) const fn generation(&self) -> u64 {
		self.generation
	}

	pub(crate) async fn cancelled(&self) {
		self.cancel.cancelled().await;
	}
}
