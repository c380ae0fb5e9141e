//! Bounded mailbox shared by all generations of one actor.

use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tokio::sync::mpsc;

/// Mailbox send error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MailboxSendError {
	/// Mailbox is closed.
	#[error("mailbox closed")]
	Closed,
	/// Queue is full and a non-blocking send was used.
	#[error("mailbox full")]
	Full,
}

/// Sending half. Closing drops the only long-lived channel sender, so the
/// receiver drains what is queued and then observes the end of the stream.
pub(crate) struct MailboxSender<T> {
	tx: Mutex<Option<mpsc::Sender<T>>>,
}

/// Receiving half, cloned into each actor generation.
pub(crate) struct MailboxReceiver<T> {
	rx: Arc<tokio::sync::Mutex<mpsc::Receiver<T>>>,
}

impl<T> Clone for MailboxReceiver<T> {
	fn clone(&self) -> Self {
		Self { rx: Arc::clone(&self.rx) }
	}
}

/// Creates a bounded mailbox.
///
/// # Panics
///
/// Panics if `capacity` is zero.
pub(crate) fn mailbox<T>(capacity: usize) -> (MailboxSender<T>, MailboxReceiver<T>) {
	assert!(capacity > 0, "mailbox capacity must be > 0");
	let (tx, rx) = mpsc::channel(capacity);
	(
		MailboxSender { tx: Mutex::new(Some(tx)) },
		MailboxReceiver {
			rx: Arc::new(tokio::sync::Mutex::new(rx)),
		},
	)
}

impl<T> MailboxSender<T> {
	fn sender(&self) -> Option<mpsc::Sender<T>> {
		self.tx.lock().unwrap_or_else(PoisonError::into_inner).clone()
	}

	/// Enqueues, waiting for capacity when full.
	pub(crate) async fn send(&self, msg: T) -> Result<(), MailboxSendError> {
		let tx = self.sender().ok_or(MailboxSendError::Closed)?;
		tx.send(msg).await.map_err(|_| MailboxSendError::Closed)
	}

	/// Enqueues without waiting.
	pub(crate) fn try_send(&self, msg: T) -> Result<(), MailboxSendError> {
		let tx = self.sender().ok_or(MailboxSendError::Closed)?;
		tx.try_send(msg).map_err(|err| match err {
			mpsc::error::TrySendError::Full(_) => MailboxSendError::Full,
			mpsc::error::TrySendError::Closed(_) => MailboxSendError::Closed,
		})
	}

	/// Stops accepting new messages.
	pub(crate) fn close(&self) {
		self.tx.lock().unwrap_or_else(PoisonError::into_inner).take();
	}
}

impl<T> MailboxReceiver<T> {
	/// Receives the next message; `None` once closed and drained.
	pub(crate) async fn recv(&self) -> Option<T> {
		self.rx.lock().await.recv().await
	}
}
