use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::token::GenerationToken;

/// Continuation directive returned by [`Actor::handle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorFlow {
	/// Keep processing commands.
	Continue,
	/// Stop this actor instance.
	Stop,
}

/// A single-writer unit of state driven by a supervisor.
///
/// A fresh instance is built from the [`ActorSpec`](crate::ActorSpec) factory
/// on every (re)start, so anything that must survive a restart belongs in
/// shared state captured by the factory, not in `self`.
#[async_trait]
pub trait Actor: Send + 'static {
	type Cmd: Send + 'static;
	type Evt: Clone + Send + 'static;

	async fn on_start(&mut self, _ctx: &mut ActorContext<Self::Evt>) -> Result<(), String> {
		Ok(())
	}

	async fn on_stop(&mut self, _ctx: &mut ActorContext<Self::Evt>) {}

	async fn handle(&mut self, cmd: Self::Cmd, ctx: &mut ActorContext<Self::Evt>) -> Result<ActorFlow, String>;
}

/// Per-generation execution context.
pub struct ActorContext<Evt> {
	events: broadcast::Sender<Evt>,
	token: GenerationToken,
}

impl<Evt> ActorContext<Evt>
where
	Evt: Clone + Send + 'static,
{
	pub(crate) fn new(events: broadcast::Sender<Evt>, token: GenerationToken) -> Self {
		Self { events, token }
	}

	/// Broadcasts an event; dropped silently when nobody subscribes.
	pub fn emit(&self, evt: Evt) {
		let _ = self.events.send(evt);
	}

	pub fn generation(&self) -> u64 {
		self.token.generation()
	}
}

/// Public exit classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ActorExitKind {
	Stopped,
	MailboxClosed,
	Cancelled,
	StartupFailed,
	HandlerFailed,
	Panicked,
}

/// Exit summary of the most recent actor instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorExit {
	kind: ActorExitKind,
	message: Option<String>,
}

impl ActorExit {
	pub fn kind(&self) -> ActorExitKind {
		self.kind
	}

	pub fn message(&self) -> Option<&str> {
		self.message.as_deref()
	}

	pub fn is_failure(&self) -> bool {
		matches!(self.kind, ActorExitKind::StartupFailed | ActorExitKind::HandlerFailed | ActorExitKind::Panicked)
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ActorExitReason {
	Stopped,
	MailboxClosed,
	Cancelled,
	StartupFailed(String),
	HandlerFailed(String),
	Panicked,
}

impl ActorExitReason {
	pub(crate) fn is_failure(&self) -> bool {
		matches!(self, Self::StartupFailed(_) | Self::HandlerFailed(_) | Self::Panicked)
	}
}

impl From<&ActorExitReason> for ActorExit {
	fn from(reason: &ActorExitReason) -> Self {
		let (kind, message) = match reason {
			ActorExitReason::Stopped => (ActorExitKind::Stopped, None),
			ActorExitReason::MailboxClosed => (ActorExitKind::MailboxClosed, None),
			ActorExitReason::Cancelled => (ActorExitKind::Cancelled, None),
			ActorExitReason::StartupFailed(msg) => (ActorExitKind::StartupFailed, Some(msg.clone())),
			ActorExitReason::HandlerFailed(msg) => (ActorExitKind::HandlerFailed, Some(msg.clone())),
			ActorExitReason::Panicked => (ActorExitKind::Panicked, None),
		};
		Self { kind, message }
	}
}
