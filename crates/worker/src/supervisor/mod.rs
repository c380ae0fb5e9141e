use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;

use crate::actor::{Actor, ActorContext, ActorExit, ActorExitReason, ActorFlow};
use crate::mailbox::{MailboxReceiver, MailboxSendError, MailboxSender, mailbox};
use crate::token::{GenerationClock, GenerationToken};
use crate::{TaskClass, spawn};


/// Supervisor restart policy.
#[derive(Debug, Clone)]
pub enum RestartPolicy {
	Never,
	OnFailure { max_restarts: usize, backoff: Duration },
}

impl RestartPolicy {
	fn restart_delay(&self, reason: &ActorExitReason, restart_count: usize) -> Option<Duration> {
		match self {
			Self::Never => None,
			Self::OnFailure { max_restarts, backoff } => (reason.is_failure() && restart_count < *max_restarts).then_some(*backoff),
		}
	}
}

impl Default for RestartPolicy {
	fn default() -> Self {
		Self::OnFailure {
			max_restarts: 3,
			backoff: Duration::from_millis(50),
		}
	}
}

/// Builder for one supervised actor.
pub struct ActorSpec<A>
where
	A: Actor,
{
	name: String,
	class: TaskClass,
	mailbox_capacity: usize,
	event_buffer: usize,
	restart: RestartPolicy,
	factory: Arc<dyn Fn() -> A + Send + Sync>,
}

impl<A> ActorSpec<A>
where
	A: Actor,
{
	pub fn new(name: impl Into<String>, class: TaskClass, factory: impl Fn() -> A + Send + Sync + 'static) -> Self {
		Self {
			name: name.into(),
			class,
			mailbox_capacity: 128,
			event_buffer: 128,
			restart: RestartPolicy::default(),
			factory: Arc::new(factory),
		}
	}

	/// # Panics
	///
	/// Panics if `capacity` is zero.
	#[must_use]
	pub fn mailbox_capacity(mut self, capacity: usize) -> Self {
		assert!(capacity > 0, "mailbox capacity must be > 0");
		self.mailbox_capacity = capacity;
		self
	}

	/// # Panics
	///
	/// Panics if `size` is zero.
	#[must_use]
	pub fn event_buffer(mut self, size: usize) -> Self {
		assert!(size > 0, "event buffer size must be > 0");
		self.event_buffer = size;
		self
	}

	#[must_use]
	pub fn restart(mut self, restart: RestartPolicy) -> Self {
		self.restart = restart;
		self
	}
}

/// Shutdown mode for supervised actors.
#[derive(Debug, Clone, Copy)]
pub enum ShutdownMode {
	/// Cancel the running instance and drop queued commands.
	Immediate,
	/// Close the mailbox, let queued commands drain, cancel on timeout.
	Graceful { timeout: Duration },
}

/// Outcome of [`ActorHandle::shutdown`].
#[derive(Debug, Clone)]
pub struct ShutdownReport {
	completed: bool,
	last_exit: Option<ActorExit>,
}

impl ShutdownReport {
	pub fn completed(&self) -> bool {
		self.completed
	}

	pub fn timed_out(&self) -> bool {
		!self.completed
	}

	pub fn last_exit(&self) -> Option<&ActorExit> {
		self.last_exit.as_ref()
	}
}

/// Error returned when a command cannot be enqueued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ActorSendError {
	#[error("actor mailbox closed")]
	Closed,
	#[error("actor mailbox full")]
	Full,
}

impl From<MailboxSendError> for ActorSendError {
	fn from(err: MailboxSendError) -> Self {
		match err {
			MailboxSendError::Closed => Self::Closed,
			MailboxSendError::Full => Self::Full,
		}
	}
}

#[derive(Default)]
struct ActorState {
	generation: AtomicU64,
	restarts: AtomicUsize,
	last_exit: Mutex<Option<ActorExitReason>>,
}

impl ActorState {
	fn record_exit(&self, reason: ActorExitReason) {
		*self.last_exit.lock().unwrap_or_else(PoisonError::into_inner) = Some(reason);
	}
}

/// Handle for one supervised actor. Dropping it cancels the actor.
pub struct ActorHandle<Cmd, Evt>
where
	Cmd: Send + 'static,
	Evt: Clone + Send + 'static,
{
	name: String,
	tx: MailboxSender<Cmd>,
	events: broadcast::Sender<Evt>,
	cancel: CancellationToken,
	state: Arc<ActorState>,
	done: watch::Receiver<bool>,
}

impl<Cmd, Evt> Drop for ActorHandle<Cmd, Evt>
where
	Cmd: Send + 'static,
	Evt: Clone + Send + 'static,
{
	fn drop(&mut self) {
		self.cancel.cancel();
		self.tx.close();
	}
}

impl<Cmd, Evt> ActorHandle<Cmd, Evt>
where
	Cmd: Send + 'static,
	Evt: Clone + Send + 'static,
{
	pub fn name(&self) -> &str {
		&self.name
	}

	/// Generation of the current (or last) instance, starting at 1.
	pub fn generation(&self) -> u64 {
		self.state.generation.load(Ordering::Acquire)
	}

	pub fn restart_count(&self) -> usize {
		self.state.restarts.load(Ordering::Acquire)
	}

	pub fn subscribe(&self) -> broadcast::Receiver<Evt> {
		self.events.subscribe()
	}

	/// Enqueues a command, waiting for mailbox capacity.
	pub async fn send(&self, cmd: Cmd) -> Result<(), ActorSendError> {
		self.tx.send(cmd).await?;
		Ok(())
	}

	/// Enqueues a command without waiting.
	pub fn try_send(&self, cmd: Cmd) -> Result<(), ActorSendError> {
		self.tx.try_send(cmd)?;
		Ok(())
	}

	/// Whether the supervisor has stopped for good.
	pub fn is_finished(&self) -> bool {
		*self.done.borrow()
	}

	/// Requests cancellation and closes the mailbox so later sends fail fast.
	pub fn cancel(&self) {
		self.cancel.cancel();
		self.tx.close();
	}

	pub fn last_exit(&self) -> Option<ActorExit> {
		self.state.last_exit.lock().unwrap_or_else(PoisonError::into_inner).as_ref().map(ActorExit::from)
	}

	pub async fn shutdown(&self, mode: ShutdownMode) -> ShutdownReport {
		let completed = match mode {
			ShutdownMode::Immediate => {
				self.cancel();
				self.wait_finished().await;
				true
			}
			ShutdownMode::Graceful { timeout } => {
				self.tx.close();
				let completed = tokio::time::timeout(timeout, self.wait_finished()).await.is_ok();
				if !completed {
					tracing::warn!(actor = %self.name, "graceful shutdown timed out; cancelling");
					self.cancel.cancel();
				}
				completed
			}
		};
		ShutdownReport {
			completed,
			last_exit: self.last_exit(),
		}
	}

	async fn wait_finished(&self) {
		let mut done = self.done.clone();
		// Err means the supervisor task is gone, which is also finished.
		let _ = done.wait_for(|finished| *finished).await;
	}
}

/// Spawns a supervised actor.
///
/// Instances run one after another inside a single supervisor task, each on
/// its own child task so panics are observed as [`ActorExitKind::Panicked`](crate::ActorExitKind::Panicked).
pub fn spawn_supervised_actor<A>(spec: ActorSpec<A>) -> ActorHandle<A::Cmd, A::Evt>
where
	A: Actor,
{
	let (tx, rx) = mailbox(spec.mailbox_capacity);
	let (events, _) = broadcast::channel(spec.event_buffer);
	let (done_tx, done) = watch::channel(false);
	let cancel = CancellationToken::new();
	let state = Arc::new(ActorState::default());

	let task_state = Arc::clone(&state);
	let task_cancel = cancel.clone();
	let task_events = events.clone();
	let ActorSpec {
		name,
		class,
		restart,
		factory,
		..
	} = spec;
	let task_name = name.clone();
	let generation = GenerationClock::new();

	spawn(class, async move {
		let mut restart_count = 0usize;
		loop {
			if task_cancel.is_cancelled() {
				task_state.record_exit(ActorExitReason::Cancelled);
				break;
			}

			let gen_id = generation.next();
			task_state.generation.store(gen_id, Ordering::Release);
			let token = GenerationToken::new(gen_id, task_cancel.child_token());
			let child = spawn(class, run_actor_instance((factory)(), rx.clone(), task_events.clone(), token));
			let reason = match child.await {
				Ok(reason) => reason,
				Err(err) if err.is_panic() => ActorExitReason::Panicked,
				Err(_) => ActorExitReason::Cancelled,
			};
			task_state.record_exit(reason.clone());

			tracing::debug!(
				actor = %task_name,
				class = class.as_str(),
				generation = gen_id,
				restarts = restart_count,
				reason = ?reason,
				"worker.actor.exit"
			);

			if task_cancel.is_cancelled() {
				break;
			}
			let Some(backoff) = restart.restart_delay(&reason, restart_count) else {
				break;
			};

			restart_count += 1;
			task_state.restarts.store(restart_count, Ordering::Release);
			if !backoff.is_zero() {
				tokio::select! {
					_ = task_cancel.cancelled() => {
						task_state.record_exit(ActorExitReason::Cancelled);
						break;
					}
					_ = tokio::time::sleep(backoff) => {}
				}
			}
		}
		done_tx.send_replace(true);
	});

	ActorHandle {
		name,
		tx,
		events,
		cancel,
		state,
		done,
	}
}

async fn run_actor_instance<A>(mut actor: A, rx: MailboxReceiver<A::Cmd>, events: broadcast::Sender<A::Evt>, token: GenerationToken) -> ActorExitReason
where
	A: Actor,
{
	let mut ctx = ActorContext::new(events, token.clone());

	let started = tokio::select! {
		biased;
		_ = token.cancelled() => return ActorExitReason::Cancelled,
		res = actor.on_start(&mut ctx) => res,
	};
	if let Err(err) = started {
		return ActorExitReason::StartupFailed(err);
	}

	let reason = loop {
		let cmd = tokio::select! {
			biased;
			_ = token.cancelled() => break ActorExitReason::Cancelled,
			msg = rx.recv() => match msg {
				Some(cmd) => cmd,
				None => break ActorExitReason::MailboxClosed,
			},
		};

		let flow = tokio::select! {
			biased;
			_ = token.cancelled() => break ActorExitReason::Cancelled,
			res = actor.handle(cmd, &mut ctx) => res,
		};

		match flow {
			Ok(ActorFlow::Continue) => {}
			Ok(ActorFlow::Stop) => break ActorExitReason::Stopped,
			Err(err) => break ActorExitReason::HandlerFailed(err),
		}
	};

	actor.on_stop(&mut ctx).await;
	reason
}
