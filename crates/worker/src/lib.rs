//! Supervised actor runtime.
//!
//! # Purpose
//!
//! - Run one single-threaded actor per named unit of state, so every mutation of that state is serialized by its mailbox.
//! - Restart failed actors under a bounded policy while keeping the mailbox (queued commands survive a restart).
//! - Provide cancel-aware shutdown and an event stream per actor.
//!
//! # Mental model
//!
//! - An [`ActorSpec`] names an actor and carries a factory; each restart builds a fresh instance from the factory.
//! - [`spawn_supervised_actor`] returns an [`ActorHandle`], the only way to reach the actor.
//! - Commands are processed strictly one at a time in arrival order.
//! - Actors are told to stop by returning [`ActorFlow::Stop`], by mailbox closure, or by cancellation.
//!
//! # Invariants
//!
//! 1. At most one instance of an actor runs at any time.
//!    - Enforced in: `spawn_supervised_actor` (instances run sequentially inside one supervisor task)
//!    - Tested by: `supervisor::tests::supervisor_restarts_on_handler_failure`
//! 2. After [`ActorHandle::cancel`], sends fail fast and no restart happens.
//!    - Enforced in: `ActorHandle::cancel`
//!    - Tested by: `supervisor::tests::send_after_cancel_is_rejected`

mod actor;
mod class;
mod mailbox;
mod spawn;
mod supervisor;
mod token;

pub use actor::{Actor, ActorContext, ActorExit, ActorExitKind, ActorFlow};
pub use class::TaskClass;
pub use mailbox::MailboxSendError;
pub use spawn::spawn;
pub use supervisor::{ActorHandle, ActorSendError, ActorSpec, RestartPolicy, ShutdownMode, ShutdownReport, spawn_supervised_actor};
