//! Session lifecycle runtime.
//!
//! [`orchestrator::LifecycleOrchestrator`] composes the session store, the
//! transcript archive and the collaborators below into the reset, delete,
//! compact, abort and restart operations.

pub mod abort_flags;
pub mod collaborators;
pub mod hooks;
pub mod listings;
pub mod orchestrator;
pub mod queue;
pub mod restart;
pub mod runs;
pub mod subagents;

pub use collaborators::{
    Collaborators, HookEvent, HookKind, HookNotifier, QueueCanceller, QueueClearCounts,
    RunController, SubprocessStopper,
};
pub use orchestrator::LifecycleOrchestrator;
