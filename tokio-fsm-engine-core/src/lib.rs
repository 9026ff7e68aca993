//! Core runtime types for tokio-fsm-engine.

use std::fmt::Debug;
use std::hash::Hash;

/// A state of a finite state machine.
///
/// Blanket-implemented for every small, copyable, comparable type. States have
/// no meaning to the engine beyond identity and equality.
pub trait FsmState: Copy + Eq + Hash + Debug + Send + Sync + 'static {}

impl<T> FsmState for T where T: Copy + Eq + Hash + Debug + Send + Sync + 'static {}

/// An event that can be submitted to a finite state machine.
pub trait FsmEvent: Clone + Eq + Hash + Debug + Send + Sync + 'static {}

impl<T> FsmEvent for T where T: Clone + Eq + Hash + Debug + Send + Sync + 'static {}

/// Result of a single drain-and-dispatch pass of the event loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome<S, E> {
    /// The event matched a transition; its action completed and `to` is now the
    /// current state.
    Transitioned { from: S, event: E, to: S },
    /// No transition is registered for `event` in `state`. The state is
    /// unchanged.
    Unsupported { state: S, event: E },
    /// The queue was empty when polled (a spurious or redundant wake-up).
    Empty,
}

impl<S, E> DispatchOutcome<S, E> {
    /// Returns `true` if the pass found nothing to process.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

/// Shutdown mode for graceful or immediate termination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownMode {
    /// Graceful shutdown: process remaining events in the queue before
    /// terminating.
    Graceful,
    /// Immediate shutdown: finish the in-flight action, then terminate without
    /// processing remaining events.
    Immediate,
}

/// Fatal error raised by the event loop.
#[derive(Debug, thiserror::Error)]
pub enum FsmError<S, E, A> {
    /// A transition action failed. The machine stays in `state`.
    #[error("action for event {event:?} in state {state:?} failed: {error}")]
    ActionFailed { state: S, event: E, error: A },
}

impl<S, E, A> FsmError<S, E, A> {
    /// The state the machine was in when the failure happened.
    pub fn state(&self) -> &S {
        match self {
            Self::ActionFailed { state, .. } => state,
        }
    }

    /// Consumes the error, returning the action's own error value.
    pub fn into_action_error(self) -> A {
        match self {
            Self::ActionFailed { error, .. } => error,
        }
    }
}

/// Error type returned by the FSM task.
#[derive(Debug, thiserror::Error)]
pub enum TaskError<E> {
    /// The FSM terminated with a logical error.
    #[error("FSM error: {0}")]
    Fsm(E),
    /// The FSM task panicked or was cancelled.
    #[error("Task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}
