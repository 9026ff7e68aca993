//! Producer-side handle and the spawned event-loop task.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::sync::watch;
use tokio_fsm_engine_core::{FsmError, FsmEvent, FsmState, ShutdownMode, TaskError};

use crate::engine::Shared;

/// Cloneable handle used to submit events to a [`Fsm`](crate::Fsm) and observe
/// its state from any thread or task.
pub struct FsmHandle<S, E> {
    shared: Arc<Shared<S, E>>,
}

impl<S, E> Clone for FsmHandle<S, E> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<S: FsmState, E: FsmEvent> FsmHandle<S, E> {
    pub(crate) fn new(shared: Arc<Shared<S, E>>) -> Self {
        Self { shared }
    }

    /// Queues an event for the event loop.
    ///
    /// Never blocks and never fails. Safe to call before the loop starts and
    /// from inside a transition action, in which case the event is processed
    /// after the running action completes.
    pub fn submit(&self, event: E) {
        tracing::trace!(?event, "event submitted");
        self.shared.queue.enqueue(event);
    }

    /// Returns the current state of the FSM.
    ///
    /// While an action runs this is still the state the transition started
    /// from.
    pub fn current_state(&self) -> S {
        *self.shared.state_tx.borrow()
    }

    /// The event most recently taken off the queue, or `None` if the last poll
    /// found the queue empty.
    pub fn current_event(&self) -> Option<E> {
        self.shared.event_tx.borrow().clone()
    }

    /// Number of events waiting to be processed.
    pub fn pending_events(&self) -> usize {
        self.shared.queue.len()
    }

    /// Receiver notified on every committed state change.
    pub fn subscribe(&self) -> watch::Receiver<S> {
        self.shared.state_tx.subscribe()
    }

    /// Waits for the FSM to reach the specified state.
    ///
    /// Returns immediately if it is already there. A state that is entered and
    /// left again between two polls of the receiver may be missed.
    pub async fn wait_for_state(&self, target: S) -> Result<(), watch::error::RecvError> {
        let mut rx = self.subscribe();
        while *rx.borrow_and_update() != target {
            rx.changed().await?;
        }
        Ok(())
    }

    /// Initiates a graceful shutdown. Processes remaining events before exiting.
    pub fn shutdown_graceful(&self) {
        self.shared
            .shutdown_tx
            .send_replace(Some(ShutdownMode::Graceful));
    }

    /// Initiates an immediate shutdown. The running action, if any, completes;
    /// queued events are dropped.
    pub fn shutdown_immediate(&self) {
        self.shared
            .shutdown_tx
            .send_replace(Some(ShutdownMode::Immediate));
    }
}

/// The spawned event loop. Resolves to the final state.
#[must_use = "FSM task must be awaited or it will abort"]
pub struct FsmTask<S, E, A> {
    handle: tokio::task::JoinHandle<Result<S, FsmError<S, E, A>>>,
}

impl<S, E, A> FsmTask<S, E, A> {
    pub(crate) fn new(handle: tokio::task::JoinHandle<Result<S, FsmError<S, E, A>>>) -> Self {
        Self { handle }
    }

    /// Aborts the event loop. An in-flight action is dropped at its next
    /// suspension point and the task resolves to [`TaskError::Join`].
    pub fn abort(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl<S, E, A> Future for FsmTask<S, E, A> {
    type Output = Result<S, TaskError<FsmError<S, E, A>>>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.handle).poll(cx) {
            Poll::Ready(Ok(Ok(state))) => Poll::Ready(Ok(state)),
            Poll::Ready(Ok(Err(e))) => Poll::Ready(Err(TaskError::Fsm(e))),
            Poll::Ready(Err(e)) => Poll::Ready(Err(TaskError::Join(e))),
            Poll::Pending => Poll::Pending,
        }
    }
}
