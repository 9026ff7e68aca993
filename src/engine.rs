//! Builder, machine and event loop.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::Instrument;
use tokio_fsm_engine_core::{DispatchOutcome, FsmError, FsmEvent, FsmState, ShutdownMode};

use crate::handle::{FsmHandle, FsmTask};
use crate::queue::EventQueue;
use crate::table::{Action, TransitionTable};

/// State shared between the event loop and every handle.
pub(crate) struct Shared<S, E> {
    pub(crate) queue: EventQueue<E>,
    pub(crate) state_tx: watch::Sender<S>,
    pub(crate) event_tx: watch::Sender<Option<E>>,
    pub(crate) shutdown_tx: watch::Sender<Option<ShutdownMode>>,
}

/// Configures a [`Fsm`]: initial state, instance name and transitions.
///
/// The transition table can only be modified here. [`FsmBuilder::build`]
/// freezes it.
pub struct FsmBuilder<S, E, A> {
    name: String,
    table: TransitionTable<S, E, A>,
    shared: Arc<Shared<S, E>>,
}

impl<S, E, A> FsmBuilder<S, E, A>
where
    S: FsmState,
    E: FsmEvent,
    A: fmt::Display + Send + 'static,
{
    /// Starts configuring a machine that begins in `initial`.
    pub fn new(initial: S) -> Self {
        Self {
            name: "fsm".to_string(),
            table: TransitionTable::new(),
            shared: Arc::new(Shared {
                queue: EventQueue::new(),
                state_tx: watch::channel(initial).0,
                event_tx: watch::channel(None).0,
                shutdown_tx: watch::channel(None).0,
            }),
        }
    }

    /// Label for this instance, recorded on the event loop's tracing span.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Registers `from --on--> to`, running `action` before `to` is committed.
    #[must_use]
    pub fn transition<F, Fut>(self, from: S, on: E, to: S, action: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), A>> + Send + 'static,
    {
        self.register(from, on, to, Action::new(action))
    }

    /// Registers `from --on--> to` with no side effect.
    #[must_use]
    pub fn transition_to(self, from: S, on: E, to: S) -> Self {
        self.register(from, on, to, Action::noop())
    }

    /// Registers a transition with a prebuilt [`Action`]. A later registration
    /// for the same `(from, on)` replaces this one.
    #[must_use]
    pub fn register(mut self, from: S, on: E, to: S, action: Action<A>) -> Self {
        self.table.register(from, on, to, action);
        self
    }

    /// A handle to the machine being built.
    ///
    /// Actions can capture it to submit follow-up events. Events submitted
    /// before the loop starts are queued and processed once it does.
    pub fn handle(&self) -> FsmHandle<S, E> {
        FsmHandle::new(Arc::clone(&self.shared))
    }

    /// Freezes the transition table.
    pub fn build(self) -> Fsm<S, E, A> {
        tracing::debug!(
            name = %self.name,
            transitions = self.table.len(),
            "fsm built"
        );

        Fsm {
            name: self.name,
            table: self.table,
            shared: self.shared,
        }
    }
}

/// A finite state machine with a frozen transition table.
///
/// Events are processed by [`Fsm::run`] (or [`Fsm::spawn`]), which consumes the
/// machine: there is exactly one event loop per instance.
pub struct Fsm<S, E, A> {
    name: String,
    table: TransitionTable<S, E, A>,
    shared: Arc<Shared<S, E>>,
}

impl<S, E, A> fmt::Debug for Fsm<S, E, A>
where
    S: fmt::Debug,
    E: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fsm")
            .field("name", &self.name)
            .field("state", &*self.shared.state_tx.borrow())
            .field("table", &self.table)
            .finish()
    }
}

impl<S, E, A> Fsm<S, E, A>
where
    S: FsmState,
    E: FsmEvent,
    A: fmt::Display + Send + 'static,
{
    /// Shorthand for [`FsmBuilder::new`].
    pub fn builder(initial: S) -> FsmBuilder<S, E, A> {
        FsmBuilder::new(initial)
    }

    pub fn handle(&self) -> FsmHandle<S, E> {
        FsmHandle::new(Arc::clone(&self.shared))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn current_state(&self) -> S {
        *self.shared.state_tx.borrow()
    }

    pub fn table(&self) -> &TransitionTable<S, E, A> {
        &self.table
    }

    /// Runs one drain-and-dispatch pass.
    ///
    /// Pops at most one event and, if a transition matches, awaits its action
    /// and commits the next state. Unsupported events and an empty queue are
    /// reported in the returned outcome. A failed action leaves the state
    /// untouched and is returned as an error.
    pub async fn step(&mut self) -> Result<DispatchOutcome<S, E>, FsmError<S, E, A>> {
        let event = self.shared.queue.try_dequeue();
        self.shared.event_tx.send_replace(event.clone());

        let Some(event) = event else {
            tracing::debug!("no event to process");
            return Ok(DispatchOutcome::Empty);
        };
        tracing::debug!(?event, "dequeued event");

        let state = self.current_state();
        let Some(transition) = self.table.lookup(state, &event) else {
            tracing::warn!(?state, ?event, "event not supported in current state");
            return Ok(DispatchOutcome::Unsupported { state, event });
        };

        let to = transition.to();
        let action = transition.action().call();
        if let Err(error) = action.await {
            tracing::error!(?state, ?event, %error, "transition action failed");
            return Err(FsmError::ActionFailed {
                state,
                event,
                error,
            });
        }

        self.shared.state_tx.send_replace(to);
        tracing::info!(from = ?state, ?event, ?to, "transition committed");

        Ok(DispatchOutcome::Transitioned {
            from: state,
            event,
            to,
        })
    }

    /// The event loop. Runs until shutdown is requested through a handle or
    /// an action fails.
    ///
    /// Resolves to the final state on shutdown. Hosts that want to supervise
    /// the loop themselves can await this directly instead of using
    /// [`Fsm::spawn`].
    pub async fn run(self) -> Result<S, FsmError<S, E, A>> {
        let span = tracing::info_span!("fsm", name = %self.name);
        self.run_loop().instrument(span).await
    }

    /// Spawns the event loop on the current Tokio runtime.
    pub fn spawn(self) -> (FsmHandle<S, E>, FsmTask<S, E, A>) {
        let handle = self.handle();
        let task = FsmTask::new(tokio::spawn(self.run()));
        (handle, task)
    }

    async fn run_loop(mut self) -> Result<S, FsmError<S, E, A>> {
        let mut shutdown = self.shared.shutdown_tx.subscribe();
        tracing::debug!(state = ?self.current_state(), "event loop started");

        loop {
            let mode = *shutdown.borrow_and_update();
            if mode == Some(ShutdownMode::Immediate) {
                tracing::info!(
                    dropped = self.shared.queue.len(),
                    "immediate shutdown"
                );
                return Ok(self.current_state());
            }

            if !self.step().await?.is_empty() {
                continue;
            }

            if mode == Some(ShutdownMode::Graceful) {
                tracing::info!("graceful shutdown, queue drained");
                return Ok(self.current_state());
            }

            let wake = self.shared.queue.register_waiter();
            tokio::select! {
                () = wake => {}
                // `self.shared` owns the sender, so this only fires on a send.
                _ = shutdown.changed() => {}
            }
        }
    }
}
