//! Transition table: `(state, event)` to next state plus action.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use tokio_fsm_engine_core::{FsmEvent, FsmState};

type ActionFn<A> = dyn Fn() -> BoxFuture<'static, Result<(), A>> + Send + Sync;

/// Zero-argument asynchronous callback run when a transition fires.
///
/// Cloning an `Action` is cheap; clones share the same callback.
pub struct Action<A> {
    f: Arc<ActionFn<A>>,
}

impl<A: 'static> Action<A> {
    /// Wraps an async closure as a transition action.
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), A>> + Send + 'static,
    {
        Self {
            f: Arc::new(move || f().boxed()),
        }
    }

    /// An action that completes immediately and always succeeds.
    #[must_use]
    pub fn noop() -> Self {
        Self::new(|| async { Ok(()) })
    }

    /// Starts the action, returning the future to drive to completion.
    pub fn call(&self) -> BoxFuture<'static, Result<(), A>> {
        (self.f)()
    }
}

impl<A> Clone for Action<A> {
    fn clone(&self) -> Self {
        Self {
            f: Arc::clone(&self.f),
        }
    }
}

impl<A> fmt::Debug for Action<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Action(..)")
    }
}

/// The right-hand side of a table entry.
#[derive(Debug, Clone)]
pub struct Transition<S, A> {
    to: S,
    action: Action<A>,
}

impl<S: Copy, A> Transition<S, A> {
    /// The state committed once the action succeeds.
    #[must_use]
    pub fn to(&self) -> S {
        self.to
    }

    /// The action run before the state is committed.
    #[must_use]
    pub fn action(&self) -> &Action<A> {
        &self.action
    }
}

/// Mapping from `(state, event)` to the transition it triggers.
///
/// Mutable only while an [`FsmBuilder`](crate::FsmBuilder) owns it; a built
/// [`Fsm`](crate::Fsm) exposes it read-only, so entries cannot change once the
/// event loop may be running.
pub struct TransitionTable<S, E, A> {
    entries: HashMap<(S, E), Transition<S, A>>,
}

impl<S, E, A> Default for TransitionTable<S, E, A> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<S, E, A> fmt::Debug for TransitionTable<S, E, A>
where
    S: fmt::Debug,
    E: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(key, entry)| (key, &entry.to)))
            .finish()
    }
}

impl<S: FsmState, E: FsmEvent, A> TransitionTable<S, E, A> {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the entry for `(from, trigger)`.
    ///
    /// The last registration for a key wins. The replaced entry is returned and
    /// the overwrite is reported at warn level.
    pub fn register(
        &mut self,
        from: S,
        trigger: E,
        to: S,
        action: Action<A>,
    ) -> Option<Transition<S, A>> {
        let previous = self
            .entries
            .insert((from, trigger.clone()), Transition { to, action });

        if let Some(previous) = &previous {
            tracing::warn!(
                state = ?from,
                event = ?trigger,
                replaced_to = ?previous.to,
                new_to = ?to,
                "duplicate transition registered, overwriting"
            );
        }

        previous
    }

    /// Returns the transition for `event` in `state`, if any.
    #[must_use]
    pub fn lookup(&self, state: S, event: &E) -> Option<&Transition<S, A>> {
        self.entries.get(&(state, event.clone()))
    }

    /// Returns `true` if a transition is registered for `(state, event)`.
    #[must_use]
    pub fn contains(&self, state: S, event: &E) -> bool {
        self.lookup(state, event).is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over all registered `(state, event)` keys in arbitrary order.
    pub fn keys(&self) -> impl Iterator<Item = &(S, E)> {
        self.entries.keys()
    }

    /// Events accepted in `state`, in arbitrary order.
    pub fn events_from(&self, state: S) -> impl Iterator<Item = &E> {
        self.entries
            .keys()
            .filter(move |(from, _)| *from == state)
            .map(|(_, event)| event)
    }
}
