//! Unbounded event queue with a broadcast wait registry.
//!
//! Producers call [`EventQueue::enqueue`] from any thread. The single consumer
//! polls with [`EventQueue::try_dequeue`] and, when the queue is empty, parks on
//! a [`WaitHandle`] obtained from [`EventQueue::register_waiter`].
//!
//! The emptiness check in `register_waiter` and the append-then-notify in
//! `enqueue` happen under the same lock, so an event can never slip in between
//! the check and the ticket being recorded.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use tokio::sync::oneshot;

struct Inner<E> {
    events: VecDeque<E>,
    waiters: Vec<oneshot::Sender<()>>,
}

/// Thread-safe FIFO of pending events plus the tickets of parked waiters.
pub struct EventQueue<E> {
    inner: Mutex<Inner<E>>,
}

impl<E> Default for EventQueue<E> {
    fn default() -> Self {
        Self {
            inner: Mutex::new(Inner {
                events: VecDeque::new(),
                waiters: Vec::new(),
            }),
        }
    }
}

impl<E> EventQueue<E> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `event` to the tail and wakes every parked waiter.
    ///
    /// Never blocks on the consumer and never fails.
    pub fn enqueue(&self, event: E) {
        let mut inner = self.lock();
        inner.events.push_back(event);
        Self::wake_all(&mut inner);
    }

    /// Pops the head of the queue without waiting.
    pub fn try_dequeue(&self) -> Option<E> {
        self.lock().events.pop_front()
    }

    /// Returns a handle that resolves once the queue has something in it.
    ///
    /// If the queue is already non-empty the handle is ready immediately.
    /// Otherwise it resolves on the next [`enqueue`](Self::enqueue). A resolved
    /// handle only means "recheck the queue": another consumer or a redundant
    /// wake-up may leave it empty again.
    pub fn register_waiter(&self) -> WaitHandle {
        let mut inner = self.lock();
        if !inner.events.is_empty() {
            return WaitHandle::ready();
        }

        // Tickets whose handle was dropped before being woken.
        inner.waiters.retain(|tx| !tx.is_closed());

        let (tx, rx) = oneshot::channel();
        inner.waiters.push(tx);
        WaitHandle { rx: Some(rx) }
    }

    /// Resolves and clears every outstanding ticket. Returns how many were
    /// woken.
    pub fn notify_all_waiters(&self) -> usize {
        Self::wake_all(&mut self.lock())
    }

    /// Number of queued events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().events.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().events.is_empty()
    }

    /// Number of tickets currently recorded.
    #[must_use]
    pub fn waiter_count(&self) -> usize {
        self.lock().waiters.len()
    }

    fn wake_all(inner: &mut Inner<E>) -> usize {
        let mut woken = 0;
        for tx in inner.waiters.drain(..) {
            if tx.send(()).is_ok() {
                woken += 1;
            }
        }
        woken
    }

    // No critical section can leave `Inner` half-updated; poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, Inner<E>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One-shot wake-up ticket returned by [`EventQueue::register_waiter`].
#[must_use = "a wait handle does nothing unless awaited"]
#[derive(Debug)]
pub struct WaitHandle {
    rx: Option<oneshot::Receiver<()>>,
}

impl WaitHandle {
    fn ready() -> Self {
        Self { rx: None }
    }

    /// Returns `true` if the handle was satisfied at registration time.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.rx.is_none()
    }
}

impl Future for WaitHandle {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.rx.as_mut() {
            None => Poll::Ready(()),
            // A dropped sender also resolves; the caller only rechecks.
            Some(rx) => match Pin::new(rx).poll(cx) {
                Poll::Ready(_) => {
                    self.rx = None;
                    Poll::Ready(())
                }
                Poll::Pending => Poll::Pending,
            },
        }
    }
}
