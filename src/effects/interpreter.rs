//! The interpreter interface consumed by awaitable sends.
//!
//! An interpreter runs a machine definition and pushes one notification per
//! processed step. Awaitable sends only observe it: they dispatch events and
//! read snapshots, never mutate machine state directly.

use crate::core::{Event, EventNamespace, Snapshot};
use std::fmt;
use std::sync::Arc;

/// Run status of an interpreter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InterpreterStatus {
    NotStarted,
    Running,
    Stopped,
}

/// Per-transition notification callback.
pub type TransitionListener = Box<dyn Fn(&Snapshot, &Event) + Send + Sync>;

/// Machine-completion notification callback. Receives the final snapshot and
/// the completion event carrying the done payload.
pub type DoneListener = Box<dyn Fn(&Snapshot, &Event) + Send + Sync>;

/// Handle to a registered listener. Dropping it unsubscribes exactly once.
#[must_use = "dropping a subscription unsubscribes the listener immediately"]
pub struct Subscription {
    unsubscribe: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new<F>(unsubscribe: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            unsubscribe: Some(Box::new(unsubscribe)),
        }
    }

    /// A subscription with nothing to release.
    pub fn detached() -> Self {
        Self { unsubscribe: None }
    }

    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.unsubscribe.is_some())
            .finish()
    }
}

/// A running state machine as seen from the outside.
///
/// Contract:
/// - `start` moves `NotStarted` to `Running`, notifies the start-up
///   transition and then processes events sent before start. It is a no-op in
///   any other status.
/// - `send` processes an event when running and defers it when not started.
/// - transition listeners are notified once per processed event, in order.
/// - done listeners are notified once when the designated final state is
///   reached, right after the transition listeners for that step. The
///   snapshot of that transition has `done` set.
/// - `namespace` returns the reserved event spellings used by this
///   interpreter.
pub trait Interpreter: Send + Sync {
    fn start(&self);

    fn send(&self, event: Event);

    fn status(&self) -> InterpreterStatus;

    /// Current snapshot.
    fn snapshot(&self) -> Snapshot;

    fn on_transition(&self, listener: TransitionListener) -> Subscription;

    fn on_done(&self, listener: DoneListener) -> Subscription;

    fn namespace(&self) -> &EventNamespace;
}

impl<T: Interpreter + ?Sized> Interpreter for Arc<T> {
    fn start(&self) {
        (**self).start()
    }

    fn send(&self, event: Event) {
        (**self).send(event)
    }

    fn status(&self) -> InterpreterStatus {
        (**self).status()
    }

    fn snapshot(&self) -> Snapshot {
        (**self).snapshot()
    }

    fn on_transition(&self, listener: TransitionListener) -> Subscription {
        (**self).on_transition(listener)
    }

    fn on_done(&self, listener: DoneListener) -> Subscription {
        (**self).on_done(listener)
    }

    fn namespace(&self) -> &EventNamespace {
        (**self).namespace()
    }
}

/// Either an interpreter or a machine definition that can create one.
///
/// Interpreters convert into themselves. Definitions produce a fresh
/// interpreter that has not been started yet.
pub trait IntoInterpreter {
    type Interpreter: Interpreter;

    fn into_interpreter(self) -> Self::Interpreter;
}

impl<I: Interpreter> IntoInterpreter for I {
    type Interpreter = I;

    fn into_interpreter(self) -> Self::Interpreter {
        self
    }
}
