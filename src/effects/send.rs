//! Awaitable send: one event in, one settled result out.

use crate::core::{
    classify, ClassifyOptions, Completion, Event, EventNamespace, IntoEvent, Snapshot, Verdict,
    WaitUntil,
};
use crate::effects::interpreter::{IntoInterpreter, Interpreter, InterpreterStatus};
use crate::error::{ConfigError, ObserverError, SendError};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, trace};
use uuid::Uuid;

/// Future returned by a transition observer.
pub type ObserverFuture = Pin<Box<dyn Future<Output = Result<(), ObserverError>> + Send>>;

/// Caller-supplied async callback run on every observed transition before
/// it is classified.
pub type TransitionObserver = Arc<dyn Fn(Snapshot, Event) -> ObserverFuture + Send + Sync>;

/// Configuration for [`create_awaitable_send`].
///
/// # Example
///
/// ```rust
/// use awaitable_send::core::WaitUntil;
/// use awaitable_send::effects::SendOptions;
/// use awaitable_send::error::ObserverError;
///
/// let options = SendOptions::new()
///     .wait_until(WaitUntil::invoke("invoker-1"))
///     .on_transition(|snapshot, event| async move {
///         println!("{} -> {}", event.event_type(), snapshot.value);
///         Ok::<(), ObserverError>(())
///     });
/// # let _ = options;
/// ```
#[derive(Clone, Default)]
pub struct SendOptions {
    wait_until: Option<WaitUntil>,
    on_transition: Option<TransitionObserver>,
    namespace: Option<EventNamespace>,
}

impl SendOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve early on a specific completion marker or predicate instead of
    /// the default resting-state detection.
    pub fn wait_until(mut self, wait_until: WaitUntil) -> Self {
        self.wait_until = Some(wait_until);
        self
    }

    /// Observe every transition. A failing observer rejects the send.
    pub fn on_transition<F, Fut>(mut self, observer: F) -> Self
    where
        F: Fn(Snapshot, Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), ObserverError>> + Send + 'static,
    {
        self.on_transition = Some(Arc::new(move |snapshot: Snapshot, event: Event| {
            Box::pin(observer(snapshot, event)) as ObserverFuture
        }));
        self
    }

    /// Override the reserved event spellings reported by the interpreter.
    pub fn namespace(mut self, namespace: EventNamespace) -> Self {
        self.namespace = Some(namespace);
        self
    }
}

impl fmt::Debug for SendOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SendOptions")
            .field("wait_until", &self.wait_until)
            .field("on_transition", &self.on_transition.is_some())
            .field("namespace", &self.namespace)
            .finish()
    }
}

/// Create an awaitable send from an interpreter or a machine definition.
///
/// A definition gets a fresh interpreter which is started by the first send.
/// Fails if the options are invalid.
pub fn create_awaitable_send<S>(
    source: S,
    options: SendOptions,
) -> Result<AwaitableSend<S::Interpreter>, ConfigError>
where
    S: IntoInterpreter,
{
    if let Some(wait_until) = &options.wait_until {
        wait_until.validate()?;
    }

    let interpreter = source.into_interpreter();
    let namespace = options
        .namespace
        .unwrap_or_else(|| interpreter.namespace().clone());

    Ok(AwaitableSend {
        interpreter,
        classify: ClassifyOptions {
            wait_until: options.wait_until,
            namespace,
        },
        observer: options.on_transition,
    })
}

/// Sends events to an interpreter and settles once per event.
///
/// Calls must not overlap: issue the next `send` only after the previous one
/// settled.
pub struct AwaitableSend<I> {
    interpreter: I,
    classify: ClassifyOptions,
    observer: Option<TransitionObserver>,
}

enum Notification {
    Transition(Snapshot, Event),
    Done(Snapshot, Event),
}

impl<I: Interpreter> AwaitableSend<I> {
    pub fn interpreter(&self) -> &I {
        &self.interpreter
    }

    /// Dispatch `event` and wait for the machine to settle.
    ///
    /// Resolves with the snapshot and payload of the first transition judged
    /// complete, or with the final state and its done data once the machine
    /// finishes. Rejects on an error marker or a failing observer.
    ///
    /// The event is validated when the returned future is first polled.
    /// Nothing is subscribed or dispatched before that, so an invalid event
    /// fails with [`SendError::Config`] and leaves the interpreter untouched.
    pub async fn send<E: IntoEvent>(&self, event: E) -> Result<Completion, SendError> {
        let event = event.into_event()?;
        let invocation = Uuid::new_v4();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let done_tx = tx.clone();

        let on_transition = move |snapshot: &Snapshot, event: &Event| {
            let _ = tx.send(Notification::Transition(snapshot.clone(), event.clone()));
        };
        let on_done = move |snapshot: &Snapshot, event: &Event| {
            let _ = done_tx.send(Notification::Done(snapshot.clone(), event.clone()));
        };

        // Both subscriptions are released when this function returns.
        let _transitions = self.interpreter.on_transition(Box::new(on_transition));
        let _done = self.interpreter.on_done(Box::new(on_done));

        debug!(%invocation, event_type = event.event_type(), "dispatching event");
        self.interpreter.send(event);
        if self.interpreter.status() != InterpreterStatus::Running {
            self.interpreter.start();
        }

        let mut final_step: Option<Completion> = None;
        while let Some(notification) = rx.recv().await {
            match notification {
                Notification::Transition(..) if final_step.is_some() => break,
                Notification::Transition(snapshot, driving) => {
                    if let Some(observer) = &self.observer {
                        observer(snapshot.clone(), driving.clone())
                            .await
                            .map_err(SendError::Observer)?;
                    }

                    match classify(&snapshot, &driving, &self.classify) {
                        Verdict::Ignore => {
                            trace!(
                                %invocation,
                                event_type = driving.event_type(),
                                state = %snapshot.value,
                                "transition ignored"
                            );
                        }
                        Verdict::Done(completion) if completion.snapshot.done => {
                            // The done notification carries the completion payload.
                            trace!(
                                %invocation,
                                state = %completion.snapshot.value,
                                "final transition, awaiting done notification"
                            );
                            final_step = Some(completion);
                        }
                        Verdict::Done(completion) => {
                            debug!(
                                %invocation,
                                event_type = driving.event_type(),
                                state = %completion.snapshot.value,
                                "send resolved"
                            );
                            return Ok(completion);
                        }
                        Verdict::Error(error) => {
                            debug!(
                                %invocation,
                                event_type = error.event_type(),
                                category = %error.category(),
                                "send rejected"
                            );
                            return Err(error.into());
                        }
                    }
                }
                Notification::Done(snapshot, done_event) => {
                    debug!(%invocation, state = %snapshot.value, "machine reached final state");
                    return Ok(Completion::new(snapshot, &done_event));
                }
            }
        }

        // Listeners dropped after a final step still settle on that step.
        final_step.ok_or(SendError::Disconnected)
    }
}

impl<I: fmt::Debug> fmt::Debug for AwaitableSend<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwaitableSend")
            .field("interpreter", &self.interpreter)
            .field("wait_until", &self.classify.wait_until)
            .field("on_transition", &self.observer.is_some())
            .finish()
    }
}
