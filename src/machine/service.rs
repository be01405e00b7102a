//! Reference interpreter for [`Machine`] definitions.
//!
//! The service owns the current state and context, processes events one at
//! a time in arrival order and runs the effects of entered states: invoked
//! processes and delayed transitions are spawned on the ambient tokio
//! runtime. Results from a state that has since been exited are discarded.

use crate::core::{Event, EventNamespace, Snapshot, StateHistory};
use crate::effects::{
    DoneListener, Interpreter, InterpreterStatus, Subscription, TransitionListener,
};
use crate::error::ServiceError;
use crate::machine::definition::{Machine, Step};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Weak};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};
use uuid::Uuid;

type Listener = Arc<dyn Fn(&Snapshot, &Event) + Send + Sync>;

/// A running instance of a [`Machine`].
///
/// Cloning yields another handle to the same instance.
///
/// Invocation sources are called while the service is processing an event
/// and must not send events to the service synchronously.
#[derive(Clone)]
pub struct Service {
    inner: Arc<Inner>,
}

struct Inner {
    machine: Machine,
    session: Uuid,
    core: Mutex<Core>,
    listeners: Mutex<Listeners>,
}

struct Core {
    status: InterpreterStatus,
    value: String,
    context: Value,
    changed: bool,
    /// Bumped whenever a state is entered or the service stops.
    generation: u64,
    queue: VecDeque<Queued>,
    processing: bool,
    tasks: Vec<JoinHandle<()>>,
    history: StateHistory,
}

struct Queued {
    event: Event,
    /// Generation that produced the event, for effect results.
    origin: Option<u64>,
}

#[derive(Default)]
struct Listeners {
    next_id: u64,
    transition: BTreeMap<u64, Listener>,
    done: BTreeMap<u64, Listener>,
}

enum Notification {
    Transition(Snapshot, Event),
    Done(Snapshot, Event),
}

impl Service {
    /// Create a service for `machine`. Nothing runs until [`Interpreter::start`].
    pub fn new(machine: Machine) -> Self {
        let core = Core {
            status: InterpreterStatus::NotStarted,
            value: machine.initial().to_string(),
            context: machine.context().clone(),
            changed: false,
            generation: 0,
            queue: VecDeque::new(),
            processing: false,
            tasks: Vec::new(),
            history: StateHistory::new(),
        };

        Self {
            inner: Arc::new(Inner {
                machine,
                session: Uuid::new_v4(),
                core: Mutex::new(core),
                listeners: Mutex::new(Listeners::default()),
            }),
        }
    }

    pub fn machine(&self) -> &Machine {
        &self.inner.machine
    }

    /// Unique id of this instance, attached to its log events.
    pub fn session_id(&self) -> Uuid {
        self.inner.session
    }

    /// Transitions taken so far.
    pub fn history(&self) -> StateHistory {
        self.inner.core.lock().history.clone()
    }

    /// Number of registered transition and done listeners.
    pub fn listener_count(&self) -> usize {
        let listeners = self.inner.listeners.lock();
        listeners.transition.len() + listeners.done.len()
    }

    /// Stop the service without notifying done listeners. Pending events
    /// and running effects are dropped.
    pub fn stop(&self) {
        let mut core = self.inner.core.lock();
        if core.status == InterpreterStatus::Stopped {
            return;
        }
        core.halt();
        debug!(
            session = %self.inner.session,
            machine = self.inner.machine.id(),
            "service stopped"
        );
    }
}

impl Interpreter for Service {
    fn start(&self) {
        let notifications = {
            let mut core = self.inner.core.lock();
            if core.status != InterpreterStatus::NotStarted {
                return;
            }
            core.status = InterpreterStatus::Running;
            core.processing = true;

            debug!(
                session = %self.inner.session,
                machine = self.inner.machine.id(),
                deferred = core.queue.len(),
                "service started"
            );
            let init = Event::new(self.inner.machine.namespace().init.clone());
            let step = self.inner.machine.initial_step();
            self.inner.apply(&mut core, step, init)
        };

        self.inner.deliver(notifications);
        self.inner.drain();
    }

    fn send(&self, event: Event) {
        self.inner.enqueue(event, None);
    }

    fn status(&self) -> InterpreterStatus {
        self.inner.core.lock().status
    }

    fn snapshot(&self) -> Snapshot {
        let core = self.inner.core.lock();
        self.inner
            .machine
            .snapshot(&core.value, &core.context, core.changed)
    }

    fn on_transition(&self, listener: TransitionListener) -> Subscription {
        let id = self.inner.listeners.lock().add_transition(Arc::from(listener));
        self.subscription(move |listeners| {
            listeners.transition.remove(&id);
        })
    }

    fn on_done(&self, listener: DoneListener) -> Subscription {
        let id = self.inner.listeners.lock().add_done(Arc::from(listener));
        self.subscription(move |listeners| {
            listeners.done.remove(&id);
        })
    }

    fn namespace(&self) -> &EventNamespace {
        self.inner.machine.namespace()
    }
}

impl Service {
    fn subscription<F>(&self, remove: F) -> Subscription
    where
        F: FnOnce(&mut Listeners) + Send + 'static,
    {
        let inner = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = inner.upgrade() {
                remove(&mut *inner.listeners.lock());
            }
        })
    }
}

impl Listeners {
    fn add_transition(&mut self, listener: Listener) -> u64 {
        let id = self.allocate();
        self.transition.insert(id, listener);
        id
    }

    fn add_done(&mut self, listener: Listener) -> u64 {
        let id = self.allocate();
        self.done.insert(id, listener);
        id
    }

    fn allocate(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

impl Core {
    fn cancel_effects(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }

    fn halt(&mut self) {
        self.status = InterpreterStatus::Stopped;
        self.queue.clear();
        self.generation += 1;
        self.cancel_effects();
    }
}

impl Inner {
    fn enqueue(self: &Arc<Self>, event: Event, origin: Option<u64>) {
        {
            let mut core = self.core.lock();
            match core.status {
                InterpreterStatus::NotStarted => {
                    trace!(
                        session = %self.session,
                        event_type = event.event_type(),
                        "deferring event until start"
                    );
                    core.queue.push_back(Queued { event, origin });
                    return;
                }
                InterpreterStatus::Stopped => {
                    if origin.is_none() {
                        warn!(
                            session = %self.session,
                            event_type = event.event_type(),
                            "event sent to stopped service was dropped"
                        );
                    }
                    return;
                }
                InterpreterStatus::Running => {}
            }

            core.queue.push_back(Queued { event, origin });
            if core.processing {
                return;
            }
            core.processing = true;
        }

        self.drain();
    }

    /// Process queued events until the queue is empty. Only one caller
    /// drains at a time; others just enqueue.
    fn drain(self: &Arc<Self>) {
        loop {
            let notifications = {
                let mut core = self.core.lock();
                if core.status != InterpreterStatus::Running {
                    core.queue.clear();
                    core.processing = false;
                    return;
                }
                let Some(queued) = core.queue.pop_front() else {
                    core.processing = false;
                    return;
                };

                if queued.origin.is_some_and(|origin| origin != core.generation) {
                    trace!(
                        session = %self.session,
                        event_type = queued.event.event_type(),
                        "discarding result of exited state"
                    );
                    continue;
                }

                trace!(
                    session = %self.session,
                    state = %core.value,
                    event_type = queued.event.event_type(),
                    "processing event"
                );
                let step = self
                    .machine
                    .transition(&core.value, &core.context, &queued.event);
                self.apply(&mut core, step, queued.event)
            };

            self.deliver(notifications);
        }
    }

    fn apply(self: &Arc<Self>, core: &mut Core, step: Step, event: Event) -> Vec<Notification> {
        if step.truncated {
            warn!(
                session = %self.session,
                event_type = event.event_type(),
                state = %step.value,
                "eventless transitions did not settle"
            );
        }

        for transition in step.transitions {
            core.history = core.history.record(transition);
        }
        core.value = step.value;
        core.context = step.context;
        core.changed = step.changed;

        let snapshot = self.machine.snapshot(&core.value, &core.context, core.changed);
        let mut notifications = vec![Notification::Transition(snapshot.clone(), event)];

        if self.machine.is_final(&core.value) {
            core.halt();
            debug!(
                session = %self.session,
                machine = self.machine.id(),
                state = %core.value,
                "service reached final state"
            );
            let done = self.machine.done_event(&core.value, &core.context);
            notifications.push(Notification::Done(snapshot, done));
        } else if step.entered {
            self.enter(core);
        }

        notifications
    }

    /// Start the effects of the current state, cancelling those of the
    /// previous one.
    fn enter(self: &Arc<Self>, core: &mut Core) {
        core.cancel_effects();
        core.generation += 1;

        let Some(node) = self.machine.state(&core.value) else {
            return;
        };
        if node.invoke.is_none() && node.delays.is_empty() {
            return;
        }

        let namespace = self.machine.namespace();
        let generation = core.generation;

        let Ok(handle) = Handle::try_current() else {
            warn!(
                session = %self.session,
                state = %core.value,
                "no async runtime, effects not started"
            );
            if let Some(invoke) = &node.invoke {
                let error = ServiceError::NoRuntime {
                    id: invoke.id.clone(),
                };
                core.queue.push_back(Queued {
                    event: Event::new(namespace.error_platform_event(&invoke.id))
                        .with_error(Arc::new(error)),
                    origin: Some(generation),
                });
            }
            return;
        };

        if let Some(invoke) = &node.invoke {
            trace!(session = %self.session, id = %invoke.id, "starting invocation");
            let running = (invoke.src)(&core.context);
            let done_type = namespace.done_invoke_event(&invoke.id);
            let error_type = namespace.error_platform_event(&invoke.id);
            let inner = Arc::downgrade(self);

            core.tasks.push(handle.spawn(async move {
                let event = match running.await {
                    Ok(data) => Event::new(done_type).with_data(data),
                    Err(error) => Event::new(error_type).with_error(error),
                };
                deliver_result(&inner, event, generation);
            }));
        }

        for delay in &node.delays {
            let after = delay.after;
            let event = Event::new(delay.event_type.clone());
            let inner = Arc::downgrade(self);

            core.tasks.push(handle.spawn(async move {
                tokio::time::sleep(after).await;
                deliver_result(&inner, event, generation);
            }));
        }
    }

    fn deliver(&self, notifications: Vec<Notification>) {
        for notification in notifications {
            let (snapshot, event, listeners) = match notification {
                Notification::Transition(snapshot, event) => {
                    let listeners: Vec<Listener> =
                        self.listeners.lock().transition.values().cloned().collect();
                    (snapshot, event, listeners)
                }
                Notification::Done(snapshot, event) => {
                    let listeners: Vec<Listener> =
                        self.listeners.lock().done.values().cloned().collect();
                    (snapshot, event, listeners)
                }
            };

            for listener in listeners {
                listener(&snapshot, &event);
            }
        }
    }
}

fn deliver_result(inner: &Weak<Inner>, event: Event, generation: u64) {
    if let Some(inner) = inner.upgrade() {
        inner.enqueue(event, Some(generation));
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.core.get_mut().cancel_effects();
    }
}

impl fmt::Debug for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = self.inner.core.lock();
        f.debug_struct("Service")
            .field("machine", &self.inner.machine.id())
            .field("session", &self.inner.session)
            .field("status", &core.status)
            .field("state", &core.value)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{invoke, transition, MachineBuilder, StateBuilder};
    use crate::core::RaisedError;
    use serde_json::json;
    use std::time::Duration;
    use tokio::sync::mpsc;

    type Seen = mpsc::UnboundedReceiver<(String, String)>;

    /// Record `(state, event type)` for every transition.
    fn watch(service: &Service) -> (Subscription, Seen) {
        let (tx, rx) = mpsc::unbounded_channel();
        let listener = move |snapshot: &Snapshot, event: &Event| {
            let _ = tx.send((snapshot.value.to_string(), event.event_type().to_string()));
        };
        let subscription = service.on_transition(Box::new(listener));
        (subscription, rx)
    }

    fn drain(rx: &mut Seen) -> Vec<(String, String)> {
        let mut seen = Vec::new();
        while let Ok(item) = rx.try_recv() {
            seen.push(item);
        }
        seen
    }

    fn pair(state: &str, event: &str) -> (String, String) {
        (state.to_string(), event.to_string())
    }

    fn wizard() -> Machine {
        MachineBuilder::new("wizard")
            .initial("initial")
            .state(StateBuilder::new("initial").on("START", "penultimate"))
            .state(
                StateBuilder::new("penultimate")
                    .on("SELECT", "finality")
                    .on("BACK", "initial"),
            )
            .state(StateBuilder::new("finality").final_state().done_data(|_| json!("finished")))
            .build()
            .unwrap()
    }

    #[test]
    fn events_sent_before_start_are_deferred() {
        let service = Service::new(wizard());
        let (_subscription, mut rx) = watch(&service);

        service.send(Event::new("START"));
        assert!(drain(&mut rx).is_empty());
        assert_eq!(service.status(), InterpreterStatus::NotStarted);

        service.start();

        assert_eq!(
            drain(&mut rx),
            vec![pair("initial", "xstate.init"), pair("penultimate", "START")]
        );
        assert_eq!(service.status(), InterpreterStatus::Running);
    }

    #[test]
    fn start_is_a_no_op_once_running() {
        let service = Service::new(wizard());
        service.start();
        service.send(Event::new("START"));

        let (_subscription, mut rx) = watch(&service);
        service.start();

        assert!(drain(&mut rx).is_empty());
        assert!(service.snapshot().matches("penultimate"));
    }

    #[test]
    fn unhandled_events_still_notify() {
        let service = Service::new(wizard());
        service.start();
        let (_subscription, mut rx) = watch(&service);

        service.send(Event::new("SELECT"));

        assert_eq!(drain(&mut rx), vec![pair("initial", "SELECT")]);
        assert!(!service.snapshot().changed);
    }

    #[test]
    fn final_state_stops_and_notifies_done() {
        let service = Service::new(wizard());
        let done = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&done);
        let _done = service.on_done(Box::new(move |snapshot: &Snapshot, event: &Event| {
            let state = snapshot.value.to_string();
            seen.lock()
                .push((state, event.event_type().to_string(), event.payload()));
        }));

        service.start();
        service.send(Event::new("START"));
        service.send(Event::new("SELECT"));
        service.send(Event::new("BACK"));

        assert_eq!(service.status(), InterpreterStatus::Stopped);
        assert!(service.snapshot().done);
        assert_eq!(
            *done.lock(),
            vec![(
                "finality".to_string(),
                "done.state.wizard".to_string(),
                Some(json!("finished"))
            )]
        );
    }

    #[test]
    fn dropped_subscription_stops_delivery() {
        let service = Service::new(wizard());
        let (subscription, mut rx) = watch(&service);
        assert_eq!(service.listener_count(), 1);

        drop(subscription);
        service.start();

        assert_eq!(service.listener_count(), 0);
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn history_records_the_path() {
        let service = Service::new(wizard());
        service.start();
        service.send(Event::new("START"));
        service.send(Event::new("BACK"));

        let history = service.history();
        let path: Vec<String> = history.get_path().iter().map(|v| v.to_string()).collect();
        assert_eq!(path, vec!["initial", "penultimate", "initial"]);
        assert_eq!(history.event_types(), vec!["START", "BACK"]);
    }

    #[test]
    fn invocation_without_runtime_raises_platform_error() {
        let machine = MachineBuilder::new("m")
            .initial("loading")
            .state(StateBuilder::new("loading").invoke(
                invoke("fetch", |_| async { Ok(Value::Null) }).on_error("failed"),
            ))
            .state(StateBuilder::new("failed"))
            .build()
            .unwrap();
        let service = Service::new(machine);
        let (_subscription, mut rx) = watch(&service);

        service.start();

        assert_eq!(
            drain(&mut rx),
            vec![pair("loading", "xstate.init"), pair("failed", "error.platform.fetch")]
        );
    }

    fn fetcher(delay: Duration, result: Result<Value, RaisedError>) -> Machine {
        MachineBuilder::new("fetcher")
            .initial("loading")
            .context(json!({ "result": null }))
            .state(
                StateBuilder::new("loading")
                    .invoke(
                        invoke("fetch", move |_| {
                            let result = result.clone();
                            async move {
                                tokio::time::sleep(delay).await;
                                result
                            }
                        })
                        .on_done(transition("loaded").assign_payload("result"))
                        .on_error("failed"),
                    )
                    .on("CANCEL", "idle"),
            )
            .state(StateBuilder::new("loaded"))
            .state(StateBuilder::new("failed"))
            .state(StateBuilder::new("idle").on("done.invoke.fetch", "loaded"))
            .build()
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn invocation_result_drives_done_transition() {
        let service = Service::new(fetcher(Duration::from_millis(50), Ok(json!({ "id": 1 }))));
        let (_subscription, mut rx) = watch(&service);
        service.start();

        rx.recv().await;
        let (state, event_type) = rx.recv().await.unwrap();

        assert_eq!(state, "loaded");
        assert_eq!(event_type, "done.invoke.fetch");
        assert_eq!(service.snapshot().context, json!({ "result": { "id": 1 } }));
    }

    #[tokio::test(start_paused = true)]
    async fn invocation_failure_raises_platform_error() {
        #[derive(Debug, thiserror::Error)]
        #[error("unreachable host")]
        struct Unreachable;

        let service = Service::new(fetcher(Duration::from_millis(50), Err(Arc::new(Unreachable))));
        let (_subscription, mut rx) = watch(&service);
        service.start();

        rx.recv().await;
        assert_eq!(rx.recv().await.unwrap(), pair("failed", "error.platform.fetch"));
    }

    #[tokio::test(start_paused = true)]
    async fn exiting_a_state_discards_its_invocation() {
        let service = Service::new(fetcher(Duration::from_millis(50), Ok(json!(1))));
        service.start();
        service.send(Event::new("CANCEL"));

        tokio::time::sleep(Duration::from_millis(200)).await;

        assert!(service.snapshot().matches("idle"));
        assert_eq!(service.history().event_types(), vec!["CANCEL"]);
    }

    #[tokio::test(start_paused = true)]
    async fn delayed_transition_fires_after_its_delay() {
        let machine = MachineBuilder::new("light")
            .initial("green")
            .state(StateBuilder::new("green").after(Duration::from_secs(30), "yellow"))
            .state(StateBuilder::new("yellow"))
            .build()
            .unwrap();
        let service = Service::new(machine);
        service.start();

        tokio::time::sleep(Duration::from_secs(29)).await;
        assert!(service.snapshot().matches("green"));

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(service.snapshot().matches("yellow"));
        assert_eq!(service.history().event_types(), vec!["xstate.after(30000)#light.green"]);
    }

    #[test]
    fn stop_drops_pending_work() {
        let service = Service::new(wizard());
        service.start();
        service.stop();
        service.send(Event::new("START"));

        assert_eq!(service.status(), InterpreterStatus::Stopped);
        assert!(service.snapshot().matches("initial"));
    }
}
