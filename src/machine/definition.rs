//! Machine definitions and pure step computation.
//!
//! A [`Machine`] is an immutable, validated definition. [`Machine::transition`]
//! computes the next state and context for an event without performing any
//! effects; the [`Service`](crate::machine::Service) applies the result and
//! runs invocations and timers.

use crate::core::{Event, EventNamespace, Guard, RaisedError, Snapshot, StateTransition};
use chrono::Utc;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

/// Upper bound on eventless transitions taken for a single event.
pub const MAX_EVENTLESS_STEPS: usize = 100;

/// Context update run when a transition is taken.
pub type Assign = Arc<dyn Fn(&Value, &Event) -> Value + Send + Sync>;

/// Future produced by an invoked process.
pub type InvokeFuture = Pin<Box<dyn Future<Output = Result<Value, RaisedError>> + Send>>;

/// Factory for invoked processes. Called with the context on state entry.
pub type InvokeSource = Arc<dyn Fn(&Value) -> InvokeFuture + Send + Sync>;

/// Computes the payload of the completion event of a final state.
pub type DoneData = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

/// A transition to `target`, optionally guarded, with context updates.
#[derive(Clone)]
pub struct TransitionDef {
    pub target: String,
    pub guard: Option<Guard>,
    pub actions: Vec<Assign>,
}

impl TransitionDef {
    pub fn is_enabled(&self, context: &Value, event: &Event) -> bool {
        self.guard.as_ref().is_none_or(|g| g.check(context, event))
    }

    /// Run the assign actions in order.
    pub fn apply(&self, context: &Value, event: &Event) -> Value {
        self.actions
            .iter()
            .fold(context.clone(), |context, assign| assign(&context, event))
    }
}

impl fmt::Debug for TransitionDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransitionDef")
            .field("target", &self.target)
            .field("guarded", &self.guard.is_some())
            .field("actions", &self.actions.len())
            .finish()
    }
}

/// A process started on state entry and cancelled on exit.
#[derive(Clone)]
pub struct InvokeDef {
    pub id: String,
    pub src: InvokeSource,
}

impl fmt::Debug for InvokeDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvokeDef").field("id", &self.id).finish()
    }
}

/// A delayed transition armed on state entry.
#[derive(Clone, Debug)]
pub struct Delay {
    pub after: Duration,
    /// Event type raised when the delay elapses.
    pub event_type: String,
}

/// A state node of a flat machine.
#[derive(Clone, Default)]
pub struct StateNode {
    pub name: String,
    /// Transitions keyed by event type, tried in order.
    pub on: BTreeMap<String, Vec<TransitionDef>>,
    /// Eventless transitions, tried in order after every step.
    pub always: Vec<TransitionDef>,
    pub invoke: Option<InvokeDef>,
    pub delays: Vec<Delay>,
    pub is_final: bool,
    pub done_data: Option<DoneData>,
}

impl fmt::Debug for StateNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateNode")
            .field("name", &self.name)
            .field("on", &self.on)
            .field("always", &self.always)
            .field("invoke", &self.invoke)
            .field("delays", &self.delays)
            .field("is_final", &self.is_final)
            .finish()
    }
}

/// Result of processing one event.
#[derive(Clone, Debug)]
pub struct Step {
    /// State after the step.
    pub value: String,
    pub context: Value,
    /// Whether any state was entered (or re-entered).
    pub entered: bool,
    /// Whether the state or the context changed.
    pub changed: bool,
    /// Transitions taken, in order.
    pub transitions: Vec<StateTransition>,
    /// Whether eventless resolution stopped at [`MAX_EVENTLESS_STEPS`].
    pub truncated: bool,
}

/// Immutable machine definition.
///
/// Build one with [`MachineBuilder`](crate::builder::MachineBuilder).
#[derive(Clone)]
pub struct Machine {
    pub(crate) id: String,
    pub(crate) initial: String,
    pub(crate) context: Value,
    pub(crate) states: BTreeMap<String, StateNode>,
    pub(crate) namespace: EventNamespace,
}

impl Machine {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn initial(&self) -> &str {
        &self.initial
    }

    /// Context the machine starts with.
    pub fn context(&self) -> &Value {
        &self.context
    }

    pub fn namespace(&self) -> &EventNamespace {
        &self.namespace
    }

    pub fn state(&self, name: &str) -> Option<&StateNode> {
        self.states.get(name)
    }

    pub fn state_names(&self) -> impl Iterator<Item = &str> {
        self.states.keys().map(String::as_str)
    }

    pub fn is_final(&self, name: &str) -> bool {
        self.state(name).is_some_and(|node| node.is_final)
    }

    /// Event types that could cause a transition out of `name`.
    pub fn next_events(&self, name: &str) -> BTreeSet<String> {
        let Some(node) = self.state(name) else {
            return BTreeSet::new();
        };

        let mut events: BTreeSet<String> = node.on.keys().cloned().collect();
        if !node.always.is_empty() {
            events.insert(self.namespace.null_event.clone());
        }
        events
    }

    /// Snapshot of the machine in `name` with `context`.
    pub fn snapshot(&self, name: &str, context: &Value, changed: bool) -> Snapshot {
        Snapshot {
            value: name.into(),
            context: context.clone(),
            next_events: self.next_events(name),
            changed,
            done: self.is_final(name),
        }
    }

    /// Completion event raised when the machine reaches the final state `name`.
    pub fn done_event(&self, name: &str, context: &Value) -> Event {
        let event = Event::new(self.namespace.done_state_event(&self.id));
        match self.state(name).and_then(|node| node.done_data.as_ref()) {
            Some(done_data) => event.with_data(done_data(context)),
            None => event,
        }
    }

    /// Step taken on start: enter the initial state and resolve eventless
    /// transitions.
    pub fn initial_step(&self) -> Step {
        let init = Event::new(self.namespace.init.clone());
        let mut step = Step {
            value: self.initial.clone(),
            context: self.context.clone(),
            entered: true,
            changed: true,
            transitions: Vec::new(),
            truncated: false,
        };
        self.resolve_eventless(&mut step, &init);
        step
    }

    /// Compute the step `event` causes from `current` with `context`.
    ///
    /// Unhandled events produce an unchanged step.
    pub fn transition(&self, current: &str, context: &Value, event: &Event) -> Step {
        let mut step = Step {
            value: current.to_string(),
            context: context.clone(),
            entered: false,
            changed: false,
            transitions: Vec::new(),
            truncated: false,
        };

        let selected = self
            .state(current)
            .and_then(|node| node.on.get(event.event_type()))
            .and_then(|candidates| {
                candidates
                    .iter()
                    .find(|t| t.is_enabled(&step.context, event))
            });

        if let Some(transition) = selected {
            take(&mut step, transition, event);
        }
        self.resolve_eventless(&mut step, event);

        step.changed = step.entered || step.context != *context;
        step
    }

    fn resolve_eventless(&self, step: &mut Step, event: &Event) {
        for _ in 0..MAX_EVENTLESS_STEPS {
            let selected = self.state(&step.value).and_then(|node| {
                node.always
                    .iter()
                    .find(|t| t.is_enabled(&step.context, event))
            });
            match selected {
                Some(transition) => take(step, transition, event),
                None => return,
            }
        }
        step.truncated = true;
    }
}

fn take(step: &mut Step, transition: &TransitionDef, event: &Event) {
    step.context = transition.apply(&step.context, event);
    step.transitions.push(StateTransition {
        from: step.value.as_str().into(),
        to: transition.target.as_str().into(),
        event_type: event.event_type().to_string(),
        timestamp: Utc::now(),
    });
    step.value = transition.target.clone();
    step.entered = true;
}

impl fmt::Debug for Machine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Machine")
            .field("id", &self.id)
            .field("initial", &self.initial)
            .field("states", &self.states.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{transition, MachineBuilder, StateBuilder};
    use serde_json::json;

    fn counter_machine() -> Machine {
        MachineBuilder::new("counter")
            .initial("idle")
            .context(json!({ "count": 0 }))
            .state(
                StateBuilder::new("idle")
                    .on(
                        "INC",
                        transition("idle").assign(|context, _| {
                            json!({ "count": context["count"].as_i64().unwrap_or(0) + 1 })
                        }),
                    )
                    .on("CHECK", "checking"),
            )
            .state(
                StateBuilder::new("checking")
                    .always(transition("big").when(|context, _| context["count"].as_i64() > Some(1)))
                    .always("idle"),
            )
            .state(StateBuilder::new("big").final_state())
            .build()
            .unwrap()
    }

    #[test]
    fn unhandled_event_is_unchanged() {
        let machine = counter_machine();
        let step = machine.transition("idle", &json!({ "count": 0 }), &Event::new("NOPE"));

        assert_eq!(step.value, "idle");
        assert!(!step.changed);
        assert!(!step.entered);
        assert!(step.transitions.is_empty());
    }

    #[test]
    fn assign_updates_context_on_self_transition() {
        let machine = counter_machine();
        let step = machine.transition("idle", &json!({ "count": 0 }), &Event::new("INC"));

        assert_eq!(step.value, "idle");
        assert_eq!(step.context, json!({ "count": 1 }));
        assert!(step.entered);
        assert!(step.changed);
    }

    #[test]
    fn eventless_transitions_resolve_within_the_step() {
        let machine = counter_machine();

        let step = machine.transition("idle", &json!({ "count": 0 }), &Event::new("CHECK"));
        assert_eq!(step.value, "idle");
        assert_eq!(step.transitions.len(), 2);

        let step = machine.transition("idle", &json!({ "count": 5 }), &Event::new("CHECK"));
        assert_eq!(step.value, "big");
        assert!(machine.is_final(&step.value));
    }

    #[test]
    fn eventless_loops_are_truncated() {
        let machine = MachineBuilder::new("loop")
            .initial("a")
            .state(StateBuilder::new("a").always("b"))
            .state(StateBuilder::new("b").always("a"))
            .build()
            .unwrap();

        let step = machine.initial_step();
        assert!(step.truncated);
        assert_eq!(step.transitions.len(), MAX_EVENTLESS_STEPS);
    }

    #[test]
    fn next_events_include_eventless_marker() {
        let machine = counter_machine();

        let idle: Vec<_> = machine.next_events("idle").into_iter().collect();
        assert_eq!(idle, vec!["CHECK", "INC"]);

        assert!(machine.next_events("checking").contains(""));
        assert!(machine.next_events("big").is_empty());
        assert!(machine.next_events("missing").is_empty());
    }

    #[test]
    fn snapshot_reports_final_states() {
        let machine = counter_machine();
        assert!(machine.snapshot("big", &json!({}), true).done);
        assert!(!machine.snapshot("idle", &json!({}), true).done);
    }

    #[test]
    fn done_event_carries_done_data() {
        let machine = MachineBuilder::new("m")
            .initial("end")
            .context(json!({ "total": 3 }))
            .state(StateBuilder::new("end").final_state().done_data(|context| context["total"].clone()))
            .build()
            .unwrap();

        let event = machine.done_event("end", machine.context());
        assert_eq!(event.event_type(), "done.state.m");
        assert_eq!(event.payload(), Some(json!(3)));
    }
}
