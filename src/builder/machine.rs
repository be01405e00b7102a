//! Builder for constructing machine definitions.

use crate::builder::error::{BuildError, InvalidMachine};
use crate::builder::state::StateBuilder;
use crate::builder::transition::TransitionBuilder;
use crate::core::EventNamespace;
use crate::machine::{Delay, InvokeDef, Machine, StateNode};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;

type Check = Validation<(), NonEmptyVec<BuildError>>;

/// Builder for constructing machines with a fluent API.
///
/// `build` validates the whole definition and reports every problem at once.
pub struct MachineBuilder {
    id: String,
    initial: Option<String>,
    context: Value,
    states: Vec<StateBuilder>,
    namespace: EventNamespace,
}

impl MachineBuilder {
    /// Create a new builder for the machine `id`.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            initial: None,
            context: Value::Null,
            states: Vec::new(),
            namespace: EventNamespace::default(),
        }
    }

    /// Set the initial state (required).
    pub fn initial(mut self, state: impl Into<String>) -> Self {
        self.initial = Some(state.into());
        self
    }

    /// Set the initial context. Defaults to `null`.
    pub fn context(mut self, context: Value) -> Self {
        self.context = context;
        self
    }

    /// Add a state.
    pub fn state(mut self, state: StateBuilder) -> Self {
        self.states.push(state);
        self
    }

    /// Add multiple states at once.
    pub fn states(mut self, states: impl IntoIterator<Item = StateBuilder>) -> Self {
        self.states.extend(states);
        self
    }

    /// Use different reserved event spellings.
    pub fn namespace(mut self, namespace: EventNamespace) -> Self {
        self.namespace = namespace;
        self
    }

    /// Build the machine.
    /// Returns every validation problem if the definition is invalid.
    pub fn build(self) -> Result<Machine, InvalidMachine> {
        match self.validate() {
            Validation::Success(_) => Ok(self.assemble()),
            Validation::Failure(errors) => Err(InvalidMachine {
                errors: errors.iter().cloned().collect(),
            }),
        }
    }

    fn validate(&self) -> Check {
        let mut checks: Vec<Check> =
            vec![self.check_id(), self.check_initial(), self.check_states()];

        for state in &self.states {
            checks.extend(self.check_targets(state));
            if state.is_final && state.has_transitions() {
                checks.push(Validation::fail(BuildError::FinalStateTransitions(
                    state.name.clone(),
                )));
            }
        }

        Validation::all_vec(checks).map(|_| ())
    }

    fn check_id(&self) -> Check {
        if self.id.is_empty() {
            Validation::fail(BuildError::MissingId)
        } else {
            Validation::success(())
        }
    }

    fn check_initial(&self) -> Check {
        match &self.initial {
            None => Validation::fail(BuildError::MissingInitialState),
            Some(initial) if !self.states.is_empty() && !self.defines(initial) => {
                Validation::fail(BuildError::UnknownInitialState(initial.clone()))
            }
            Some(_) => Validation::success(()),
        }
    }

    fn check_states(&self) -> Check {
        if self.states.is_empty() {
            return Validation::fail(BuildError::NoStates);
        }

        let mut seen = BTreeSet::new();
        let mut invoke_ids = BTreeSet::new();
        let mut checks: Vec<Check> = Vec::new();
        for state in &self.states {
            if !seen.insert(state.name.as_str()) {
                checks.push(Validation::fail(BuildError::DuplicateState(state.name.clone())));
            }
            if let Some(invoke) = &state.invoke {
                if !invoke_ids.insert(invoke.id.as_str()) {
                    checks.push(Validation::fail(BuildError::DuplicateInvokeId(
                        invoke.id.clone(),
                    )));
                }
            }
        }

        Validation::all_vec(checks).map(|_| ())
    }

    fn check_targets(&self, state: &StateBuilder) -> Vec<Check> {
        self.outgoing(state)
            .into_iter()
            .filter(|(_, transition)| !self.defines(transition.target()))
            .map(|(event, transition)| {
                Validation::fail(BuildError::UnknownTarget {
                    from: state.name.clone(),
                    event,
                    target: transition.target().to_string(),
                })
            })
            .collect()
    }

    fn defines(&self, name: &str) -> bool {
        self.states.iter().any(|state| state.name == name)
    }

    /// Every transition out of `state`, keyed by the event type that takes it.
    fn outgoing<'a>(&self, state: &'a StateBuilder) -> Vec<(String, &'a TransitionBuilder)> {
        let mut outgoing: Vec<(String, &TransitionBuilder)> = state
            .on
            .iter()
            .map(|(event, transition)| (event.clone(), transition))
            .collect();

        outgoing.extend(
            state
                .always
                .iter()
                .map(|transition| (self.namespace.null_event.clone(), transition)),
        );

        if let Some(invoke) = &state.invoke {
            if let Some(transition) = &invoke.on_done {
                outgoing.push((self.namespace.done_invoke_event(&invoke.id), transition));
            }
            if let Some(transition) = &invoke.on_error {
                outgoing.push((self.namespace.error_platform_event(&invoke.id), transition));
            }
        }

        outgoing.extend(state.after.iter().map(|(delay, transition)| {
            let event = self.namespace.delay_event(&self.id, &state.name, delay.as_millis());
            (event, transition)
        }));

        outgoing
    }

    fn assemble(self) -> Machine {
        let mut states = BTreeMap::new();

        for builder in &self.states {
            let mut node = StateNode {
                name: builder.name.clone(),
                is_final: builder.is_final,
                done_data: builder.done_data.clone(),
                ..StateNode::default()
            };

            for (event, transition) in self.outgoing(builder) {
                if event == self.namespace.null_event {
                    continue;
                }
                node.on
                    .entry(event)
                    .or_default()
                    .push(transition.clone().build());
            }
            node.always = builder.always.iter().cloned().map(TransitionBuilder::build).collect();
            node.invoke = builder.invoke.as_ref().map(|invoke| InvokeDef {
                id: invoke.id.clone(),
                src: invoke.src.clone(),
            });
            node.delays = builder
                .after
                .iter()
                .map(|(after, _)| Delay {
                    after: *after,
                    event_type: self
                        .namespace
                        .delay_event(&self.id, &builder.name, after.as_millis()),
                })
                .collect();

            states.insert(builder.name.clone(), node);
        }

        Machine {
            id: self.id,
            // Validated above.
            initial: self.initial.unwrap_or_default(),
            context: self.context,
            states,
            namespace: self.namespace,
        }
    }
}
