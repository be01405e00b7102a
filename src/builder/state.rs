//! Builders for state nodes and invoked processes.

use crate::builder::transition::TransitionBuilder;
use crate::core::RaisedError;
use crate::machine::{DoneData, InvokeFuture, InvokeSource};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Builder for an invoked process.
///
/// The process is started with the context whenever its state is entered.
/// Its result is delivered as `done.invoke.<id>` (success) or
/// `error.platform.<id>` (failure).
#[derive(Clone)]
pub struct InvokeBuilder {
    pub(crate) id: String,
    pub(crate) src: InvokeSource,
    pub(crate) on_done: Option<TransitionBuilder>,
    pub(crate) on_error: Option<TransitionBuilder>,
}

impl InvokeBuilder {
    pub fn new<F, Fut>(id: impl Into<String>, src: F) -> Self
    where
        F: Fn(&Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, RaisedError>> + Send + 'static,
    {
        let src: InvokeSource = Arc::new(move |context: &Value| Box::pin(src(context)) as InvokeFuture);
        Self {
            id: id.into(),
            src,
            on_done: None,
            on_error: None,
        }
    }

    /// Transition taken when the process succeeds.
    pub fn on_done(mut self, transition: impl Into<TransitionBuilder>) -> Self {
        self.on_done = Some(transition.into());
        self
    }

    /// Transition taken when the process fails.
    pub fn on_error(mut self, transition: impl Into<TransitionBuilder>) -> Self {
        self.on_error = Some(transition.into());
        self
    }
}

/// Builder for a state node.
#[derive(Clone)]
pub struct StateBuilder {
    pub(crate) name: String,
    pub(crate) on: Vec<(String, TransitionBuilder)>,
    pub(crate) always: Vec<TransitionBuilder>,
    pub(crate) invoke: Option<InvokeBuilder>,
    pub(crate) after: Vec<(Duration, TransitionBuilder)>,
    pub(crate) is_final: bool,
    pub(crate) done_data: Option<DoneData>,
}

impl StateBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            on: Vec::new(),
            always: Vec::new(),
            invoke: None,
            after: Vec::new(),
            is_final: false,
            done_data: None,
        }
    }

    /// Add a transition on `event`. Several transitions for the same event
    /// are tried in the order added.
    pub fn on(mut self, event: impl Into<String>, transition: impl Into<TransitionBuilder>) -> Self {
        self.on.push((event.into(), transition.into()));
        self
    }

    /// Add an eventless transition, checked after every step.
    pub fn always(mut self, transition: impl Into<TransitionBuilder>) -> Self {
        self.always.push(transition.into());
        self
    }

    /// Invoke a process while in this state.
    pub fn invoke(mut self, invoke: InvokeBuilder) -> Self {
        self.invoke = Some(invoke);
        self
    }

    /// Take `transition` once `delay` has elapsed in this state.
    pub fn after(mut self, delay: Duration, transition: impl Into<TransitionBuilder>) -> Self {
        self.after.push((delay, transition.into()));
        self
    }

    /// Mark this state as the machine's final state.
    pub fn final_state(mut self) -> Self {
        self.is_final = true;
        self
    }

    /// Payload of the completion event when this final state is reached.
    pub fn done_data<F>(mut self, done_data: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        self.done_data = Some(Arc::new(done_data));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether any outgoing transition is declared.
    pub(crate) fn has_transitions(&self) -> bool {
        !self.on.is_empty()
            || !self.always.is_empty()
            || !self.after.is_empty()
            || self
                .invoke
                .as_ref()
                .is_some_and(|i| i.on_done.is_some() || i.on_error.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_collects_transitions_in_order() {
        let state = StateBuilder::new("penultimate")
            .on("SELECT", "finality")
            .on("BACK", "initial");

        assert_eq!(state.name(), "penultimate");
        let events: Vec<_> = state.on.iter().map(|(event, _)| event.as_str()).collect();
        assert_eq!(events, vec!["SELECT", "BACK"]);
        assert!(state.has_transitions());
    }

    #[test]
    fn plain_final_state_has_no_transitions() {
        let state = StateBuilder::new("finality").final_state();
        assert!(state.is_final);
        assert!(!state.has_transitions());
    }

    #[test]
    fn invoke_handlers_count_as_transitions() {
        let invoke = InvokeBuilder::new("invoker-1", |_| async { Ok(Value::Null) }).on_done("next");
        let state = StateBuilder::new("started").invoke(invoke);
        assert!(state.has_transitions());
    }
}
