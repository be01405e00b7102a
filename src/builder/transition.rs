//! Builder for transitions.

use crate::core::{Event, Guard};
use crate::machine::{Assign, TransitionDef};
use serde_json::Value;
use std::sync::Arc;

/// Builder for constructing transitions with a fluent API.
///
/// A bare state name converts into an unguarded transition without actions.
#[derive(Clone)]
pub struct TransitionBuilder {
    target: String,
    guard: Option<Guard>,
    actions: Vec<Assign>,
}

impl TransitionBuilder {
    /// Create a transition to `target`.
    pub fn to(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            guard: None,
            actions: Vec::new(),
        }
    }

    /// Add a guard (optional).
    pub fn guard(mut self, guard: Guard) -> Self {
        self.guard = Some(guard);
        self
    }

    /// Add a guard using a closure (optional).
    pub fn when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Value, &Event) -> bool + Send + Sync + 'static,
    {
        self.guard = Some(Guard::new(predicate));
        self
    }

    /// Replace the context when the transition is taken. Runs after any
    /// previously added assignment.
    pub fn assign<F>(mut self, assign: F) -> Self
    where
        F: Fn(&Value, &Event) -> Value + Send + Sync + 'static,
    {
        self.actions.push(Arc::new(assign));
        self
    }

    /// Set a single context field from the event payload.
    pub fn assign_payload(self, field: impl Into<String>) -> Self {
        let field = field.into();
        self.assign(move |context, event| {
            let mut context = context.clone();
            if let Value::Object(fields) = &mut context {
                fields.insert(field.clone(), event.payload().unwrap_or(Value::Null));
            }
            context
        })
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn build(self) -> TransitionDef {
        TransitionDef {
            target: self.target,
            guard: self.guard,
            actions: self.actions,
        }
    }
}

impl From<&str> for TransitionBuilder {
    fn from(target: &str) -> Self {
        Self::to(target)
    }
}

impl From<String> for TransitionBuilder {
    fn from(target: String) -> Self {
        Self::to(target)
    }
}
