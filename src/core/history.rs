//! Transition history tracking.
//!
//! Provides immutable tracking of the transitions an interpreter took,
//! following functional programming principles.

use crate::core::snapshot::StateValue;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Record of a single transition.
///
/// # Example
///
/// ```rust
/// use awaitable_send::core::{StateTransition, StateValue};
/// use chrono::Utc;
///
/// let transition = StateTransition {
///     from: StateValue::from("initial"),
///     to: StateValue::from("gettingUser"),
///     event_type: "START".to_string(),
///     timestamp: Utc::now(),
/// };
/// assert_eq!(transition.event_type, "START");
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateTransition {
    /// The state being transitioned from
    pub from: StateValue,
    /// The state being transitioned to
    pub to: StateValue,
    /// Type of the event that drove the transition
    pub event_type: String,
    /// When the transition occurred
    pub timestamp: DateTime<Utc>,
}

/// Ordered history of transitions.
///
/// History is immutable - the `record` method returns a new history
/// with the transition added.
///
/// # Example
///
/// ```rust
/// use awaitable_send::core::{StateHistory, StateTransition, StateValue};
/// use chrono::Utc;
///
/// let history = StateHistory::new()
///     .record(StateTransition {
///         from: "initial".into(),
///         to: "gettingUser".into(),
///         event_type: "START".to_string(),
///         timestamp: Utc::now(),
///     })
///     .record(StateTransition {
///         from: "gettingUser".into(),
///         to: "success".into(),
///         event_type: "done.invoke.getUserInfo".to_string(),
///         timestamp: Utc::now(),
///     });
///
/// let path = history.get_path();
/// assert_eq!(path.len(), 3);
/// assert_eq!(path[2], &StateValue::from("success"));
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StateHistory {
    transitions: Vec<StateTransition>,
}

impl StateHistory {
    pub fn new() -> Self {
        Self {
            transitions: Vec::new(),
        }
    }

    /// Record a transition, returning a new history.
    ///
    /// This does not mutate the existing history.
    pub fn record(&self, transition: StateTransition) -> Self {
        let mut transitions = self.transitions.clone();
        transitions.push(transition);
        Self { transitions }
    }

    /// Get the path of states traversed.
    ///
    /// Returns the initial state, then the `to` state of each transition.
    pub fn get_path(&self) -> Vec<&StateValue> {
        let mut path = Vec::new();
        if let Some(first) = self.transitions.first() {
            path.push(&first.from);
        }
        for transition in &self.transitions {
            path.push(&transition.to);
        }
        path
    }

    /// Time between the first and last recorded transitions.
    pub fn duration(&self) -> Option<Duration> {
        let (first, last) = (self.transitions.first()?, self.transitions.last()?);
        last.timestamp
            .signed_duration_since(first.timestamp)
            .to_std()
            .ok()
    }

    /// Types of the events that drove each transition, in order.
    pub fn event_types(&self) -> Vec<&str> {
        self.transitions
            .iter()
            .map(|transition| transition.event_type.as_str())
            .collect()
    }

    pub fn transitions(&self) -> &[StateTransition] {
        &self.transitions
    }
}
