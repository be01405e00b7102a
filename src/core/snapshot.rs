//! Transition snapshots.
//!
//! A snapshot is the read-only picture of a machine after one step: which
//! state node is active, the machine's context, and the event types that could
//! cause a further transition.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Identifies the active state node, possibly within composite states.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StateValue {
    /// An atomic state, e.g. `"success"`.
    Leaf(String),

    /// A composite state mapping each parent to its active child.
    Compound(BTreeMap<String, StateValue>),
}

impl StateValue {
    /// Check whether `name` is active anywhere in this value.
    pub fn matches(&self, name: &str) -> bool {
        match self {
            Self::Leaf(leaf) => leaf == name,
            Self::Compound(children) => children
                .iter()
                .any(|(parent, child)| parent == name || child.matches(name)),
        }
    }
}

impl From<&str> for StateValue {
    fn from(name: &str) -> Self {
        Self::Leaf(name.to_string())
    }
}

impl From<String> for StateValue {
    fn from(name: String) -> Self {
        Self::Leaf(name)
    }
}

impl PartialEq<&str> for StateValue {
    fn eq(&self, other: &&str) -> bool {
        matches!(self, Self::Leaf(leaf) if leaf == other)
    }
}

impl fmt::Display for StateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Leaf(leaf) => f.write_str(leaf),
            Self::Compound(children) => {
                let parts: Vec<String> = children
                    .iter()
                    .map(|(parent, child)| format!("{parent}.{child}"))
                    .collect();
                f.write_str(&parts.join(","))
            }
        }
    }
}

/// Immutable record of a machine after one internal step.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Active state node.
    pub value: StateValue,

    /// Data owned by the machine.
    pub context: Value,

    /// Event types that could currently cause another transition.
    pub next_events: BTreeSet<String>,

    /// Whether the step changed the active state or the context.
    #[serde(default)]
    pub changed: bool,

    /// Whether the machine has reached its designated final state.
    #[serde(default)]
    pub done: bool,
}

impl Snapshot {
    pub fn new(value: impl Into<StateValue>, context: Value) -> Self {
        Self {
            value: value.into(),
            context,
            next_events: BTreeSet::new(),
            changed: false,
            done: false,
        }
    }

    pub fn with_next_events<I, E>(mut self, events: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<String>,
    {
        self.next_events = events.into_iter().map(Into::into).collect();
        self
    }

    /// Check whether `name` is an active state.
    pub fn matches(&self, name: &str) -> bool {
        self.value.matches(name)
    }

    /// Serialize into plain JSON.
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn leaf_compares_with_str() {
        let value = StateValue::from("penultimate");
        assert_eq!(value, "penultimate");
        assert!(value.matches("penultimate"));
        assert!(!value.matches("finality"));
    }

    #[test]
    fn compound_matches_parent_and_child() {
        let mut children = BTreeMap::new();
        children.insert("checkout".to_string(), StateValue::from("payment"));
        let value = StateValue::Compound(children);

        assert!(value.matches("checkout"));
        assert!(value.matches("payment"));
        assert!(!value.matches("cart"));
        assert_eq!(value.to_string(), "checkout.payment");
    }

    #[test]
    fn snapshot_serializes_in_camel_case() {
        let snapshot = Snapshot::new("idle", json!({ "count": 1 }))
            .with_next_events(["GO", "STOP"]);

        let json = snapshot.to_json();
        assert_eq!(json["value"], json!("idle"));
        assert_eq!(json["context"]["count"], json!(1));
        assert_eq!(json["nextEvents"], json!(["GO", "STOP"]));

        let restored: Snapshot = serde_json::from_value(json).unwrap();
        assert_eq!(restored, snapshot);
    }
}
