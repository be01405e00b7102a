//! Caller-supplied wait conditions.
//!
//! A wait condition replaces the default resting-state detection: once one is
//! configured, a send settles only when the condition matches (or on error or
//! machine completion).

use crate::core::event::Event;
use crate::core::snapshot::Snapshot;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Which kind of completion marker a [`DoneCondition`] matches.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DoneTarget {
    /// Completion of an invoked process.
    #[default]
    Invoke,
    /// Completion of a child state.
    State,
}

impl FromStr for DoneTarget {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "invoke" => Ok(Self::Invoke),
            "state" => Ok(Self::State),
            other => Err(ConfigError::UnknownDoneTarget(other.to_string())),
        }
    }
}

/// Match a specific completion marker by identifier.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoneCondition {
    pub id: String,

    #[serde(rename = "type", default)]
    pub target: DoneTarget,
}

/// Predicate over a transition.
pub type WaitPredicate = Arc<dyn Fn(&Snapshot, &Event) -> bool + Send + Sync>;

/// Early-resolution condition for a send.
///
/// A [`DoneCondition`] identifier must contain something other than
/// whitespace. A blank id would only ever match a bare `done.invoke.` marker,
/// which no interpreter emits for a real invocation, so it is rejected up
/// front with [`ConfigError::EmptyWaitIdentifier`]. Any other string is
/// accepted verbatim, surrounding whitespace included.
///
/// # Example
///
/// ```rust
/// use awaitable_send::core::{DoneTarget, WaitUntil};
///
/// let by_invoke = WaitUntil::invoke("fetch-user");
/// let by_state = WaitUntil::state("checkout");
/// let by_value = WaitUntil::predicate(|snapshot, _event| snapshot.matches("ready"));
///
/// let parsed: WaitUntil = serde_json::from_str(r#"{ "id": "checkout", "type": "state" }"#)
///     .map(WaitUntil::Done)
///     .unwrap();
/// assert!(matches!(parsed, WaitUntil::Done(c) if c.target == DoneTarget::State));
/// # let _ = (by_invoke, by_state, by_value);
/// ```
#[derive(Clone)]
pub enum WaitUntil {
    Done(DoneCondition),
    Predicate(WaitPredicate),
}

impl WaitUntil {
    /// Wait for the invoked process `id` to complete.
    pub fn invoke(id: impl Into<String>) -> Self {
        Self::Done(DoneCondition {
            id: id.into(),
            target: DoneTarget::Invoke,
        })
    }

    /// Wait for the child state `id` to complete.
    pub fn state(id: impl Into<String>) -> Self {
        Self::Done(DoneCondition {
            id: id.into(),
            target: DoneTarget::State,
        })
    }

    /// Build from an identifier and an optional textual discriminator.
    pub fn done(id: impl Into<String>, target: Option<&str>) -> Result<Self, ConfigError> {
        let target = target.map(str::parse::<DoneTarget>).transpose()?.unwrap_or_default();
        let condition = Self::Done(DoneCondition {
            id: id.into(),
            target,
        });
        condition.validate()?;
        Ok(condition)
    }

    pub fn predicate<F>(predicate: F) -> Self
    where
        F: Fn(&Snapshot, &Event) -> bool + Send + Sync + 'static,
    {
        Self::Predicate(Arc::new(predicate))
    }

    /// Reject empty and whitespace-only identifiers.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::Done(condition) if condition.id.trim().is_empty() => {
                Err(ConfigError::EmptyWaitIdentifier)
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Debug for WaitUntil {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Done(condition) => f.debug_tuple("Done").field(condition).finish(),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

impl From<DoneCondition> for WaitUntil {
    fn from(condition: DoneCondition) -> Self {
        Self::Done(condition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discriminator_defaults_to_invoke() {
        let condition: DoneCondition = serde_json::from_str(r#"{ "id": "invoker-1" }"#).unwrap();
        assert_eq!(condition.target, DoneTarget::Invoke);
    }

    #[test]
    fn unknown_discriminator_is_rejected() {
        let result = WaitUntil::done("invoker-1", Some("activity"));
        assert!(matches!(result, Err(ConfigError::UnknownDoneTarget(t)) if t == "activity"));
    }

    #[test]
    fn empty_identifier_is_rejected() {
        assert!(matches!(
            WaitUntil::done("  ", None),
            Err(ConfigError::EmptyWaitIdentifier)
        ));
        assert!(WaitUntil::invoke("").validate().is_err());
        assert!(WaitUntil::state("child").validate().is_ok());
    }

    #[test]
    fn padded_identifier_is_kept_verbatim() {
        let wait = WaitUntil::done(" fetch ", Some("invoke")).unwrap();
        assert!(matches!(wait, WaitUntil::Done(c) if c.id == " fetch "));
    }

    #[test]
    fn predicates_always_validate() {
        let wait = WaitUntil::predicate(|_, _| false);
        assert!(wait.validate().is_ok());
        assert_eq!(format!("{wait:?}"), "Predicate(..)");
    }
}
