//! Reserved event-type namespace.
//!
//! Interpreters mark lifecycle steps, invocation results and errors with
//! event types drawn from a fixed set of reserved prefixes. The table is owned
//! by the interpreter and injected here; [`EventNamespace::kind_of`] turns a
//! raw type tag into an [`EventKind`] once, so prefix matching lives in a
//! single place.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The four error categories an interpreter can signal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    /// A spawned process failed.
    Platform,
    /// A communication fault occurred.
    Communication,
    /// An action threw while executing.
    Execution,
    /// A custom error event was raised.
    Custom,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Platform => "platform",
            Self::Communication => "communication",
            Self::Execution => "execution",
            Self::Custom => "custom",
        };
        f.write_str(name)
    }
}

/// Classification of a raw event type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventKind<'a> {
    /// The interpreter's own start-up marker.
    Init,
    /// An error marker.
    Error(ErrorCategory),
    /// Completion of the invoked process with the given id.
    DoneInvoke(&'a str),
    /// Completion of the child state with the given id.
    DoneState(&'a str),
    /// Any other reserved event.
    Internal,
    /// A consumer-facing event.
    External,
}

impl EventKind<'_> {
    pub fn is_internal(&self) -> bool {
        !matches!(self, Self::External)
    }
}

/// Reserved event-type spellings of an interpreter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventNamespace {
    /// Exact type of the start-up marker.
    pub init: String,

    /// Exact type of the eventless ("always") transition key.
    pub null_event: String,

    pub error_platform: String,
    pub error_communication: String,
    pub error_execution: String,
    pub error_custom: String,

    /// Prefix of invocation completion markers (`<prefix>.<id>`).
    pub done_invoke: String,

    /// Prefix of child-state completion markers (`<prefix>.<id>`).
    pub done_state: String,

    /// Prefix of delayed-transition timer events
    /// (`<prefix>(<millis>)#<machine>.<state>`).
    pub delayed: String,

    /// Every reserved prefix. A type starting with any of these is internal.
    pub internal_prefixes: Vec<String>,
}

impl Default for EventNamespace {
    fn default() -> Self {
        let internal_prefixes = [
            "xstate.start",
            "xstate.stop",
            "xstate.raise",
            "xstate.send",
            "xstate.cancel",
            "xstate.assign",
            "xstate.after",
            "done.state",
            "done.invoke",
            "xstate.log",
            "xstate.init",
            "xstate.invoke",
            "error.execution",
            "error.communication",
            "error.platform",
            "xstate.error",
            "xstate.update",
            "xstate.pure",
            "xstate.choose",
        ]
        .into_iter()
        .map(String::from)
        .collect();

        Self {
            init: "xstate.init".to_string(),
            null_event: String::new(),
            error_platform: "error.platform".to_string(),
            error_communication: "error.communication".to_string(),
            error_execution: "error.execution".to_string(),
            error_custom: "xstate.error".to_string(),
            done_invoke: "done.invoke".to_string(),
            done_state: "done.state".to_string(),
            delayed: "xstate.after".to_string(),
            internal_prefixes,
        }
    }
}

impl EventNamespace {
    /// Classify a raw event type.
    ///
    /// # Example
    ///
    /// ```rust
    /// use awaitable_send::core::{ErrorCategory, EventKind, EventNamespace};
    ///
    /// let ns = EventNamespace::default();
    /// assert_eq!(ns.kind_of("xstate.init"), EventKind::Init);
    /// assert_eq!(ns.kind_of("done.invoke.fetch"), EventKind::DoneInvoke("fetch"));
    /// assert_eq!(
    ///     ns.kind_of("error.platform.fetch"),
    ///     EventKind::Error(ErrorCategory::Platform)
    /// );
    /// assert_eq!(ns.kind_of("SUBMIT"), EventKind::External);
    /// ```
    pub fn kind_of<'a>(&self, event_type: &'a str) -> EventKind<'a> {
        if event_type == self.init {
            return EventKind::Init;
        }

        if let Some(category) = self.error_category(event_type) {
            return EventKind::Error(category);
        }

        if let Some(id) = done_id(event_type, &self.done_invoke) {
            return EventKind::DoneInvoke(id);
        }

        if let Some(id) = done_id(event_type, &self.done_state) {
            return EventKind::DoneState(id);
        }

        if self.is_internal(event_type) {
            EventKind::Internal
        } else {
            EventKind::External
        }
    }

    /// Check whether `event_type` belongs to the reserved namespace.
    pub fn is_internal(&self, event_type: &str) -> bool {
        event_type == self.null_event
            || self
                .internal_prefixes
                .iter()
                .any(|prefix| !prefix.is_empty() && event_type.starts_with(prefix.as_str()))
    }

    /// The completion marker for an invoked process.
    pub fn done_invoke_event(&self, id: &str) -> String {
        format!("{}.{}", self.done_invoke, id)
    }

    /// The completion marker for a child state or machine.
    pub fn done_state_event(&self, id: &str) -> String {
        format!("{}.{}", self.done_state, id)
    }

    /// The timer event of a transition taken `millis` after entering `state`.
    pub fn delay_event(&self, machine: &str, state: &str, millis: u128) -> String {
        format!("{}({millis})#{machine}.{state}", self.delayed)
    }

    /// The failure marker for an invoked process.
    pub fn error_platform_event(&self, id: &str) -> String {
        format!("{}.{}", self.error_platform, id)
    }

    fn error_category(&self, event_type: &str) -> Option<ErrorCategory> {
        [
            (&self.error_platform, ErrorCategory::Platform),
            (&self.error_communication, ErrorCategory::Communication),
            (&self.error_execution, ErrorCategory::Execution),
            (&self.error_custom, ErrorCategory::Custom),
        ]
        .into_iter()
        .find(|(prefix, _)| !prefix.is_empty() && event_type.starts_with(prefix.as_str()))
        .map(|(_, category)| category)
    }
}

fn done_id<'a>(event_type: &'a str, prefix: &str) -> Option<&'a str> {
    if prefix.is_empty() {
        return None;
    }
    event_type.strip_prefix(prefix)?.strip_prefix('.')
}
