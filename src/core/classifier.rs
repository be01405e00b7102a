//! Completion classification.
//!
//! Decides, for one observed transition, whether a pending send should keep
//! waiting, resolve, or reject. Pure: the verdict depends only on the
//! snapshot, the driving event and the options.

use crate::core::event::{Event, EventData};
use crate::core::namespace::{ErrorCategory, EventKind, EventNamespace};
use crate::core::snapshot::Snapshot;
use crate::core::wait::{DoneTarget, WaitUntil};
use crate::error::MachineError;
use serde::Serialize;
use serde_json::Value;

/// Settled result of a send: the snapshot and the completion payload.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Completion {
    pub snapshot: Snapshot,
    pub data: Option<Value>,
}

impl Completion {
    pub fn new(snapshot: Snapshot, event: &Event) -> Self {
        Self {
            snapshot,
            data: event.payload(),
        }
    }

    pub fn into_parts(self) -> (Snapshot, Option<Value>) {
        (self.snapshot, self.data)
    }
}

/// Outcome of classifying one transition.
#[derive(Clone, Debug)]
pub enum Verdict {
    /// Not finished; keep listening.
    Ignore,
    /// Settle successfully.
    Done(Completion),
    /// Settle with an error.
    Error(MachineError),
}

impl Verdict {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Ignore)
    }
}

/// Inputs to [`classify`] besides the transition itself.
#[derive(Clone, Debug, Default)]
pub struct ClassifyOptions {
    pub wait_until: Option<WaitUntil>,
    pub namespace: EventNamespace,
}

/// Classify a transition. The first matching rule wins:
///
/// 1. the start-up marker is always ignored;
/// 2. error markers reject;
/// 3. a configured wait condition resolves on match and ignores everything
///    else;
/// 4. otherwise the transition resolves when the machine is resting.
///
/// # Example
///
/// ```rust
/// use awaitable_send::core::{classify, ClassifyOptions, Event, Snapshot, Verdict};
/// use serde_json::json;
///
/// let options = ClassifyOptions::default();
///
/// let waiting = Snapshot::new("penultimate", json!({})).with_next_events(["SELECT", "BACK"]);
/// assert!(matches!(classify(&waiting, &Event::new("START"), &options), Verdict::Done(_)));
///
/// let busy = Snapshot::new("loading", json!({})).with_next_events(["done.invoke.fetch"]);
/// assert!(matches!(classify(&busy, &Event::new("START"), &options), Verdict::Ignore));
/// ```
pub fn classify(snapshot: &Snapshot, event: &Event, options: &ClassifyOptions) -> Verdict {
    let namespace = &options.namespace;
    let kind = namespace.kind_of(event.event_type());

    match kind {
        EventKind::Init => return Verdict::Ignore,
        EventKind::Error(category) => return Verdict::Error(machine_error(category, event)),
        _ => {}
    }

    if let Some(wait_until) = &options.wait_until {
        return if wait_matches(wait_until, kind, snapshot, event) {
            Verdict::Done(Completion::new(snapshot.clone(), event))
        } else {
            Verdict::Ignore
        };
    }

    if is_resting(snapshot, event.event_type(), namespace) {
        Verdict::Done(Completion::new(snapshot.clone(), event))
    } else {
        Verdict::Ignore
    }
}

/// Whether the machine can only advance on new external input.
///
/// Resting means either nothing can happen at all, or at least one
/// consumer-facing event other than the one just handled is accepted while
/// no reserved event is pending. Pending internal work always wins.
pub fn is_resting(snapshot: &Snapshot, event_type: &str, namespace: &EventNamespace) -> bool {
    let next = &snapshot.next_events;
    if next.is_empty() {
        return true;
    }

    let (internal, external): (Vec<&String>, Vec<&String>) =
        next.iter().partition(|candidate| namespace.is_internal(candidate));
    let consumer = external
        .iter()
        .filter(|candidate| candidate.as_str() != event_type)
        .count();

    consumer > 0 && internal.is_empty()
}

fn wait_matches(
    wait_until: &WaitUntil,
    kind: EventKind<'_>,
    snapshot: &Snapshot,
    event: &Event,
) -> bool {
    match wait_until {
        WaitUntil::Done(condition) => match (condition.target, kind) {
            (DoneTarget::Invoke, EventKind::DoneInvoke(id)) => id == condition.id,
            (DoneTarget::State, EventKind::DoneState(id)) => id == condition.id,
            _ => false,
        },
        WaitUntil::Predicate(predicate) => predicate(snapshot, event),
    }
}

fn machine_error(category: ErrorCategory, event: &Event) -> MachineError {
    let event_type = event.event_type().to_string();
    match event.data() {
        Some(EventData::Error(error)) => MachineError::Raised {
            category,
            event_type,
            error: error.clone(),
        },
        Some(EventData::Value(Value::String(message))) => MachineError::Message {
            category,
            event_type,
            message: message.clone(),
        },
        Some(EventData::Value(value)) => MachineError::Message {
            category,
            event_type,
            message: value.to_string(),
        },
        None => MachineError::Message {
            category,
            event_type,
            message: String::new(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    #[derive(Debug, thiserror::Error)]
    #[error("This is an error.")]
    struct Boom;

    fn snapshot(value: &str, next: &[&str]) -> Snapshot {
        Snapshot::new(value, json!({})).with_next_events(next.iter().copied())
    }

    fn waiting_for(wait_until: WaitUntil) -> ClassifyOptions {
        ClassifyOptions {
            wait_until: Some(wait_until),
            ..ClassifyOptions::default()
        }
    }

    #[test]
    fn init_marker_is_ignored_even_when_resting() {
        let verdict = classify(
            &snapshot("initial", &["START"]),
            &Event::new("xstate.init"),
            &ClassifyOptions::default(),
        );
        assert!(matches!(verdict, Verdict::Ignore));
    }

    #[test]
    fn init_marker_is_ignored_before_wait_condition() {
        let options = waiting_for(WaitUntil::predicate(|_, _| true));
        let verdict = classify(&snapshot("initial", &[]), &Event::new("xstate.init"), &options);
        assert!(matches!(verdict, Verdict::Ignore));
    }

    #[test]
    fn raised_error_is_surfaced_unchanged() {
        let raised: crate::core::RaisedError = Arc::new(Boom);
        let event = Event::new("error.platform.invoker-2").with_error(Arc::clone(&raised));

        let verdict = classify(&snapshot("invoker2Errored", &[]), &event, &ClassifyOptions::default());

        match verdict {
            Verdict::Error(error) => {
                assert!(Arc::ptr_eq(error.raised().unwrap(), &raised));
                assert_eq!(error.to_string(), "This is an error.");
                assert_eq!(error.category(), ErrorCategory::Platform);
            }
            other => panic!("Expected error verdict, got {other:?}"),
        }
    }

    #[test]
    fn plain_payload_is_wrapped_as_message() {
        let event = Event::new("xstate.error").with_data(json!("quota exceeded"));
        let verdict = classify(&snapshot("x", &[]), &event, &ClassifyOptions::default());
        match verdict {
            Verdict::Error(error) => {
                assert_eq!(error.to_string(), "quota exceeded");
                assert_eq!(error.category(), ErrorCategory::Custom);
            }
            other => panic!("Expected error verdict, got {other:?}"),
        }

        let event = Event::new("error.execution").with_data(json!({ "code": 7 }));
        let verdict = classify(&snapshot("x", &[]), &event, &ClassifyOptions::default());
        assert!(matches!(verdict, Verdict::Error(e) if e.to_string() == r#"{"code":7}"#));

        let event = Event::new("error.communication");
        let verdict = classify(&snapshot("x", &[]), &event, &ClassifyOptions::default());
        assert!(matches!(verdict, Verdict::Error(e) if e.to_string().is_empty()));
    }

    #[test]
    fn errors_take_precedence_over_wait_condition() {
        let options = waiting_for(WaitUntil::predicate(|_, _| true));
        let event = Event::new("error.platform.fetch").with_data(json!("nope"));
        let verdict = classify(&snapshot("x", &[]), &event, &options);
        assert!(matches!(verdict, Verdict::Error(_)));
    }

    #[test]
    fn wait_condition_matches_exact_invoke_marker() {
        let options = waiting_for(WaitUntil::invoke("invoker-1"));
        let busy = snapshot("invoker1Succeeded", &["done.invoke.invoker-2", "error.platform.invoker-2"]);

        let event = Event::new("done.invoke.invoker-1").with_data(json!("Hello World!"));
        match classify(&busy, &event, &options) {
            Verdict::Done(completion) => {
                assert_eq!(completion.snapshot.value, "invoker1Succeeded");
                assert_eq!(completion.data, Some(json!("Hello World!")));
            }
            other => panic!("Expected done verdict, got {other:?}"),
        }

        let longer = Event::new("done.invoke.invoker-10");
        assert!(matches!(classify(&busy, &longer, &options), Verdict::Ignore));

        let wrong_kind = Event::new("done.state.invoker-1");
        assert!(matches!(classify(&busy, &wrong_kind, &options), Verdict::Ignore));
    }

    #[test]
    fn wait_condition_matches_state_marker() {
        let options = waiting_for(WaitUntil::state("checkout"));
        let event = Event::new("done.state.checkout");
        let verdict = classify(&snapshot("paid", &["done.invoke.x"]), &event, &options);
        assert!(matches!(verdict, Verdict::Done(_)));
    }

    #[test]
    fn wait_condition_suppresses_resting_detection() {
        let options = waiting_for(WaitUntil::invoke("never"));
        let resting = snapshot("penultimate", &["SELECT", "BACK"]);
        assert!(matches!(
            classify(&resting, &Event::new("START"), &options),
            Verdict::Ignore
        ));
        assert!(matches!(
            classify(&snapshot("empty", &[]), &Event::new("START"), &options),
            Verdict::Ignore
        ));
    }

    #[test]
    fn predicate_sees_snapshot_and_event() {
        let options = waiting_for(WaitUntil::predicate(|snapshot, event| {
            snapshot.matches("ready") && event.event_type() == "LOADED"
        }));

        let ready = snapshot("ready", &["done.invoke.more"]);
        assert!(matches!(classify(&ready, &Event::new("LOADED"), &options), Verdict::Done(_)));
        assert!(matches!(classify(&ready, &Event::new("OTHER"), &options), Verdict::Ignore));
    }

    #[test]
    fn no_next_events_is_resting() {
        let verdict = classify(&snapshot("empty", &[]), &Event::new("START"), &ClassifyOptions::default());
        assert!(matches!(verdict, Verdict::Done(c) if c.snapshot.value == "empty"));
    }

    #[test]
    fn consumer_events_without_internal_events_is_resting() {
        let verdict = classify(
            &snapshot("penultimate", &["BACK", "SELECT"]),
            &Event::new("START"),
            &ClassifyOptions::default(),
        );
        assert!(matches!(verdict, Verdict::Done(_)));
    }

    #[test]
    fn internal_events_prevent_resting() {
        let busy = snapshot("gettingUser", &["done.invoke.getUserInfo", "CANCEL"]);
        let verdict = classify(&busy, &Event::new("START"), &ClassifyOptions::default());
        assert!(matches!(verdict, Verdict::Ignore));

        let eventless = snapshot("checking", &["", "RETRY"]);
        let verdict = classify(&eventless, &Event::new("START"), &ClassifyOptions::default());
        assert!(matches!(verdict, Verdict::Ignore));
    }

    #[test]
    fn self_accepting_state_is_not_resting() {
        let looping = snapshot("polling", &["PING"]);
        let verdict = classify(&looping, &Event::new("PING"), &ClassifyOptions::default());
        assert!(matches!(verdict, Verdict::Ignore));

        // A different driving event sees PING as a consumer event.
        let verdict = classify(&looping, &Event::new("START"), &ClassifyOptions::default());
        assert!(matches!(verdict, Verdict::Done(_)));
    }

    #[test]
    fn completion_payload_comes_from_driving_event() {
        let event = Event::new("done.invoke.getUserFriends").with_data(json!([1, 2]));
        let verdict = classify(&snapshot("success", &[]), &event, &ClassifyOptions::default());
        match verdict {
            Verdict::Done(completion) => {
                let (snapshot, data) = completion.into_parts();
                assert_eq!(snapshot.value, "success");
                assert_eq!(data, Some(json!([1, 2])));
            }
            other => panic!("Expected done verdict, got {other:?}"),
        }
    }
}
