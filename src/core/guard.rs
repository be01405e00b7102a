//! Guard predicates for controlling transitions.
//!
//! Guards are pure boolean functions over the machine context and the driving
//! event. A guarded transition is only taken when its guard passes.

use crate::core::event::Event;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Pure predicate that determines if a transition can be taken.
///
/// # Example
///
/// ```rust
/// use awaitable_send::core::{Event, Guard};
/// use serde_json::json;
///
/// let has_user = Guard::new(|context, _event| !context["user"].is_null());
///
/// assert!(has_user.check(&json!({ "user": { "id": 42 } }), &Event::new("NEXT")));
/// assert!(!has_user.check(&json!({ "user": null }), &Event::new("NEXT")));
/// ```
#[derive(Clone)]
pub struct Guard {
    predicate: Arc<dyn Fn(&Value, &Event) -> bool + Send + Sync>,
}

impl Guard {
    /// Create a guard from a pure predicate function.
    ///
    /// The predicate must be deterministic and thread-safe (Send + Sync).
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&Value, &Event) -> bool + Send + Sync + 'static,
    {
        Guard {
            predicate: Arc::new(predicate),
        }
    }

    /// Check if the guard allows the transition.
    pub fn check(&self, context: &Value, event: &Event) -> bool {
        (self.predicate)(context, event)
    }

    /// Guard passing only when both guards pass.
    pub fn and(self, other: Guard) -> Guard {
        Guard::new(move |context, event| self.check(context, event) && other.check(context, event))
    }

    /// Guard passing when this one fails.
    pub fn negate(self) -> Guard {
        Guard::new(move |context, event| !self.check(context, event))
    }
}

impl fmt::Debug for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Guard(..)")
    }
}
