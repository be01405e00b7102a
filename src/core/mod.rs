//! Core types and logic.
//!
//! This module contains the pure functional core:
//! - Events, snapshots and the reserved event namespace
//! - Wait conditions and the completion classifier
//! - Guard predicates and immutable history used by the reference interpreter
//!
//! All logic in this module is pure (no side effects), following
//! the "pure core, imperative shell" philosophy.

mod classifier;
mod event;
mod guard;
mod history;
mod namespace;
mod snapshot;
mod wait;

pub use classifier::{classify, is_resting, ClassifyOptions, Completion, Verdict};
pub use event::{Event, EventData, IntoEvent, RaisedError};
pub use guard::Guard;
pub use history::{StateHistory, StateTransition};
pub use namespace::{ErrorCategory, EventKind, EventNamespace};
pub use snapshot::{Snapshot, StateValue};
pub use wait::{DoneCondition, DoneTarget, WaitPredicate, WaitUntil};
