//! Builder API for ergonomic machine construction.
//!
//! This module provides fluent builders for flat machine definitions run by
//! the reference [`Service`](crate::machine::Service). Definitions are
//! validated as a whole: every problem is reported, not just the first.

pub mod error;
pub mod machine;
pub mod state;
pub mod transition;

pub use error::{BuildError, InvalidMachine};
pub use machine::MachineBuilder;
pub use state::{InvokeBuilder, StateBuilder};
pub use transition::TransitionBuilder;

use crate::core::RaisedError;
use serde_json::Value;
use std::future::Future;

/// Start a transition to `target`.
///
/// # Example
///
/// ```
/// use awaitable_send::builder::{transition, StateBuilder};
///
/// let state = StateBuilder::new("editing").on(
///     "SAVE",
///     transition("saved").when(|context, _| context["dirty"] == true),
/// );
/// # let _ = state;
/// ```
pub fn transition(target: impl Into<String>) -> TransitionBuilder {
    TransitionBuilder::to(target)
}

/// Describe a process invoked on state entry.
///
/// # Example
///
/// ```
/// use awaitable_send::builder::{invoke, StateBuilder};
/// use serde_json::json;
///
/// let state = StateBuilder::new("loading").invoke(
///     invoke("getUser", |context| {
///         let id = context["userId"].clone();
///         async move { Ok(json!({ "id": id })) }
///     })
///     .on_done("loaded"),
/// );
/// # let _ = state;
/// ```
pub fn invoke<F, Fut>(id: impl Into<String>, src: F) -> InvokeBuilder
where
    F: Fn(&Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, RaisedError>> + Send + 'static,
{
    InvokeBuilder::new(id, src)
}
