//! Awaitable send: one event in, one settled result out.
//!
//! A state machine interpreter reports its progress as a stream of
//! transitions. Callers usually want something simpler: send an event and
//! wait until the machine has finished reacting to it. This crate turns the
//! transition stream into a single future per sent event.
//!
//! The crate follows the "pure core, imperative shell" split:
//!
//! - [`core`]: events, snapshots, the reserved event namespace and the
//!   completion classifier deciding, per transition, whether a send is done,
//!   failed or still in progress. All pure.
//! - [`effects`]: the [`Interpreter`](effects::Interpreter) interface and the
//!   [`AwaitableSend`] wrapper that subscribes, dispatches and settles.
//! - [`machine`] and [`builder`]: a reference interpreter for flat machines
//!   with invoked processes, delayed transitions and final states.
//!
//! # Core Concepts
//!
//! - **Resting state**: the machine waits for consumer input and has no
//!   internal work pending. A send settles there by default.
//! - **Final state**: the machine is done. Always settles the send.
//! - **Wait condition**: settle early on a specific invocation or child
//!   state completing, or on a caller predicate.
//! - **Error markers**: an error event from the machine rejects the send.
//!
//! # Example
//!
//! ```rust
//! use awaitable_send::builder::{invoke, transition, MachineBuilder, StateBuilder};
//! use awaitable_send::{create_awaitable_send, SendOptions};
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let machine = MachineBuilder::new("lookup")
//!     .initial("idle")
//!     .context(json!({ "user": null }))
//!     .state(StateBuilder::new("idle").on("FETCH", "loading"))
//!     .state(
//!         StateBuilder::new("loading").invoke(
//!             invoke("getUser", |_| async { Ok(json!({ "name": "Ada" })) })
//!                 .on_done(transition("ready").assign_payload("user")),
//!         ),
//!     )
//!     .state(StateBuilder::new("ready").on("FETCH", "loading"))
//!     .build()?;
//!
//! let send = create_awaitable_send(machine, SendOptions::new())?;
//! let completion = send.send("FETCH").await?;
//!
//! assert!(completion.snapshot.matches("ready"));
//! assert_eq!(completion.snapshot.context["user"]["name"], "Ada");
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod core;
pub mod effects;
pub mod error;
pub mod machine;

// Re-export commonly used types
pub use crate::core::{Completion, Event, Snapshot, StateValue, WaitUntil};
pub use builder::{MachineBuilder, StateBuilder};
pub use effects::{create_awaitable_send, AwaitableSend, Interpreter, SendOptions};
pub use error::{ConfigError, MachineError, SendError};
pub use machine::{Machine, Service};
