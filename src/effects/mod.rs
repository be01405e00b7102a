//! The async shell around the pure core.
//!
//! # Key Concepts
//!
//! - **Interpreter**: the running machine being observed, consumed through a
//!   small trait so any engine can be plugged in
//! - **Awaitable send**: dispatches one event and settles exactly once, on the
//!   first transition the classifier judges terminal or on machine completion
//! - **Subscriptions**: scoped to a single send and released on settlement

mod interpreter;
mod send;

pub use interpreter::{
    DoneListener, IntoInterpreter, Interpreter, InterpreterStatus, Subscription,
    TransitionListener,
};
pub use send::{
    create_awaitable_send, AwaitableSend, ObserverFuture, SendOptions, TransitionObserver,
};
