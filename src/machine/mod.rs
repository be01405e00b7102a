//! Reference interpreter.
//!
//! Flat machines with guarded transitions, context assignment, eventless and
//! delayed transitions, invoked processes and final states. [`Machine`] is
//! the pure definition; [`Service`] is the imperative shell that runs it.
//!
//! A [`Machine`] can be handed to
//! [`create_awaitable_send`](crate::effects::create_awaitable_send)
//! directly: it is converted into a fresh, not yet started [`Service`].

mod definition;
mod service;

pub use definition::{
    Assign, Delay, DoneData, InvokeDef, InvokeFuture, InvokeSource, Machine, StateNode, Step,
    TransitionDef, MAX_EVENTLESS_STEPS,
};
pub use service::Service;

use crate::effects::IntoInterpreter;

impl IntoInterpreter for Machine {
    type Interpreter = Service;

    fn into_interpreter(self) -> Service {
        Service::new(self)
    }
}
