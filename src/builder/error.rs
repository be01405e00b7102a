//! Build errors for machine definitions.

use thiserror::Error;

/// Problems found while validating a machine definition.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("Machine id must not be empty")]
    MissingId,

    #[error("Initial state not specified. Call .initial(state) before .build()")]
    MissingInitialState,

    #[error("Initial state '{0}' is not defined")]
    UnknownInitialState(String),

    #[error("No states defined. Add at least one state")]
    NoStates,

    #[error("State '{0}' is defined more than once")]
    DuplicateState(String),

    #[error("Transition from '{from}' on '{event}' targets undefined state '{target}'")]
    UnknownTarget {
        from: String,
        event: String,
        target: String,
    },

    #[error("Invocation id '{0}' is used by more than one state")]
    DuplicateInvokeId(String),

    #[error("Final state '{0}' must not declare outgoing transitions")]
    FinalStateTransitions(String),
}

/// Every problem found in a machine definition.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid machine definition: {}", render(.errors))]
pub struct InvalidMachine {
    pub errors: Vec<BuildError>,
}

fn render(errors: &[BuildError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
