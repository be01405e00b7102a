//! Error taxonomy for awaitable sends.

use crate::core::{ErrorCategory, RaisedError};
use thiserror::Error;

/// Error raised by a caller-supplied transition observer.
pub type ObserverError = Box<dyn std::error::Error + Send + Sync>;

/// Invalid arguments to the factory or to `send`.
///
/// Always raised before any subscription is made or event dispatched.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("The event argument must be supplied and must be a non-empty type or an event object with a type field")]
    MissingEvent,

    #[error("Invalid event argument: {found}")]
    InvalidEvent { found: String },

    #[error("The wait condition must contain a non-empty id")]
    EmptyWaitIdentifier,

    #[error("Unknown wait condition type '{0}', expected 'invoke' or 'state'")]
    UnknownDoneTarget(String),
}

/// An error signalled by the machine through an error-marker transition.
#[derive(Debug, Clone, Error)]
pub enum MachineError {
    /// The marker carried an error value; it is surfaced unchanged.
    #[error("{error}")]
    Raised {
        category: ErrorCategory,
        event_type: String,
        #[source]
        error: RaisedError,
    },

    /// The marker carried a plain value, wrapped as the error message.
    #[error("{message}")]
    Message {
        category: ErrorCategory,
        event_type: String,
        message: String,
    },
}

impl MachineError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Raised { category, .. } | Self::Message { category, .. } => *category,
        }
    }

    /// Type of the error-marker event.
    pub fn event_type(&self) -> &str {
        match self {
            Self::Raised { event_type, .. } | Self::Message { event_type, .. } => event_type,
        }
    }

    /// The error value raised by the machine, if any.
    pub fn raised(&self) -> Option<&RaisedError> {
        match self {
            Self::Raised { error, .. } => Some(error),
            Self::Message { .. } => None,
        }
    }
}

/// Failure of a single `send` call.
#[derive(Debug, Error)]
pub enum SendError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Machine(#[from] MachineError),

    #[error("Transition observer failed: {0}")]
    Observer(#[source] ObserverError),

    #[error("Interpreter closed its notification stream before the send settled")]
    Disconnected,
}

impl SendError {
    pub fn as_machine(&self) -> Option<&MachineError> {
        match self {
            Self::Machine(error) => Some(error),
            _ => None,
        }
    }
}

/// Failures of the reference service, raised into the machine as
/// `error.platform.<id>` events.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServiceError {
    #[error("No async runtime available to run invocation '{id}'")]
    NoRuntime { id: String },
}
