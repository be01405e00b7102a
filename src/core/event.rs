//! Driving events.
//!
//! An event is a type tag plus an optional payload. Events reach the core
//! either as the caller's external input or as markers synthesized by the
//! interpreter (lifecycle, invocation done, invocation error).

use crate::error::ConfigError;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Error value raised by a machine, e.g. by a failing invoked process.
pub type RaisedError = Arc<dyn std::error::Error + Send + Sync>;

/// Payload carried by an event.
#[derive(Clone)]
pub enum EventData {
    /// Structured data, such as the result of an invoked process.
    Value(Value),

    /// An error value, such as the failure of an invoked process.
    Error(RaisedError),
}

impl EventData {
    /// Render the payload as JSON. Errors render as their message.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Value(value) => value.clone(),
            Self::Error(error) => Value::String(error.to_string()),
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(value) => Some(value),
            Self::Error(_) => None,
        }
    }

    pub fn as_error(&self) -> Option<&RaisedError> {
        match self {
            Self::Value(_) => None,
            Self::Error(error) => Some(error),
        }
    }
}

impl fmt::Debug for EventData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Error(error) => f.debug_tuple("Error").field(&error.to_string()).finish(),
        }
    }
}

impl From<Value> for EventData {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

/// An event: a type tag plus an optional payload.
///
/// # Example
///
/// ```rust
/// use awaitable_send::core::Event;
/// use serde_json::json;
///
/// let start = Event::new("START");
/// assert_eq!(start.event_type(), "START");
/// assert!(start.data().is_none());
///
/// let select = Event::new("SELECT").with_data(json!({ "item": 3 }));
/// assert_eq!(select.data().and_then(|d| d.as_value()), Some(&json!({ "item": 3 })));
/// ```
#[derive(Clone, Debug)]
pub struct Event {
    event_type: String,
    data: Option<EventData>,
}

impl Event {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            data: None,
        }
    }

    /// Attach a structured payload.
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(EventData::Value(data));
        self
    }

    /// Attach an error payload.
    pub fn with_error(mut self, error: RaisedError) -> Self {
        self.data = Some(EventData::Error(error));
        self
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn data(&self) -> Option<&EventData> {
        self.data.as_ref()
    }

    /// Payload rendered as JSON, if any.
    pub fn payload(&self) -> Option<Value> {
        self.data.as_ref().map(EventData::to_value)
    }
}

/// Conversion of caller input into a validated [`Event`].
///
/// Accepts a bare type tag (`&str`, `String`), an [`Event`], or a JSON value
/// that is either a string or an object with a string `type` field. Anything
/// else is a configuration error.
pub trait IntoEvent {
    fn into_event(self) -> Result<Event, ConfigError>;
}

impl IntoEvent for Event {
    fn into_event(self) -> Result<Event, ConfigError> {
        if self.event_type.is_empty() {
            return Err(ConfigError::MissingEvent);
        }
        Ok(self)
    }
}

impl IntoEvent for &str {
    fn into_event(self) -> Result<Event, ConfigError> {
        Event::new(self).into_event()
    }
}

impl IntoEvent for String {
    fn into_event(self) -> Result<Event, ConfigError> {
        Event::new(self).into_event()
    }
}

impl IntoEvent for Value {
    fn into_event(self) -> Result<Event, ConfigError> {
        match self {
            Value::Null => Err(ConfigError::MissingEvent),
            Value::String(event_type) => event_type.into_event(),
            Value::Object(mut fields) => {
                let event_type = match fields.remove("type") {
                    Some(Value::String(event_type)) => event_type,
                    Some(other) => {
                        return Err(ConfigError::InvalidEvent {
                            found: format!("object with non-string type {other}"),
                        })
                    }
                    None => {
                        return Err(ConfigError::InvalidEvent {
                            found: "object without a type field".to_string(),
                        })
                    }
                };
                let event = Event::new(event_type);
                let event = match fields.remove("data") {
                    Some(data) => event.with_data(data),
                    None if fields.is_empty() => event,
                    None => event.with_data(Value::Object(fields)),
                };
                event.into_event()
            }
            other => Err(ConfigError::InvalidEvent {
                found: other.to_string(),
            }),
        }
    }
}
