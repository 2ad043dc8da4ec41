//! Messages submitted to a stream.
//!
//! A [`Message`] pairs a payload with per-message options (event name, id, retry). Once
//! built it is handed to a stream by value and never changes again.

use crate::error::StreamResult;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use std::borrow::Cow;
use std::fmt;

/// Message payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Text sent as-is.
    Text(String),
    /// Structured value, rendered as compact JSON by text-based transports.
    Json(Value),
}

impl Payload {
    /// Render the payload as text.
    pub fn to_text(&self) -> StreamResult<Cow<'_, str>> {
        match self {
            Self::Text(text) => Ok(Cow::Borrowed(text)),
            Self::Json(value) => Ok(Cow::Owned(serde_json::to_string(value)?)),
        }
    }

    /// Check if this is a text payload.
    pub fn is_text(&self) -> bool {
        matches!(self, Self::Text(_))
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

/// Per-message options.
///
/// `event`, `id` and `retry` are understood by the SSE transport. Anything else set
/// through [`MessageOptions::set`] is kept in `extra`, where transports that do not know
/// the key simply ignore it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageOptions {
    /// Event name.
    pub event: Option<String>,
    /// Event id.
    pub id: Option<String>,
    /// Reconnection time hint, in milliseconds.
    pub retry: Option<String>,
    /// Options no built-in transport understands.
    pub extra: IndexMap<String, String>,
}

impl MessageOptions {
    /// Create empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the event name.
    pub fn with_event(mut self, event: impl Into<String>) -> Self {
        self.event = Some(event.into());
        self
    }

    /// Set the event id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the retry hint.
    pub fn with_retry(mut self, retry: impl fmt::Display) -> Self {
        self.retry = Some(retry.to_string());
        self
    }

    /// Set an option by key.
    pub fn with(mut self, key: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Set an option by key, routing known keys to their fields.
    pub fn set(&mut self, key: impl AsRef<str>, value: impl Into<String>) {
        let value = value.into();
        match key.as_ref() {
            "event" => self.event = Some(value),
            "id" => self.id = Some(value),
            "retry" => self.retry = Some(value),
            other => {
                self.extra.insert(other.to_string(), value);
            }
        }
    }

    /// Check if no option is set.
    pub fn is_empty(&self) -> bool {
        self.event.is_none() && self.id.is_none() && self.retry.is_none() && self.extra.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for MessageOptions
where
    K: AsRef<str>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut options = Self::new();
        for (key, value) in iter {
            options.set(key, value);
        }
        options
    }
}

/// A single message pushed by a producer.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    payload: Payload,
    options: MessageOptions,
}

impl Message {
    /// Create a message without options.
    pub fn new(payload: impl Into<Payload>) -> Self {
        Self {
            payload: payload.into(),
            options: MessageOptions::default(),
        }
    }

    /// Create a text message.
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(Payload::Text(text.into()))
    }

    /// Create a JSON message.
    pub fn json(value: Value) -> Self {
        Self::new(Payload::Json(value))
    }

    /// Create a message from any serializable value.
    ///
    /// Strings stay text; everything else becomes a JSON payload. Serialization happens
    /// here, so a value that cannot be represented fails at submission time.
    pub fn serialize<T: Serialize + ?Sized>(value: &T) -> StreamResult<Self> {
        let payload = match serde_json::to_value(value)? {
            Value::String(text) => Payload::Text(text),
            other => Payload::Json(other),
        };
        Ok(Self::new(payload))
    }

    /// Replace the options.
    pub fn with_options(mut self, options: MessageOptions) -> Self {
        self.options = options;
        self
    }

    /// Set the event name.
    pub fn with_event(mut self, event: impl Into<String>) -> Self {
        self.options.event = Some(event.into());
        self
    }

    /// Set the event id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.options.id = Some(id.into());
        self
    }

    /// Set the retry hint.
    pub fn with_retry(mut self, retry: impl fmt::Display) -> Self {
        self.options.retry = Some(retry.to_string());
        self
    }

    /// Get the payload.
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Get the options.
    pub fn options(&self) -> &MessageOptions {
        &self.options
    }
}

impl From<&str> for Message {
    fn from(text: &str) -> Self {
        Self::text(text)
    }
}

impl From<String> for Message {
    fn from(text: String) -> Self {
        Self::text(text)
    }
}

impl From<Value> for Message {
    fn from(value: Value) -> Self {
        Self::json(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StreamError;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn test_options_route_known_keys() {
        let options: MessageOptions = [("event", "go"), ("id", "1"), ("retry", "10000"), ("bogus", "x")]
            .into_iter()
            .collect();

        assert_eq!(options.event.as_deref(), Some("go"));
        assert_eq!(options.id.as_deref(), Some("1"));
        assert_eq!(options.retry.as_deref(), Some("10000"));
        assert_eq!(options.extra.get("bogus").map(String::as_str), Some("x"));
        assert!(!options.is_empty());
        assert!(MessageOptions::new().is_empty());
    }

    #[test]
    fn test_retry_accepts_numbers() {
        let options = MessageOptions::new().with_retry(10_000);
        assert_eq!(options.retry.as_deref(), Some("10000"));
    }

    #[test]
    fn test_serialize_keeps_strings_as_text() {
        let message = Message::serialize("plain").unwrap();
        assert_eq!(message.payload(), &Payload::Text("plain".into()));

        let message = Message::serialize(&json!({"msg": "x"})).unwrap();
        assert_eq!(message.payload(), &Payload::Json(json!({"msg": "x"})));
    }

    #[test]
    fn test_serialize_failure_surfaces() {
        let mut map = HashMap::new();
        map.insert((1, 2), "tuple keys are not valid JSON object keys");

        let err = Message::serialize(&map).unwrap_err();
        assert!(matches!(err, StreamError::Serialization(_)));
    }

    #[test]
    fn test_payload_to_text() {
        assert_eq!(Payload::from("wow").to_text().unwrap(), "wow");
        assert_eq!(
            Payload::from(json!({"message": "such a framework"}))
                .to_text()
                .unwrap(),
            r#"{"message":"such a framework"}"#
        );
    }

    #[test]
    fn test_message_builders() {
        let message = Message::text("hi").with_event("go").with_id("7").with_retry(5);
        assert_eq!(message.options().event.as_deref(), Some("go"));
        assert_eq!(message.options().id.as_deref(), Some("7"));
        assert_eq!(message.options().retry.as_deref(), Some("5"));
        assert!(message.payload().is_text());
    }
}
