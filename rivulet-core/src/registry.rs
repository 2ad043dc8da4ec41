//! Transport registry.
//!
//! The registry is built once at application startup and handed to whatever dispatches
//! streams. It maps format ids (`"sse"`) to transport factories and exposes the
//! format/content-type table a host needs for its MIME configuration.

use crate::error::{StreamError, StreamResult};
use crate::sse::{SseTransport, SSE_CONTENT_TYPE, SSE_FORMAT};
use crate::transport::{validate_transport, BoxedTransport};
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

type TransportFactory = Arc<dyn Fn() -> BoxedTransport + Send + Sync>;

#[derive(Clone)]
struct Entry {
    content_type: String,
    factory: TransportFactory,
}

/// Registry for looking up transports by format id.
#[derive(Default)]
pub struct TransportRegistry {
    transports: RwLock<IndexMap<String, Entry>>,
}

impl fmt::Debug for TransportRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportRegistry")
            .field("formats", &self.formats())
            .finish()
    }
}

impl TransportRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding every built-in transport.
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        registry.transports.write().insert(
            SSE_FORMAT.to_string(),
            Entry {
                content_type: SSE_CONTENT_TYPE.to_string(),
                factory: Arc::new(|| Arc::new(SseTransport::new()) as BoxedTransport),
            },
        );
        registry
    }

    /// Register a transport factory.
    ///
    /// The factory is called once here to validate the transport it builds; the format id
    /// and content type are read from that instance.
    pub fn register<F>(&self, factory: F) -> StreamResult<()>
    where
        F: Fn() -> BoxedTransport + Send + Sync + 'static,
    {
        let probe = factory();
        validate_transport(probe.as_ref())?;

        let format = probe.format().to_string();
        let content_type = probe.content_type().to_string();

        let mut transports = self.transports.write();
        if transports.contains_key(&format) {
            return Err(StreamError::Configuration(format!(
                "transport format '{format}' is already registered"
            )));
        }

        debug!(format = %format, content_type = %content_type, "Registered transport");
        transports.insert(
            format,
            Entry {
                content_type,
                factory: Arc::new(factory),
            },
        );
        Ok(())
    }

    /// Build a fresh transport for a format.
    pub fn create(&self, format: &str) -> StreamResult<BoxedTransport> {
        let factory = {
            let transports = self.transports.read();
            transports
                .get(format)
                .map(|entry| Arc::clone(&entry.factory))
                .ok_or_else(|| {
                    StreamError::Configuration(format!("unknown transport format: '{format}'"))
                })?
        };

        let transport = factory();
        validate_transport(transport.as_ref())?;
        Ok(transport)
    }

    /// Get the content type registered for a format.
    pub fn content_type(&self, format: &str) -> Option<String> {
        let transports = self.transports.read();
        transports.get(format).map(|entry| entry.content_type.clone())
    }

    /// Check if a format is registered.
    pub fn contains(&self, format: &str) -> bool {
        self.transports.read().contains_key(format)
    }

    /// List `(format, content_type)` pairs in registration order.
    pub fn formats(&self) -> Vec<(String, String)> {
        let transports = self.transports.read();
        transports
            .iter()
            .map(|(format, entry)| (format.clone(), entry.content_type.clone()))
            .collect()
    }

    /// Remove a format.
    pub fn remove(&self, format: &str) -> bool {
        self.transports.write().shift_remove(format).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;
    use crate::transport::Transport;
    use bytes::Bytes;

    struct Ndjson;

    impl Transport for Ndjson {
        fn content_type(&self) -> &str {
            "application/x-ndjson"
        }

        fn format(&self) -> &str {
            "ndjson"
        }

        fn call(&self, message: &Message) -> StreamResult<Bytes> {
            let mut line = message.payload().to_text()?.into_owned();
            line.push('\n');
            Ok(Bytes::from(line))
        }
    }

    struct Nameless;

    impl Transport for Nameless {
        fn content_type(&self) -> &str {
            "text/plain"
        }

        fn format(&self) -> &str {
            ""
        }

        fn call(&self, _message: &Message) -> StreamResult<Bytes> {
            Ok(Bytes::new())
        }
    }

    #[test]
    fn test_defaults_register_sse() {
        let registry = TransportRegistry::with_defaults();

        assert!(registry.contains("sse"));
        assert_eq!(
            registry.content_type("sse").as_deref(),
            Some("text/event-stream")
        );
        assert_eq!(
            registry.formats(),
            vec![("sse".to_string(), "text/event-stream".to_string())]
        );
        assert_eq!(registry.create("sse").unwrap().format(), "sse");
    }

    #[test]
    fn test_register_custom_transport() {
        let registry = TransportRegistry::with_defaults();
        registry
            .register(|| Arc::new(Ndjson) as BoxedTransport)
            .unwrap();

        let transport = registry.create("ndjson").unwrap();
        assert_eq!(transport.content_type(), "application/x-ndjson");
        assert_eq!(registry.formats().len(), 2);
    }

    #[test]
    fn test_rejects_duplicates_and_invalid() {
        let registry = TransportRegistry::with_defaults();

        let dup = registry.register(|| Arc::new(SseTransport::new()) as BoxedTransport);
        assert!(matches!(dup, Err(StreamError::Configuration(_))));

        let invalid = registry.register(|| Arc::new(Nameless) as BoxedTransport);
        assert!(matches!(invalid, Err(StreamError::Configuration(_))));
    }

    #[test]
    fn test_unknown_format() {
        let registry = TransportRegistry::new();
        let err = registry.create("sse").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Configuration error: unknown transport format: 'sse'"
        );
    }

    #[test]
    fn test_remove() {
        let registry = TransportRegistry::with_defaults();
        assert!(registry.remove("sse"));
        assert!(!registry.remove("sse"));
        assert!(!registry.contains("sse"));
    }
}
