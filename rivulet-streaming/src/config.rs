//! Dispatcher configuration.

use indexmap::IndexMap;

/// Default response format.
pub const DEFAULT_FORMAT: &str = rivulet_core::SSE_FORMAT;

/// Default `Cache-Control` value for streamed responses.
pub const DEFAULT_CACHE_CONTROL: &str = "no-cache";

/// Default name of blocking producer threads.
pub const DEFAULT_WORKER_THREAD_NAME: &str = "rivulet-producer";

/// Configuration for a [`Dispatcher`](crate::Dispatcher).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Format used by `stream` and `blocking_stream`.
    pub default_format: String,
    /// `Cache-Control` header value.
    pub cache_control: String,
    /// Name given to blocking producer threads.
    pub worker_thread_name: String,
    /// Headers added to every streamed response.
    pub extra_headers: IndexMap<String, String>,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            default_format: DEFAULT_FORMAT.to_string(),
            cache_control: DEFAULT_CACHE_CONTROL.to_string(),
            worker_thread_name: DEFAULT_WORKER_THREAD_NAME.to_string(),
            extra_headers: IndexMap::new(),
        }
    }
}

impl DispatcherConfig {
    /// Create a new default config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default format.
    pub fn default_format(mut self, format: impl Into<String>) -> Self {
        self.default_format = format.into();
        self
    }

    /// Set the `Cache-Control` value.
    pub fn cache_control(mut self, value: impl Into<String>) -> Self {
        self.cache_control = value.into();
        self
    }

    /// Set the producer thread name.
    pub fn worker_thread_name(mut self, name: impl Into<String>) -> Self {
        self.worker_thread_name = name.into();
        self
    }

    /// Add a header to every streamed response.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.insert(name.into(), value.into());
        self
    }

    /// Config for streams served through a buffering reverse proxy.
    ///
    /// Adds `X-Accel-Buffering: no` so nginx flushes each event.
    pub fn for_proxy() -> Self {
        Self::new().header("X-Accel-Buffering", "no")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = DispatcherConfig::default();
        assert_eq!(config.default_format, "sse");
        assert_eq!(config.cache_control, "no-cache");
        assert_eq!(config.worker_thread_name, "rivulet-producer");
        assert!(config.extra_headers.is_empty());
    }

    #[test]
    fn test_builder() {
        let config = DispatcherConfig::new()
            .default_format("ndjson")
            .cache_control("no-store")
            .worker_thread_name("events")
            .header("X-Stream", "1");

        assert_eq!(config.default_format, "ndjson");
        assert_eq!(config.cache_control, "no-store");
        assert_eq!(config.worker_thread_name, "events");
        assert_eq!(
            config.extra_headers.get("X-Stream").map(String::as_str),
            Some("1")
        );
    }

    #[test]
    fn test_for_proxy() {
        let config = DispatcherConfig::for_proxy();
        assert_eq!(
            config.extra_headers.get("X-Accel-Buffering").map(String::as_str),
            Some("no")
        );
    }
}
