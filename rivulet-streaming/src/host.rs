//! The contract between streams and the host serving the request.
//!
//! A host hands each request a [`HostEnv`]. Hosts driven by an event loop put an
//! [`AsyncCallback`] in it; calling that callback once with an [`EarlyResponse`] flushes
//! status and headers and takes the response off the normal synchronous path.

use crate::blocking::BlockingStream;
use indexmap::IndexMap;
use std::fmt;

#[cfg(feature = "event-loop")]
use crate::event_loop::EventLoop;
#[cfg(feature = "event-loop")]
use crate::event_stream::EventStream;

/// Callback used to deliver a response out of band.
#[cfg(feature = "event-loop")]
pub type AsyncCallback = Box<dyn FnOnce(EarlyResponse) + Send + 'static>;

/// Status, headers and body flushed through an [`AsyncCallback`].
#[cfg(feature = "event-loop")]
#[derive(Debug)]
pub struct EarlyResponse {
    /// HTTP status.
    pub status: u16,
    /// Response headers.
    pub headers: IndexMap<String, String>,
    /// The body; the host registers its chunk callback on it.
    pub body: EventStream,
}

/// Per-request host environment.
#[derive(Default)]
pub struct HostEnv {
    #[cfg(feature = "event-loop")]
    async_callback: Option<AsyncCallback>,
    #[cfg(feature = "event-loop")]
    event_loop: Option<EventLoop>,
}

impl fmt::Debug for HostEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostEnv")
            .field("supports_async", &self.supports_async())
            .finish()
    }
}

impl HostEnv {
    /// Environment of a blocking, thread-per-request host.
    pub fn new() -> Self {
        Self::default()
    }

    /// Environment of an event-loop host.
    #[cfg(feature = "event-loop")]
    pub fn with_async_callback<F>(event_loop: EventLoop, callback: F) -> Self
    where
        F: FnOnce(EarlyResponse) + Send + 'static,
    {
        Self {
            async_callback: Some(Box::new(callback)),
            event_loop: Some(event_loop),
        }
    }

    /// Check if the host can take an out-of-band response.
    pub fn supports_async(&self) -> bool {
        #[cfg(feature = "event-loop")]
        {
            self.async_callback.is_some() && self.event_loop.is_some()
        }
        #[cfg(not(feature = "event-loop"))]
        {
            false
        }
    }

    /// Get the host's event loop.
    #[cfg(feature = "event-loop")]
    pub fn event_loop(&self) -> Option<&EventLoop> {
        self.event_loop.as_ref()
    }

    /// Take the async callback; it can be used only once.
    #[cfg(feature = "event-loop")]
    pub(crate) fn take_async_callback(&mut self) -> Option<AsyncCallback> {
        self.async_callback.take()
    }
}

/// Response-side state of one request, as seen by the dispatcher.
#[derive(Debug, Default)]
pub struct RequestContext {
    env: HostEnv,
    headers: IndexMap<String, String>,
    format: Option<String>,
}

impl RequestContext {
    /// Create a context for a request served in `env`.
    pub fn new(env: HostEnv) -> Self {
        Self {
            env,
            headers: IndexMap::new(),
            format: None,
        }
    }

    /// Get the host environment.
    pub fn env(&self) -> &HostEnv {
        &self.env
    }

    /// Get the host environment mutably.
    pub fn env_mut(&mut self) -> &mut HostEnv {
        &mut self.env
    }

    /// Get all response headers.
    pub fn headers(&self) -> &IndexMap<String, String> {
        &self.headers
    }

    /// Get a header, ignoring case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Set a header, replacing any existing one with the same name in any case.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self
            .headers
            .iter_mut()
            .find(|(key, _)| key.eq_ignore_ascii_case(&name))
        {
            Some((_, existing)) => *existing = value,
            None => {
                self.headers.insert(name, value);
            }
        }
    }

    /// Get the response format id.
    pub fn format(&self) -> Option<&str> {
        self.format.as_deref()
    }

    /// Set the response format id.
    pub fn set_format(&mut self, format: impl Into<String>) {
        self.format = Some(format.into());
    }
}

/// What a stream hands back to the request pipeline.
#[derive(Debug)]
pub enum StreamResponse {
    /// Send the normal response, with this stream as its body.
    Body(BlockingStream),
    /// The response already went out through the async callback; send nothing.
    #[cfg(feature = "event-loop")]
    Deferred(EventStream),
}

impl StreamResponse {
    /// Check if the response was delivered out of band.
    pub fn is_deferred(&self) -> bool {
        match self {
            Self::Body(_) => false,
            #[cfg(feature = "event-loop")]
            Self::Deferred(_) => true,
        }
    }

    /// Get the body of a normal response.
    pub fn into_body(self) -> Option<BlockingStream> {
        match self {
            Self::Body(stream) => Some(stream),
            #[cfg(feature = "event-loop")]
            Self::Deferred(_) => None,
        }
    }

    /// Get the stream of a deferred response.
    #[cfg(feature = "event-loop")]
    pub fn into_deferred(self) -> Option<EventStream> {
        match self {
            Self::Body(_) => None,
            Self::Deferred(stream) => Some(stream),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocking_env() {
        let env = HostEnv::new();
        assert!(!env.supports_async());
    }

    #[test]
    fn test_headers_are_case_insensitive() {
        let mut ctx = RequestContext::new(HostEnv::new());
        ctx.set_header("content-type", "text/html");
        ctx.set_header("Content-Type", "text/event-stream");

        assert_eq!(ctx.headers().len(), 1);
        assert_eq!(ctx.header("CONTENT-TYPE"), Some("text/event-stream"));
        assert_eq!(ctx.header("cache-control"), None);
    }

    #[test]
    fn test_format() {
        let mut ctx = RequestContext::default();
        assert_eq!(ctx.format(), None);
        ctx.set_format("sse");
        assert_eq!(ctx.format(), Some("sse"));
    }

    #[cfg(feature = "event-loop")]
    #[tokio::test]
    async fn test_async_env_callback_is_taken_once() {
        let mut env = HostEnv::with_async_callback(EventLoop::current().unwrap(), |_| {});
        assert!(env.supports_async());
        assert!(env.event_loop().is_some());

        assert!(env.take_async_callback().is_some());
        assert!(env.take_async_callback().is_none());
        assert!(!env.supports_async());
    }
}
