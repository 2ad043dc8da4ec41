//! Stream dispatch.
//!
//! The [`Dispatcher`] is the entry point request handlers use. It resolves the transport
//! for the requested format, sets the response headers and picks the stream variant the
//! host can serve.

use crate::blocking::BlockingStream;
use crate::config::DispatcherConfig;
use crate::host::{RequestContext, StreamResponse};
use crate::producer::{BoxedProducer, ProducerMode, ProducerResult};
use crate::writer::StreamWriter;
use rivulet_core::{validate_transport, BoxedTransport, StreamResult, TransportRegistry};
use std::sync::Arc;
use tracing::debug;

#[cfg(feature = "event-loop")]
use crate::event_loop::Scheduler;
#[cfg(feature = "event-loop")]
use crate::event_stream::EventStream;

/// Creates and opens streams for request handlers.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<TransportRegistry>,
    config: DispatcherConfig,
}

impl Dispatcher {
    /// Create a dispatcher over a transport registry.
    pub fn new(registry: Arc<TransportRegistry>) -> Self {
        Self {
            registry,
            config: DispatcherConfig::default(),
        }
    }

    /// Set the configuration.
    pub fn with_config(mut self, config: DispatcherConfig) -> Self {
        self.config = config;
        self
    }

    /// Get the configuration.
    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Get the transport registry.
    pub fn registry(&self) -> &Arc<TransportRegistry> {
        &self.registry
    }

    /// Stream in the default format with a non-blocking producer.
    pub fn stream<F>(&self, ctx: &mut RequestContext, producer: F) -> StreamResult<StreamResponse>
    where
        F: FnOnce(StreamWriter) -> ProducerResult + Send + 'static,
    {
        self.stream_with(
            ctx,
            &self.config.default_format,
            ProducerMode::NonBlocking,
            producer,
        )
    }

    /// Stream in the default format with a producer that may block.
    pub fn blocking_stream<F>(
        &self,
        ctx: &mut RequestContext,
        producer: F,
    ) -> StreamResult<StreamResponse>
    where
        F: FnOnce(StreamWriter) -> ProducerResult + Send + 'static,
    {
        self.stream_with(
            ctx,
            &self.config.default_format,
            ProducerMode::Blocking,
            producer,
        )
    }

    /// Stream in a registered format.
    pub fn stream_with<F>(
        &self,
        ctx: &mut RequestContext,
        format: &str,
        mode: ProducerMode,
        producer: F,
    ) -> StreamResult<StreamResponse>
    where
        F: FnOnce(StreamWriter) -> ProducerResult + Send + 'static,
    {
        let transport = self.registry.create(format)?;
        self.stream_with_transport(ctx, transport, mode, producer)
    }

    /// Stream through a transport instance.
    ///
    /// Fails with [`StreamError::Configuration`](rivulet_core::StreamError::Configuration)
    /// before touching the context if the transport is invalid.
    pub fn stream_with_transport<F>(
        &self,
        ctx: &mut RequestContext,
        transport: BoxedTransport,
        mode: ProducerMode,
        producer: F,
    ) -> StreamResult<StreamResponse>
    where
        F: FnOnce(StreamWriter) -> ProducerResult + Send + 'static,
    {
        validate_transport(transport.as_ref())?;

        for (name, value) in &self.config.extra_headers {
            ctx.set_header(name.as_str(), value.as_str());
        }
        ctx.set_header("Cache-Control", self.config.cache_control.as_str());
        ctx.set_header("Content-Type", transport.content_type());
        ctx.set_format(transport.format());

        let producer: BoxedProducer = Box::new(producer);

        #[cfg(feature = "event-loop")]
        if ctx.env().supports_async() {
            if let Some(event_loop) = ctx.env().event_loop().cloned() {
                debug!(format = %transport.format(), mode = ?mode, "Dispatching event stream");
                let stream =
                    EventStream::from_boxed(transport, producer, event_loop, Scheduler::from(mode))
                        .with_headers(ctx.headers().clone());
                return stream.open(ctx.env_mut());
            }
        }

        debug!(format = %transport.format(), mode = ?mode, "Dispatching blocking stream");
        BlockingStream::from_boxed(transport, producer)
            .with_thread_name(self.config.worker_thread_name.as_str())
            .open(ctx.env())
    }
}
