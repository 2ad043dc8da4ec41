//! # rivulet - Streaming HTTP Responses for Rust
//!
//! rivulet lets a request handler answer with a body that is written over time: a
//! producer closure writes messages, a transport encodes them (Server-Sent Events out of
//! the box), and the host sends the bytes as they arrive.
//!
//! ## Quick Start
//!
//! ```
//! use rivulet::prelude::*;
//! use std::sync::Arc;
//!
//! let dispatcher = Dispatcher::new(Arc::new(TransportRegistry::with_defaults()));
//! let mut ctx = RequestContext::new(HostEnv::new());
//!
//! let response = dispatcher
//!     .blocking_stream(&mut ctx, |out| {
//!         out.write(Message::text("ready").with_event("status"))?;
//!         out.write_json(&serde_json::json!({"progress": 100}))?;
//!         out.close()?;
//!         Ok(())
//!     })
//!     .unwrap();
//!
//! let body = rivulet::collect_body(response.into_body().unwrap()).unwrap();
//! assert_eq!(
//!     &body[..],
//!     b"event: status\ndata: ready\n\ndata: {\"progress\":100}\n\n"
//! );
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description | Default |
//! |---------|-------------|--------|
//! | `event-loop` | [`EventStream`] and the async-callback host contract | yes |
//!
//! ## Architecture
//!
//! - [`rivulet_core`] - messages, the transport trait, SSE encoding, the registry
//! - [`rivulet_streaming`] - writers, blocking and event-loop streams, the dispatcher

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

use bytes::{Bytes, BytesMut};

// ============================================================================
// Crate Re-exports
// ============================================================================

/// Messages, transports and errors.
pub use rivulet_core as core;

/// Streams and dispatch.
pub use rivulet_streaming as streaming;

// ============================================================================
// Flat Re-exports
// ============================================================================

pub use rivulet_core::{
    validate_transport, BoxedTransport, Message, MessageOptions, Outlet, Payload, SseTransport,
    StreamError, StreamResult, Transport, TransportRegistry, SSE_CONTENT_TYPE, SSE_FORMAT,
};
pub use rivulet_streaming::{
    AsyncBody, BlockingStream, BoxedProducer, Dispatcher, DispatcherConfig, HostEnv,
    ProducerMode, ProducerResult, RequestContext, StreamResponse, StreamState, StreamWriter,
};

#[cfg(feature = "event-loop")]
#[cfg_attr(docsrs, doc(cfg(feature = "event-loop")))]
pub use rivulet_streaming::{
    AsyncCallback, EarlyResponse, EventLoop, EventStream, Scheduler, StreamOutcome,
};

/// Drain a blocking body into one buffer.
///
/// Blocks until the stream ends. Stops at the first error; chunks delivered before it
/// are dropped along with the stream.
pub fn collect_body(stream: BlockingStream) -> StreamResult<Bytes> {
    let mut body = BytesMut::new();
    for chunk in stream {
        body.extend_from_slice(&chunk?);
    }
    Ok(body.freeze())
}

/// Prelude for common imports.
pub mod prelude {
    pub use crate::{
        BlockingStream, Dispatcher, DispatcherConfig, HostEnv, Message, MessageOptions,
        ProducerMode, RequestContext, SseTransport, StreamError, StreamResponse, StreamResult,
        StreamWriter, Transport, TransportRegistry,
    };

    #[cfg(feature = "event-loop")]
    pub use crate::{EarlyResponse, EventLoop, EventStream, StreamOutcome};
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde::Serialize;
    use std::sync::mpsc;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(Arc::new(TransportRegistry::with_defaults()))
    }

    fn body_text(response: StreamResponse) -> String {
        let body = collect_body(response.into_body().unwrap()).unwrap();
        String::from_utf8(body.to_vec()).unwrap()
    }

    #[test]
    fn test_end_to_end_sse_body() {
        let mut ctx = RequestContext::new(HostEnv::new());
        let response = dispatcher()
            .stream(&mut ctx, |out| {
                out.write("starting")?;
                out.write("streaming")?;
                out.write("good bye!")?;
                out.close()?;
                Ok(())
            })
            .unwrap();

        assert_eq!(ctx.header("Content-Type"), Some(SSE_CONTENT_TYPE));
        assert_eq!(ctx.header("Cache-Control"), Some("no-cache"));
        assert_eq!(
            body_text(response),
            "data: starting\n\ndata: streaming\n\ndata: good bye!\n\n"
        );
    }

    #[test]
    fn test_producer_waiting_on_a_signal() {
        let (go_tx, go_rx) = mpsc::channel::<()>();
        let mut ctx = RequestContext::new(HostEnv::new());

        let response = dispatcher()
            .blocking_stream(&mut ctx, move |out| {
                out.write("ready")?;
                go_rx.recv()?;
                out.write("done")?;
                out.close()?;
                Ok(())
            })
            .unwrap();
        let mut body = response.into_body().unwrap();

        assert_eq!(&body.next().unwrap().unwrap()[..], b"data: ready\n\n");
        thread::sleep(Duration::from_millis(10));
        go_tx.send(()).unwrap();
        assert_eq!(&body.next().unwrap().unwrap()[..], b"data: done\n\n");
        assert!(body.next().is_none());
    }

    #[test]
    fn test_typed_payloads_and_options() {
        #[derive(Serialize)]
        struct Tick {
            seq: u32,
            label: &'static str,
        }

        let mut ctx = RequestContext::new(HostEnv::new());
        let response = dispatcher()
            .stream(&mut ctx, |out| {
                out.write_json(&Tick { seq: 1, label: "a" })?;
                out.write(
                    Message::serialize(&Tick { seq: 2, label: "b" })?
                        .with_event("tick")
                        .with_id("2")
                        .with_retry(5000),
                )?;
                out.write("first\nsecond")?;
                out.close()?;
                Ok(())
            })
            .unwrap();

        assert_eq!(
            body_text(response),
            concat!(
                "data: {\"label\":\"a\",\"seq\":1}\n\n",
                "retry: 5000\nid: 2\nevent: tick\ndata: {\"label\":\"b\",\"seq\":2}\n\n",
                "data: first\ndata: second\n\n",
            )
        );
    }

    #[test]
    fn test_producer_error_reaches_the_consumer() {
        let mut ctx = RequestContext::new(HostEnv::new());
        let response = dispatcher()
            .stream(&mut ctx, |out| {
                out.write("partial")?;
                anyhow::bail!("upstream closed")
            })
            .unwrap();

        let err = collect_body(response.into_body().unwrap()).unwrap_err();
        assert!(matches!(err, StreamError::Producer(_)));
        assert_eq!(err.to_string(), "Producer failed: upstream closed");
    }

    #[test]
    fn test_registry_formats_for_mime_table() {
        let registry = TransportRegistry::with_defaults();
        assert_eq!(
            registry.formats(),
            vec![(SSE_FORMAT.to_string(), SSE_CONTENT_TYPE.to_string())]
        );
    }

    #[cfg(feature = "event-loop")]
    #[tokio::test]
    async fn test_event_loop_host() {
        use self::support::Chunks;

        let chunks = Chunks::default();
        let sink = chunks.clone();
        let mut ctx = RequestContext::new(HostEnv::with_async_callback(
            EventLoop::current().unwrap(),
            move |early| {
                assert_eq!(early.status, 200);
                early
                    .body
                    .each(move |chunk| sink.push(chunk))
                    .unwrap();
            },
        ));

        let response = dispatcher()
            .stream(&mut ctx, |out| {
                out.write("tick")?;
                out.close()?;
                Ok(())
            })
            .unwrap();

        let StreamResponse::Deferred(stream) = response else {
            panic!("expected a deferred response");
        };
        assert_eq!(stream.finished().await, StreamOutcome::Finished);
        assert_eq!(chunks.joined(), "data: tick\n\n");
    }

    #[cfg(feature = "event-loop")]
    mod support {
        use bytes::Bytes;
        use std::sync::{Arc, Mutex};

        #[derive(Clone, Default)]
        pub struct Chunks(Arc<Mutex<Vec<Bytes>>>);

        impl Chunks {
            pub fn push(&self, chunk: Bytes) {
                self.0.lock().unwrap().push(chunk);
            }

            pub fn joined(&self) -> String {
                let chunks = self.0.lock().unwrap();
                chunks
                    .iter()
                    .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
                    .collect()
            }
        }
    }
}
