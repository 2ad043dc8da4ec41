//! # rivulet-streaming
//!
//! Streamed response bodies for rivulet.
//!
//! A request handler asks the [`Dispatcher`] for a stream and hands it a producer
//! closure. The producer writes [`Message`](rivulet_core::Message)s through a
//! [`StreamWriter`]; the stream encodes them with its transport and delivers the bytes in
//! order to whatever consumes the response.
//!
//! ## Core Concepts
//!
//! - **[`BlockingStream`]**: pull-based body; the producer runs on its own thread and the
//!   host iterates the stream
//! - **[`EventStream`]**: push-based body for hosts running an event loop; headers go out
//!   through the host's async callback before the producer starts
//! - **[`HostEnv`]** / **[`RequestContext`]**: what the host tells the dispatcher about
//!   itself, and where response headers land
//! - **Sentinels**: closing a stream queues an end marker behind every pending write, so
//!   consumers see everything the producer wrote and nothing after
//!
//! ## Example
//!
//! ```
//! use rivulet_core::TransportRegistry;
//! use rivulet_streaming::{Dispatcher, HostEnv, RequestContext};
//! use std::sync::Arc;
//!
//! let dispatcher = Dispatcher::new(Arc::new(TransportRegistry::with_defaults()));
//! let mut ctx = RequestContext::new(HostEnv::new());
//!
//! let response = dispatcher
//!     .stream(&mut ctx, |out| {
//!         out.write("hello")?;
//!         out.close()?;
//!         Ok(())
//!     })
//!     .unwrap();
//!
//! let body: Vec<u8> = response
//!     .into_body()
//!     .unwrap()
//!     .flat_map(|chunk| chunk.unwrap().to_vec())
//!     .collect();
//! assert_eq!(body, b"data: hello\n\n");
//! assert_eq!(ctx.header("Content-Type"), Some("text/event-stream"));
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod blocking;
pub mod channel;
pub mod config;
pub mod dispatcher;
pub mod host;
pub mod producer;
pub mod state;
pub mod writer;

#[cfg(feature = "event-loop")]
#[cfg_attr(docsrs, doc(cfg(feature = "event-loop")))]
pub mod event_loop;
#[cfg(feature = "event-loop")]
#[cfg_attr(docsrs, doc(cfg(feature = "event-loop")))]
pub mod event_stream;

// Re-exports
pub use blocking::{AsyncBody, BlockingStream};
pub use channel::{channel, ChannelReceiver, ChannelSender, Delivery, PendingWrite};
pub use config::DispatcherConfig;
pub use dispatcher::Dispatcher;
pub use host::{HostEnv, RequestContext, StreamResponse};
pub use producer::{BoxedProducer, ProducerMode, ProducerResult};
pub use state::StreamState;
pub use writer::StreamWriter;

#[cfg(feature = "event-loop")]
pub use event_loop::{EventLoop, Scheduler};
#[cfg(feature = "event-loop")]
pub use event_stream::{EventStream, StreamOutcome};
#[cfg(feature = "event-loop")]
pub use host::{AsyncCallback, EarlyResponse};

/// Prelude for common imports.
pub mod prelude {
    pub use crate::{
        BlockingStream, Dispatcher, DispatcherConfig, HostEnv, ProducerMode, RequestContext,
        StreamResponse, StreamState, StreamWriter,
    };

    #[cfg(feature = "event-loop")]
    pub use crate::{EarlyResponse, EventLoop, EventStream, StreamOutcome};
}
