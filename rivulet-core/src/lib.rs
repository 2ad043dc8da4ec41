//! # rivulet-core
//!
//! Core types for rivulet.
//!
//! This crate holds everything that does not depend on a concurrency model: the
//! [`Message`] a producer submits, the [`Transport`] trait that turns messages into wire
//! bytes, the built-in [`SseTransport`], and the [`TransportRegistry`] a host builds at
//! startup.
//!
//! ## Example
//!
//! ```
//! use rivulet_core::{Message, SseTransport, Transport};
//!
//! let sse = SseTransport::new();
//! let bytes = sse.call(&Message::text("hi").with_event("go")).unwrap();
//! assert_eq!(&bytes[..], b"event: go\ndata: hi\n\n");
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod message;
pub mod registry;
pub mod sse;
pub mod transport;

// Re-exports
pub use error::{StreamError, StreamResult};
pub use message::{Message, MessageOptions, Payload};
pub use registry::TransportRegistry;
pub use sse::{SseTransport, SSE_CONTENT_TYPE, SSE_FORMAT};
pub use transport::{validate_transport, BoxedTransport, Outlet, Transport};
