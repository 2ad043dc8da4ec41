//! The transport abstraction.
//!
//! A transport turns one [`Message`] into wire bytes and gets a chance to write to the
//! stream when it opens and closes. Transports are stateless: one instance serves every
//! write of a stream and may be shared freely.

use crate::error::{StreamError, StreamResult};
use crate::message::Message;
use bytes::Bytes;
use std::fmt;
use std::sync::Arc;

/// The write side of a stream, as seen by transport hooks.
pub trait Outlet: Send + Sync {
    /// Queue a message.
    fn write(&self, message: Message) -> StreamResult<()>;

    /// Queue the end-of-stream sentinel.
    fn write_end(&self) -> StreamResult<()>;
}

/// A pluggable wire codec.
pub trait Transport: Send + Sync + 'static {
    /// HTTP content type of the encoded stream.
    fn content_type(&self) -> &str;

    /// Short format id the host associates with [`Transport::content_type`].
    fn format(&self) -> &str;

    /// Called once when the stream opens.
    fn open(&self, _outlet: &dyn Outlet) -> StreamResult<()> {
        Ok(())
    }

    /// Called when the producer closes the stream. Must end with
    /// [`Outlet::write_end`].
    fn close(&self, outlet: &dyn Outlet) -> StreamResult<()> {
        outlet.write_end()
    }

    /// Encode one message.
    fn call(&self, message: &Message) -> StreamResult<Bytes>;
}

/// Shared transport instance.
pub type BoxedTransport = Arc<dyn Transport>;

impl fmt::Debug for dyn Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport")
            .field("format", &self.format())
            .field("content_type", &self.content_type())
            .finish()
    }
}

/// Check that a transport advertises a usable format id and content type.
pub fn validate_transport(transport: &dyn Transport) -> StreamResult<()> {
    let format = transport.format();
    if format.trim().is_empty() {
        return Err(StreamError::Configuration(
            "transport has an empty format id".to_string(),
        ));
    }

    let content_type = transport.content_type();
    let valid_mime = content_type
        .split_once('/')
        .map(|(kind, sub)| !kind.trim().is_empty() && !sub.trim().is_empty())
        .unwrap_or(false);
    if !valid_mime {
        return Err(StreamError::Configuration(format!(
            "transport '{format}' has an invalid content type: '{content_type}'"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct Raw {
        content_type: &'static str,
        format: &'static str,
    }

    impl Transport for Raw {
        fn content_type(&self) -> &str {
            self.content_type
        }

        fn format(&self) -> &str {
            self.format
        }

        fn call(&self, message: &Message) -> StreamResult<Bytes> {
            Ok(Bytes::from(message.payload().to_text()?.into_owned()))
        }
    }

    #[derive(Default)]
    struct Recorder {
        ended: Mutex<u32>,
    }

    impl Outlet for Recorder {
        fn write(&self, _message: Message) -> StreamResult<()> {
            Ok(())
        }

        fn write_end(&self) -> StreamResult<()> {
            *self.ended.lock() += 1;
            Ok(())
        }
    }

    #[test]
    fn test_validate_transport() {
        let ok = Raw {
            content_type: "text/plain",
            format: "raw",
        };
        assert!(validate_transport(&ok).is_ok());

        let no_format = Raw {
            content_type: "text/plain",
            format: " ",
        };
        assert!(matches!(
            validate_transport(&no_format),
            Err(StreamError::Configuration(_))
        ));

        let bad_mime = Raw {
            content_type: "plain",
            format: "raw",
        };
        assert!(matches!(
            validate_transport(&bad_mime),
            Err(StreamError::Configuration(_))
        ));
    }

    #[test]
    fn test_default_hooks() {
        let transport = Raw {
            content_type: "text/plain",
            format: "raw",
        };
        let outlet = Recorder::default();

        transport.open(&outlet).unwrap();
        assert_eq!(*outlet.ended.lock(), 0);

        transport.close(&outlet).unwrap();
        assert_eq!(*outlet.ended.lock(), 1);
    }
}
