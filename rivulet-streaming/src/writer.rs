//! The producer's handle on a stream.

use crate::channel::{ChannelSender, PendingWrite};
use rivulet_core::{BoxedTransport, Message, Outlet, StreamError, StreamResult};
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

struct Shared {
    sender: ChannelSender,
    transport: BoxedTransport,
    closed: AtomicBool,
    cancel: CancellationToken,
}

/// Write handle given to a producer.
///
/// Cloning is cheap; every clone feeds the same channel. Writes never block. They fail
/// with [`StreamError::Closed`] after [`StreamWriter::close`] and with
/// [`StreamError::Disconnected`] once the consumer is gone, which is the producer's cue
/// to stop.
#[derive(Clone)]
pub struct StreamWriter {
    shared: Arc<Shared>,
}

impl fmt::Debug for StreamWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamWriter")
            .field("format", &self.shared.transport.format())
            .field("closed", &self.is_closed())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

impl StreamWriter {
    pub(crate) fn new(sender: ChannelSender, transport: BoxedTransport) -> Self {
        Self {
            shared: Arc::new(Shared {
                sender,
                transport,
                closed: AtomicBool::new(false),
                cancel: CancellationToken::new(),
            }),
        }
    }

    /// Queue a message.
    pub fn write(&self, message: impl Into<Message>) -> StreamResult<()> {
        if self.is_closed() {
            warn!("Write on a closed stream ignored");
            return Err(StreamError::Closed);
        }

        let entry = PendingWrite::encode(Arc::clone(&self.shared.transport), message.into());
        self.push(entry)
    }

    /// Serialize a value and queue it.
    pub fn write_json<T: Serialize + ?Sized>(&self, value: &T) -> StreamResult<()> {
        self.write(Message::serialize(value)?)
    }

    /// Close the stream through its transport.
    ///
    /// Closing twice is a no-op.
    pub fn close(&self) -> StreamResult<()> {
        if self.is_closed() {
            return Ok(());
        }
        self.shared.transport.close(self)
    }

    /// Queue the end-of-stream sentinel directly, bypassing the transport.
    pub fn write_end(&self) -> StreamResult<()> {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        debug!(format = %self.shared.transport.format(), "Stream closed by producer");
        self.push(PendingWrite::Close)
    }

    /// Check if the stream was closed.
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    /// Check if the consumer went away.
    pub fn is_cancelled(&self) -> bool {
        self.shared.cancel.is_cancelled() || self.shared.sender.is_disconnected()
    }

    /// Wait until the consumer goes away.
    ///
    /// Blocking bodies join their producer thread when dropped, so a producer that
    /// outlives [`StreamWriter::close`] must stop once this resolves (or once
    /// [`StreamWriter::is_cancelled`] turns true) or it stalls the host.
    pub async fn cancelled(&self) {
        self.shared.cancel.cancelled().await;
    }

    /// Token cancelled when the consumer goes away.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.shared.cancel.clone()
    }

    pub(crate) fn cancel(&self) {
        self.shared.cancel.cancel();
    }

    pub(crate) fn transport(&self) -> &BoxedTransport {
        &self.shared.transport
    }

    /// End the stream with a producer failure.
    pub(crate) fn abort(&self, err: StreamError) {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            debug!(error = %err, "Producer failed after the stream was closed");
            return;
        }
        if self.push(PendingWrite::Abort(err)).is_err() {
            debug!("Consumer gone before the producer failure could be delivered");
        }
    }

    fn push(&self, entry: PendingWrite) -> StreamResult<()> {
        self.shared.sender.push(entry).map_err(|err| {
            debug!("Write after consumer disconnected");
            self.shared.cancel.cancel();
            err
        })
    }
}

impl Outlet for StreamWriter {
    fn write(&self, message: Message) -> StreamResult<()> {
        StreamWriter::write(self, message)
    }

    fn write_end(&self) -> StreamResult<()> {
        StreamWriter::write_end(self)
    }
}
