//! The producer/consumer hand-off queue.
//!
//! A channel is an unbounded FIFO of [`PendingWrite`] entries. Pushing never blocks, so a
//! slow consumer never slows the producer down. Popping blocks (or waits) until an
//! entry is available. Each stream owns exactly one channel.

use bytes::Bytes;
use rivulet_core::{BoxedTransport, Message, StreamError, StreamResult};
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// One queued entry.
#[derive(Debug)]
pub enum PendingWrite {
    /// A message waiting to be encoded by its transport.
    ///
    /// Encoding is deferred to the consumer, so the transport runs exactly once per
    /// message, at delivery time.
    Encode {
        /// Transport that will encode the message.
        transport: BoxedTransport,
        /// The message itself.
        message: Message,
    },
    /// End of stream.
    Close,
    /// End of stream caused by a producer failure.
    Abort(StreamError),
}

/// What a consumer should do with a popped entry.
#[derive(Debug)]
pub enum Delivery {
    /// Send these bytes to the client.
    Chunk(Bytes),
    /// The stream ended normally.
    End,
    /// The stream ended with an error.
    Failed(StreamError),
}

impl PendingWrite {
    /// Queue a message for deferred encoding.
    pub fn encode(transport: BoxedTransport, message: Message) -> Self {
        Self::Encode { transport, message }
    }

    /// Check if this entry ends the stream.
    pub fn is_sentinel(&self) -> bool {
        !matches!(self, Self::Encode { .. })
    }

    /// Apply the transport and turn the entry into a delivery.
    pub fn resolve(self) -> Delivery {
        match self {
            Self::Encode { transport, message } => match transport.call(&message) {
                Ok(bytes) => Delivery::Chunk(bytes),
                Err(err) => Delivery::Failed(StreamError::Encode(err.to_string())),
            },
            Self::Close => Delivery::End,
            Self::Abort(err) => Delivery::Failed(err),
        }
    }
}

/// Create a new channel.
pub fn channel() -> (ChannelSender, ChannelReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ChannelSender { tx }, ChannelReceiver { rx })
}

/// Producer half of a channel.
#[derive(Debug, Clone)]
pub struct ChannelSender {
    tx: mpsc::UnboundedSender<PendingWrite>,
}

impl ChannelSender {
    /// Push an entry. Fails only when the receiver is gone.
    pub fn push(&self, entry: PendingWrite) -> StreamResult<()> {
        self.tx.send(entry).map_err(|_| StreamError::Disconnected)
    }

    /// Check if the receiver is gone.
    pub fn is_disconnected(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer half of a channel.
#[derive(Debug)]
pub struct ChannelReceiver {
    rx: mpsc::UnboundedReceiver<PendingWrite>,
}

impl ChannelReceiver {
    /// Pop the next entry, blocking the current thread.
    ///
    /// Returns `None` once every sender is gone and the queue is empty.
    ///
    /// # Panics
    ///
    /// Panics when called from inside an async runtime; use [`ChannelReceiver::pop`]
    /// there.
    pub fn pop_blocking(&mut self) -> Option<PendingWrite> {
        self.rx.blocking_recv()
    }

    /// Wait for the next entry.
    pub async fn pop(&mut self) -> Option<PendingWrite> {
        self.rx.recv().await
    }

    /// Poll for the next entry.
    pub fn poll_pop(&mut self, cx: &mut Context<'_>) -> Poll<Option<PendingWrite>> {
        self.rx.poll_recv(cx)
    }

    /// Pop an entry if one is ready.
    pub fn try_pop(&mut self) -> Option<PendingWrite> {
        self.rx.try_recv().ok()
    }

    /// Refuse further pushes. Entries already queued can still be popped.
    pub fn close(&mut self) {
        self.rx.close();
    }
}
