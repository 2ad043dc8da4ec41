//! Thread-per-request streaming.
//!
//! [`BlockingStream`] runs its producer on a dedicated OS thread and lets the host pull
//! encoded chunks on its own thread, blocking while the queue is empty. It is the body
//! type for hosts without an async-callback capability.

use crate::channel::{channel, ChannelReceiver, Delivery, PendingWrite};
use crate::config::DEFAULT_WORKER_THREAD_NAME;
use crate::host::{HostEnv, StreamResponse};
use crate::producer::{run_producer, BoxedProducer, ProducerResult};
use crate::state::StreamState;
use crate::writer::StreamWriter;
use bytes::Bytes;
use futures::Stream;
use rivulet_core::{BoxedTransport, Message, StreamError, StreamResult};
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::thread;
use tracing::{debug, warn};

/// A stream body drained by pulling.
///
/// Implements [`Iterator`] for synchronous hosts; use [`BlockingStream::into_async`] to
/// drain it from async code without blocking a runtime thread.
///
/// Dropping the stream before it ends cancels the producer's token, makes further writes
/// fail with [`StreamError::Disconnected`] and joins the producer thread.
///
/// The join is unbounded. A producer that keeps running after [`StreamWriter::close`],
/// or that blocks without checking [`StreamWriter::is_cancelled`], blocks the thread
/// dropping the body until it returns. Long-running producers must watch for
/// cancellation.
pub struct BlockingStream {
    writer: StreamWriter,
    receiver: ChannelReceiver,
    producer: Option<BoxedProducer>,
    worker: Option<thread::JoinHandle<()>>,
    state: StreamState,
    thread_name: String,
}

impl fmt::Debug for BlockingStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockingStream")
            .field("transport", self.writer.transport())
            .field("state", &self.state)
            .field("thread_name", &self.thread_name)
            .finish()
    }
}

impl BlockingStream {
    /// Create a stream around a transport and a producer.
    pub fn new<F>(transport: BoxedTransport, producer: F) -> Self
    where
        F: FnOnce(StreamWriter) -> ProducerResult + Send + 'static,
    {
        Self::from_boxed(transport, Box::new(producer))
    }

    /// Create a stream from an already boxed producer.
    pub fn from_boxed(transport: BoxedTransport, producer: BoxedProducer) -> Self {
        let (sender, receiver) = channel();
        Self {
            writer: StreamWriter::new(sender, transport),
            receiver,
            producer: Some(producer),
            worker: None,
            state: StreamState::Created,
            thread_name: DEFAULT_WORKER_THREAD_NAME.to_string(),
        }
    }

    /// Set the name of the producer thread.
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Open the transport and start the producer on its own thread.
    ///
    /// Returns the stream itself as the response body.
    pub fn open(mut self, _env: &HostEnv) -> StreamResult<StreamResponse> {
        let producer = match (self.state, self.producer.take()) {
            (StreamState::Created, Some(producer)) => producer,
            _ => {
                return Err(StreamError::InvalidState(
                    "blocking stream was already opened".to_string(),
                ))
            }
        };

        let transport = Arc::clone(self.writer.transport());
        transport.open(&self.writer)?;

        let writer = self.writer.clone();
        let worker = thread::Builder::new()
            .name(self.thread_name.clone())
            .spawn(move || run_producer(producer, writer))
            .map_err(|e| StreamError::Other(format!("failed to spawn producer thread: {e}")))?;

        debug!(
            format = %transport.format(),
            thread = %self.thread_name,
            "Blocking stream opened"
        );
        self.worker = Some(worker);
        self.state = StreamState::Open;
        Ok(StreamResponse::Body(self))
    }

    /// Queue a message.
    pub fn write(&self, message: impl Into<Message>) -> StreamResult<()> {
        self.writer.write(message)
    }

    /// Close the stream through its transport.
    pub fn close(&self) -> StreamResult<()> {
        self.writer.close()
    }

    /// Get a write handle.
    pub fn writer(&self) -> StreamWriter {
        self.writer.clone()
    }

    /// Get the current state.
    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Drain the stream on the calling thread, handing each chunk to `f`.
    ///
    /// Returns once the close sentinel is reached. A producer or encoding failure is
    /// returned after every chunk queued before it was delivered.
    pub fn each<F>(&mut self, mut f: F) -> StreamResult<()>
    where
        F: FnMut(Bytes),
    {
        for chunk in self.by_ref() {
            f(chunk?);
        }
        Ok(())
    }

    /// Turn the stream into an async [`Stream`] of chunks.
    pub fn into_async(self) -> AsyncBody {
        AsyncBody { inner: self }
    }

    fn deliver(&mut self, entry: Option<PendingWrite>) -> Option<StreamResult<Bytes>> {
        let delivery = match entry {
            Some(entry) => entry.resolve(),
            None => Delivery::End,
        };

        match delivery {
            Delivery::Chunk(bytes) => {
                self.state = StreamState::Draining;
                Some(Ok(bytes))
            }
            Delivery::End => {
                self.finish(StreamState::Closed);
                None
            }
            Delivery::Failed(err) => {
                warn!(error = %err, "Blocking stream ended with an error");
                self.finish(StreamState::Failed);
                Some(Err(err))
            }
        }
    }

    fn finish(&mut self, state: StreamState) {
        self.state = state;
        self.receiver.close();
        if state == StreamState::Failed {
            self.writer.cancel();
        }
        if self.worker.as_ref().is_some_and(|w| w.is_finished()) {
            self.join_worker();
        }
        debug!(state = ?state, "Blocking stream finished");
    }

    fn join_worker(&mut self) {
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Producer thread panicked outside the producer callback");
            }
        }
    }
}

impl Iterator for BlockingStream {
    type Item = StreamResult<Bytes>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state.is_terminal() {
            return None;
        }
        let entry = self.receiver.pop_blocking();
        self.deliver(entry)
    }
}

impl Drop for BlockingStream {
    fn drop(&mut self) {
        if !self.state.is_terminal() && self.state != StreamState::Created {
            debug!("Blocking stream dropped before it ended; cancelling producer");
        }
        self.receiver.close();
        self.writer.cancel();
        self.join_worker();
    }
}

/// Async view of a [`BlockingStream`].
///
/// Polls the same channel without blocking, for async hosts that still consume bodies
/// by pulling.
#[derive(Debug)]
pub struct AsyncBody {
    inner: BlockingStream,
}

impl AsyncBody {
    /// Get the current state.
    pub fn state(&self) -> StreamState {
        self.inner.state
    }
}

impl Stream for AsyncBody {
    type Item = StreamResult<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let stream = &mut self.get_mut().inner;
        if stream.state.is_terminal() {
            return Poll::Ready(None);
        }
        match stream.receiver.poll_pop(cx) {
            Poll::Ready(entry) => Poll::Ready(stream.deliver(entry)),
            Poll::Pending => Poll::Pending,
        }
    }
}
