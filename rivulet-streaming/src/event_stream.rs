//! Event-loop streaming.
//!
//! [`EventStream`] is the body type for hosts with an async-callback capability. Opening
//! it flushes status and headers through the host's callback right away, then schedules
//! the producer on the loop. Chunks are pushed to the callback registered with
//! [`EventStream::each`] by a delivery task running on the loop; nothing ever blocks the
//! loop thread.

use crate::channel::{channel, ChannelReceiver, Delivery};
use crate::event_loop::{EventLoop, Scheduler};
use crate::host::{EarlyResponse, HostEnv, StreamResponse};
use crate::producer::{run_producer, BoxedProducer, ProducerResult};
use crate::state::StreamState;
use crate::writer::StreamWriter;
use bytes::Bytes;
use indexmap::IndexMap;
use parking_lot::Mutex;
use rivulet_core::{BoxedTransport, Message, StreamError, StreamResult};
use std::fmt;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// How an event stream ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    /// The close sentinel was reached.
    Finished,
    /// The producer or the transport failed.
    Failed(String),
    /// The host cancelled the stream before it ended.
    Cancelled,
}

impl StreamOutcome {
    /// Check if the stream ended normally.
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Finished)
    }
}

type ChunkCallback = Box<dyn FnMut(Bytes) + Send + 'static>;
type CompletionHandler = Box<dyn FnOnce(&StreamOutcome) + Send + 'static>;

#[derive(Default)]
struct Completion {
    outcome: Option<StreamOutcome>,
    handlers: Vec<CompletionHandler>,
}

/// State shared with the delivery task.
#[derive(Default)]
struct Shared {
    state: Mutex<StreamState>,
    completion: Mutex<Completion>,
}

impl Shared {
    fn set_state(&self, state: StreamState) {
        *self.state.lock() = state;
    }

    fn complete(&self, outcome: StreamOutcome) {
        let handlers = {
            let mut completion = self.completion.lock();
            if completion.outcome.is_some() {
                return;
            }
            completion.outcome = Some(outcome.clone());
            std::mem::take(&mut completion.handlers)
        };

        self.set_state(if outcome.is_finished() {
            StreamState::Closed
        } else {
            StreamState::Failed
        });
        debug!(outcome = ?outcome, "Event stream completed");

        for handler in handlers {
            handler(&outcome);
        }
    }
}

struct Inner {
    writer: StreamWriter,
    receiver: Mutex<Option<ChannelReceiver>>,
    producer: Mutex<Option<BoxedProducer>>,
    event_loop: EventLoop,
    scheduler: Scheduler,
    headers: IndexMap<String, String>,
    shared: Arc<Shared>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        // With a chunk callback registered the delivery task owns the receiver and runs
        // the stream to completion on its own.
        if self.receiver.get_mut().is_some() {
            self.writer.cancel();
        }
    }
}

/// A stream body delivered by the host's event loop.
///
/// Handles are cheap clones of one shared stream. Once a chunk callback is registered
/// with [`EventStream::each`], the stream lives until it completes or the host calls
/// [`EventStream::cancel`]; every handle may be dropped in the meantime. Dropping every
/// handle before a callback is registered cancels the producer.
#[derive(Clone)]
pub struct EventStream {
    inner: Arc<Inner>,
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("transport", self.inner.writer.transport())
            .field("scheduler", &self.inner.scheduler)
            .field("state", &self.state())
            .finish()
    }
}

impl EventStream {
    /// Create a stream around a transport and a producer.
    pub fn new<F>(
        transport: BoxedTransport,
        producer: F,
        event_loop: EventLoop,
        scheduler: Scheduler,
    ) -> Self
    where
        F: FnOnce(StreamWriter) -> ProducerResult + Send + 'static,
    {
        Self::from_boxed(transport, Box::new(producer), event_loop, scheduler)
    }

    /// Create a stream from an already boxed producer.
    pub fn from_boxed(
        transport: BoxedTransport,
        producer: BoxedProducer,
        event_loop: EventLoop,
        scheduler: Scheduler,
    ) -> Self {
        let (sender, receiver) = channel();
        let mut headers = IndexMap::new();
        headers.insert(
            "Content-Type".to_string(),
            transport.content_type().to_string(),
        );

        Self {
            inner: Arc::new(Inner {
                writer: StreamWriter::new(sender, transport),
                receiver: Mutex::new(Some(receiver)),
                producer: Mutex::new(Some(producer)),
                event_loop,
                scheduler,
                headers,
                shared: Arc::new(Shared::default()),
            }),
        }
    }

    /// Add headers to the early response. `Content-Type` always stays the transport's.
    ///
    /// Only effective before [`EventStream::open`].
    pub fn with_headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            for (name, value) in headers {
                let name = name.into();
                if !name.eq_ignore_ascii_case("content-type") {
                    inner.headers.insert(name, value.into());
                }
            }
        }
        self
    }

    /// Flush the early response through the host callback and schedule the producer.
    ///
    /// The callback runs exactly once, synchronously, before the producer is scheduled,
    /// so headers always reach the client before any chunk. Returns
    /// [`StreamResponse::Deferred`]: the caller must not send a response of its own.
    pub fn open(&self, env: &mut HostEnv) -> StreamResult<StreamResponse> {
        if !env.supports_async() {
            return Err(StreamError::Configuration(
                "host environment has no async callback".to_string(),
            ));
        }
        let producer = self.inner.producer.lock().take().ok_or_else(|| {
            StreamError::InvalidState("event stream was already opened".to_string())
        })?;
        let callback = env.take_async_callback().ok_or_else(|| {
            StreamError::Configuration("host environment has no async callback".to_string())
        })?;

        let transport = Arc::clone(self.inner.writer.transport());
        transport.open(&self.inner.writer)?;
        self.inner.shared.set_state(StreamState::Open);

        callback(EarlyResponse {
            status: 200,
            headers: self.inner.headers.clone(),
            body: self.clone(),
        });

        let writer = self.inner.writer.clone();
        self.inner
            .event_loop
            .schedule(self.inner.scheduler, move || run_producer(producer, writer));

        debug!(
            format = %transport.format(),
            scheduler = ?self.inner.scheduler,
            "Event stream opened"
        );
        Ok(StreamResponse::Deferred(self.clone()))
    }

    /// Register the chunk callback and start delivering.
    ///
    /// This only registers; chunks are pushed from the loop as they arrive. Writes made
    /// before registration are buffered and delivered first, in order.
    pub fn each<F>(&self, callback: F) -> StreamResult<()>
    where
        F: FnMut(Bytes) + Send + 'static,
    {
        let receiver = self.inner.receiver.lock().take().ok_or_else(|| {
            StreamError::InvalidState("a chunk callback is already registered".to_string())
        })?;

        let shared = Arc::clone(&self.inner.shared);
        let cancel = self.inner.writer.cancellation_token();
        self.inner
            .event_loop
            .next_tick(deliver(receiver, Box::new(callback), shared, cancel));
        Ok(())
    }

    /// Stop the stream, typically because the client went away.
    ///
    /// The producer sees the cancellation through its writer and delivery stops without
    /// draining what is still queued. Completes the stream with
    /// [`StreamOutcome::Cancelled`] unless it already ended.
    pub fn cancel(&self) {
        debug!("Event stream cancelled by host");
        self.inner.writer.cancel();
        // Without a delivery task nobody else will report the outcome.
        if self.inner.receiver.lock().take().is_some() {
            self.inner.shared.complete(StreamOutcome::Cancelled);
        }
    }

    /// Register a completion handler.
    ///
    /// Runs once when the stream ends; runs immediately if it already has.
    pub fn on_complete<F>(&self, handler: F)
    where
        F: FnOnce(&StreamOutcome) + Send + 'static,
    {
        let mut completion = self.inner.shared.completion.lock();
        match completion.outcome.clone() {
            Some(outcome) => {
                drop(completion);
                handler(&outcome);
            }
            None => completion.handlers.push(Box::new(handler)),
        }
    }

    /// Wait for the stream to end.
    pub async fn finished(&self) -> StreamOutcome {
        let (tx, rx) = oneshot::channel();
        self.on_complete(move |outcome| {
            let _ = tx.send(outcome.clone());
        });
        rx.await.unwrap_or_else(|_| {
            StreamOutcome::Failed("stream dropped before completion".to_string())
        })
    }

    /// Queue a message.
    pub fn write(&self, message: impl Into<Message>) -> StreamResult<()> {
        self.inner.writer.write(message)
    }

    /// Close the stream through its transport.
    pub fn close(&self) -> StreamResult<()> {
        self.inner.writer.close()
    }

    /// Get a write handle.
    pub fn writer(&self) -> StreamWriter {
        self.inner.writer.clone()
    }

    /// Get the current state.
    pub fn state(&self) -> StreamState {
        *self.inner.shared.state.lock()
    }

    /// Get the early-response headers.
    pub fn headers(&self) -> &IndexMap<String, String> {
        &self.inner.headers
    }
}

async fn deliver(
    mut receiver: ChannelReceiver,
    mut callback: ChunkCallback,
    shared: Arc<Shared>,
    cancel: CancellationToken,
) {
    let outcome = loop {
        let entry = tokio::select! {
            biased;
            _ = cancel.cancelled() => break StreamOutcome::Cancelled,
            entry = receiver.pop() => entry,
        };
        let delivery = match entry {
            Some(entry) => entry.resolve(),
            None => Delivery::End,
        };

        match delivery {
            Delivery::Chunk(bytes) => {
                shared.set_state(StreamState::Draining);
                callback(bytes);
                // One delivery per turn of the loop.
                tokio::task::yield_now().await;
            }
            Delivery::End => break StreamOutcome::Finished,
            Delivery::Failed(err) => {
                warn!(error = %err, "Event stream ended with an error");
                break StreamOutcome::Failed(err.to_string());
            }
        }
    };

    receiver.close();
    shared.complete(outcome);
}
