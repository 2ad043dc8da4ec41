//! Producers and the code that runs them.

use crate::writer::StreamWriter;
use rivulet_core::StreamError;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, error};

/// Result of a producer.
pub type ProducerResult = anyhow::Result<()>;

/// A boxed producer callback.
pub type BoxedProducer = Box<dyn FnOnce(StreamWriter) -> ProducerResult + Send + 'static>;

/// Whether a producer may block its thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProducerMode {
    /// The producer only does quick, non-blocking work.
    #[default]
    NonBlocking,
    /// The producer may block (sleep, wait on I/O, wait on a signal).
    Blocking,
}

/// Run a producer to completion and make sure the stream ends.
///
/// A producer that returns without closing is closed for it. An error or a panic is
/// logged and turned into an abort sentinel, so the consumer always terminates.
pub(crate) fn run_producer(producer: BoxedProducer, writer: StreamWriter) {
    let outcome = {
        let writer = writer.clone();
        panic::catch_unwind(AssertUnwindSafe(move || producer(writer)))
    };

    match outcome {
        Ok(Ok(())) => {
            if !writer.is_closed() {
                debug!("Producer returned without closing the stream");
                if let Err(err) = writer.close() {
                    debug!(error = %err, "Could not close stream after producer returned");
                }
            }
        }
        Ok(Err(err)) => {
            let disconnected = matches!(
                err.downcast_ref::<StreamError>(),
                Some(StreamError::Disconnected)
            );
            if disconnected {
                debug!("Producer stopped after the consumer disconnected");
                return;
            }
            let failure = StreamError::from_producer(&err);
            error!(error = %failure, "Stream producer failed");
            writer.abort(failure);
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!(panic = %message, "Stream producer panicked");
            writer.abort(StreamError::Producer(format!(
                "producer panicked: {message}"
            )));
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
