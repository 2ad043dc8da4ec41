//! Server-Sent Events (SSE) encoding.
//!
//! [`SseTransport`] renders each message as one SSE event:
//!
//! ```text
//! retry: <ms>      (if set)
//! id: <id>         (if set)
//! event: <name>    (if set)
//! data: <line>     (one per payload line, trailing blank lines dropped)
//!
//! ```
//!
//! The field order and the line splitting are part of the wire contract.

use crate::error::StreamResult;
use crate::message::{Message, MessageOptions};
use crate::transport::Transport;
use bytes::Bytes;

/// Content type of an SSE response.
pub const SSE_CONTENT_TYPE: &str = "text/event-stream";

/// Format id for SSE responses.
pub const SSE_FORMAT: &str = "sse";

/// Server-Sent Events transport.
#[derive(Debug, Clone, Copy, Default)]
pub struct SseTransport;

impl SseTransport {
    /// Create a new SSE transport.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Transport for SseTransport {
    fn content_type(&self) -> &str {
        SSE_CONTENT_TYPE
    }

    fn format(&self) -> &str {
        SSE_FORMAT
    }

    fn call(&self, message: &Message) -> StreamResult<Bytes> {
        let text = message.payload().to_text()?;
        Ok(Bytes::from(encode_event(&text, message.options())))
    }
}

/// Encode one event from already-rendered text.
pub fn encode_event(data: &str, options: &MessageOptions) -> String {
    let mut event = String::with_capacity(data.len() + 16);

    if let Some(retry) = &options.retry {
        push_field(&mut event, "retry", retry);
    }
    if let Some(id) = &options.id {
        push_field(&mut event, "id", id);
    }
    if let Some(name) = &options.event {
        push_field(&mut event, "event", name);
    }

    for line in data_lines(data) {
        event.push_str("data: ");
        event.push_str(line);
        event.push('\n');
    }

    event.push('\n');
    event
}

/// Split a payload on `\n`, `\r\n` and lone `\r`, dropping trailing empty lines.
fn data_lines(data: &str) -> Vec<&str> {
    let mut lines: Vec<&str> = data
        .split('\n')
        .flat_map(|segment| segment.strip_suffix('\r').unwrap_or(segment).split('\r'))
        .collect();
    while lines.last().is_some_and(|line| line.is_empty()) {
        lines.pop();
    }
    lines
}

fn push_field(out: &mut String, name: &str, value: &str) {
    out.push_str(name);
    out.push_str(": ");
    // A line break inside a field would end the field early on the client.
    out.extend(value.chars().filter(|c| *c != '\r' && *c != '\n'));
    out.push('\n');
}
