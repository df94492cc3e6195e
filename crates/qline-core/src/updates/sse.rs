//! Server-sent events decoding
//!
//! Incremental decoder for the `text/event-stream` format. Chunks may split
//! lines (and UTF-8 sequences) anywhere; complete events are returned as
//! soon as their terminating blank line arrives.

use tracing::warn;

/// Longest line kept; longer lines are dropped whole
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// One dispatched event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Event type; `None` means the default `message` type
    pub event: Option<String>,
    /// Data lines joined with `\n`
    pub data: String,
    /// Last event id seen on the stream so far
    pub id: Option<String>,
}

impl SseEvent {
    /// Whether this is a plain `message` event
    pub fn is_message(&self) -> bool {
        matches!(self.event.as_deref(), None | Some("message"))
    }
}

/// Incremental `text/event-stream` decoder
#[derive(Debug, Default)]
pub struct SseDecoder {
    line: Vec<u8>,
    discarding: bool,
    skip_lf: bool,
    event: Option<String>,
    data: Vec<String>,
    last_id: Option<String>,
    retry_ms: Option<u64>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decoder for a new connection that continues an earlier stream
    pub fn resume(last_event_id: Option<String>, retry_ms: Option<u64>) -> Self {
        Self {
            last_id: last_event_id,
            retry_ms,
            ..Self::default()
        }
    }

    /// Feed a chunk, returning every event it completes
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        let mut events = Vec::new();
        for &byte in chunk {
            if self.skip_lf {
                self.skip_lf = false;
                if byte == b'\n' {
                    continue;
                }
            }
            match byte {
                b'\n' => self.end_line(&mut events),
                b'\r' => {
                    self.end_line(&mut events);
                    self.skip_lf = true;
                }
                _ if self.discarding => {}
                _ if self.line.len() >= MAX_LINE_BYTES => {
                    warn!("Dropping update stream line over {} bytes", MAX_LINE_BYTES);
                    self.line = Vec::new();
                    self.discarding = true;
                }
                _ => self.line.push(byte),
            }
        }
        events
    }

    /// Last `id:` received, for `Last-Event-ID` on reconnect
    pub fn last_event_id(&self) -> Option<&str> {
        self.last_id.as_deref()
    }

    /// Reconnect delay requested by the server via `retry:`
    pub fn retry_ms(&self) -> Option<u64> {
        self.retry_ms
    }

    fn end_line(&mut self, events: &mut Vec<SseEvent>) {
        if self.discarding {
            self.discarding = false;
        } else {
            self.finish_line(events);
        }
    }

    fn finish_line(&mut self, events: &mut Vec<SseEvent>) {
        let raw = std::mem::take(&mut self.line);
        let line = String::from_utf8_lossy(&raw);

        if line.is_empty() {
            if let Some(event) = self.dispatch() {
                events.push(event);
            }
            return;
        }

        // Comment / keep-alive
        if line.starts_with(':') {
            return;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line.as_ref(), ""),
        };

        match field {
            "data" => self.data.push(value.to_string()),
            "event" => self.event = Some(value.to_string()),
            "id" if !value.contains('\0') => self.last_id = Some(value.to_string()),
            "retry" => {
                if let Ok(ms) = value.parse() {
                    self.retry_ms = Some(ms);
                }
            }
            _ => {}
        }
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        Some(SseEvent {
            event,
            data: std::mem::take(&mut self.data).join("\n"),
            id: self.last_id.clone(),
        })
    }
}
