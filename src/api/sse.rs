//! `text/event-stream` framing for the backend log feed.
//!
//! The backend emits named events: `log` carries one log line, `error`
//! carries a server-side failure message. [`LogStream`] turns the raw byte
//! stream into [`StreamEvent`]s and ends with a single `Closed` event.
//! It never reconnects.

use std::io::BufRead;

/// One dispatched server-push event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub name: String,
    pub data: String,
}

/// Incremental parser fed one line at a time (without the line terminator).
#[derive(Debug, Default)]
pub struct SseParser {
    name: Option<String>,
    data: Vec<String>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one line. Returns an event when the line completes one.
    pub fn feed(&mut self, line: &str) -> Option<SseEvent> {
        let line = line.strip_suffix('\r').unwrap_or(line);

        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.name = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            // id and retry only matter for reconnection, which is not done here.
            _ => {}
        }
        None
    }

    /// Flush a pending event at end of stream.
    pub fn finish(&mut self) -> Option<SseEvent> {
        self.dispatch()
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let name = self.name.take();
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseEvent {
            name: name
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| "message".to_string()),
            data,
        })
    }
}

/// What the log feed delivers to its consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A log line.
    Line(String),
    /// The backend reported a failure on the stream (e.g. unreadable log file).
    ServerError(String),
    /// The connection ended; `Some` carries the transport error.
    Closed(Option<String>),
}

impl StreamEvent {
    fn from_sse(event: SseEvent) -> Option<Self> {
        match event.name.as_str() {
            "log" | "message" => Some(Self::Line(event.data)),
            "error" => Some(Self::ServerError(event.data)),
            _ => None,
        }
    }
}

/// Blocking iterator over the backend's log feed.
pub struct LogStream {
    reader: Box<dyn BufRead + Send>,
    parser: SseParser,
    closed: bool,
}

impl LogStream {
    pub fn new(reader: impl BufRead + Send + 'static) -> Self {
        Self {
            reader: Box::new(reader),
            parser: SseParser::new(),
            closed: false,
        }
    }
}

impl Iterator for LogStream {
    type Item = StreamEvent;

    fn next(&mut self) -> Option<StreamEvent> {
        if self.closed {
            return None;
        }

        let mut raw = Vec::new();
        loop {
            raw.clear();
            match self.reader.read_until(b'\n', &mut raw) {
                Ok(0) => {
                    let pending = self.parser.finish().and_then(StreamEvent::from_sse);
                    if pending.is_some() {
                        return pending;
                    }
                    self.closed = true;
                    return Some(StreamEvent::Closed(None));
                }
                Ok(_) => {
                    // Log files may hold arbitrary bytes; decode lossily.
                    let line = String::from_utf8_lossy(&raw);
                    let text = line.strip_suffix('\n').unwrap_or(&line);
                    if let Some(event) = self.parser.feed(text).and_then(StreamEvent::from_sse) {
                        return Some(event);
                    }
                }
                Err(e) => {
                    self.closed = true;
                    return Some(StreamEvent::Closed(Some(e.to_string())));
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
