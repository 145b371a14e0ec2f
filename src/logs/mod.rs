//! Live log stream consumer.
//!
//! Receives [`StreamEvent`]s from the backend feed and keeps a bounded
//! display buffer of the most recent lines. While `Active`, each line is
//! appended and announced through the [`NotificationQueue`]; while
//! `Paused`, lines are dropped outright (no backlog on resume).
//!
//! Server-side `error` events and the final `Closed` event are recorded on
//! the display buffer in every state. The consumer never reconnects.

pub mod notify;

use std::collections::VecDeque;
use std::time::Instant;

use crate::api::StreamEvent;

use notify::NotificationQueue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    Active,
    Paused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Log,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub kind: LineKind,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct LogStreamConsumer {
    state: ConsumerState,
    lines: VecDeque<LogLine>,
    capacity: usize,
    connected: bool,
}

impl LogStreamConsumer {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: ConsumerState::Active,
            lines: VecDeque::new(),
            capacity: capacity.max(1),
            connected: true,
        }
    }

    pub fn state(&self) -> ConsumerState {
        self.state
    }

    pub fn is_paused(&self) -> bool {
        self.state == ConsumerState::Paused
    }

    /// Whether the feed is still open.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Label for the pause/resume affordance.
    pub fn toggle_label(&self) -> &'static str {
        match self.state {
            ConsumerState::Active => "Pause",
            ConsumerState::Paused => "Resume",
        }
    }

    pub fn toggle_pause(&mut self) {
        self.state = match self.state {
            ConsumerState::Active => ConsumerState::Paused,
            ConsumerState::Paused => ConsumerState::Active,
        };
    }

    /// Empty the display buffer. Subscription state is unaffected.
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn lines(&self) -> impl ExactSizeIterator<Item = &LogLine> {
        self.lines.iter()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn handle(&mut self, event: StreamEvent, toasts: &mut NotificationQueue, now: Instant) {
        match event {
            StreamEvent::Line(text) => {
                if self.is_paused() || text.is_empty() {
                    return;
                }
                toasts.info(text.clone(), now);
                self.append(LineKind::Log, text);
            }
            StreamEvent::ServerError(text) => {
                tracing::warn!(error = %text, "log stream reported an error");
                self.append(LineKind::Error, format!("[stream error] {text}"));
            }
            StreamEvent::Closed(reason) => {
                self.connected = false;
                let text = match reason {
                    Some(reason) => {
                        tracing::warn!(error = %reason, "log stream failed");
                        format!("[stream closed] {reason}")
                    }
                    None => {
                        tracing::info!("log stream closed by backend");
                        "[stream closed]".to_string()
                    }
                };
                self.append(LineKind::Error, text);
            }
        }
    }

    fn append(&mut self, kind: LineKind, text: String) {
        if self.lines.len() >= self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(LogLine { kind, text });
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn line(text: &str) -> StreamEvent {
        StreamEvent::Line(text.to_string())
    }

    #[test]
    fn active_lines_are_buffered_and_announced() {
        let now = Instant::now();
        let mut toasts = NotificationQueue::new(10);
        let mut consumer = LogStreamConsumer::new(100);

        consumer.handle(line("blocked rm -rf /"), &mut toasts, now);
        consumer.handle(line("blocked write /etc/passwd"), &mut toasts, now);

        assert_eq!(consumer.len(), 2);
        assert_eq!(toasts.len(), 2);
    }

    #[test]
    fn paused_events_are_dropped_without_backlog() {
        let now = Instant::now();
        let mut toasts = NotificationQueue::new(10);
        let mut consumer = LogStreamConsumer::new(100);
        consumer.handle(line("before"), &mut toasts, now);

        consumer.toggle_pause();
        assert_eq!(consumer.toggle_label(), "Resume");
        for i in 0..3 {
            consumer.handle(line(&format!("dropped {i}")), &mut toasts, now);
        }
        assert_eq!(consumer.len(), 1);
        assert_eq!(toasts.len(), 1);

        consumer.toggle_pause();
        assert_eq!(consumer.state(), ConsumerState::Active);
        assert_eq!(consumer.toggle_label(), "Pause");
        let texts: Vec<&str> = consumer.lines().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["before"]);
    }

    #[test]
    fn buffer_is_bounded() {
        let now = Instant::now();
        let mut toasts = NotificationQueue::new(3);
        let mut consumer = LogStreamConsumer::new(3);
        for i in 0..10 {
            consumer.handle(line(&i.to_string()), &mut toasts, now);
        }
        let texts: Vec<&str> = consumer.lines().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["7", "8", "9"]);
        assert_eq!(toasts.len(), 3);
    }

    #[test]
    fn clear_keeps_subscription() {
        let now = Instant::now();
        let mut toasts = NotificationQueue::new(3);
        let mut consumer = LogStreamConsumer::new(10);
        consumer.handle(line("a"), &mut toasts, now);
        consumer.clear();
        assert!(consumer.is_empty());
        assert!(consumer.is_connected());
        consumer.handle(line("b"), &mut toasts, now);
        assert_eq!(consumer.len(), 1);
    }

    #[test]
    fn errors_are_recorded_even_when_paused() {
        let now = Instant::now();
        let mut toasts = NotificationQueue::new(3);
        let mut consumer = LogStreamConsumer::new(10);
        consumer.toggle_pause();
        consumer.handle(
            StreamEvent::ServerError("Error opening log file".into()),
            &mut toasts,
            now,
        );
        consumer.handle(
            StreamEvent::Closed(Some("connection reset".into())),
            &mut toasts,
            now,
        );
        assert_eq!(consumer.len(), 2);
        assert!(consumer.lines().all(|l| l.kind == LineKind::Error));
        assert!(!consumer.is_connected());
        assert!(toasts.is_empty());
    }

    #[test]
    fn empty_lines_are_skipped() {
        let now = Instant::now();
        let mut toasts = NotificationQueue::new(3);
        let mut consumer = LogStreamConsumer::new(10);
        consumer.handle(line(""), &mut toasts, now);
        assert!(consumer.is_empty());
        assert!(toasts.is_empty());
    }
}
