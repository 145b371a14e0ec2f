//! Transient pop-up notifications ("toasts").
//!
//! Every accepted message becomes its own entry with a fixed lifetime of
//! [`NOTIFICATION_LIFETIME`]; duplicates are not merged. Entries fade in
//! and out over [`TRANSITION`]. The number of entries kept at once is
//! bounded: pushing past the bound evicts the oldest entry.
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// How long an entry stays on screen, independent of queue depth.
pub const NOTIFICATION_LIFETIME: Duration = Duration::from_secs(5);

/// Length of the enter and exit transitions.
pub const TRANSITION: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Error,
}

/// Where an entry is in its on-screen lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Entering,
    Shown,
    Leaving,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub text: String,
    pub level: Level,
    pub created_at: Instant,
}

impl Notification {
    pub fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) >= NOTIFICATION_LIFETIME
    }

    pub fn phase(&self, now: Instant) -> Phase {
        let age = now.saturating_duration_since(self.created_at);
        if age < TRANSITION {
            Phase::Entering
        } else if age + TRANSITION >= NOTIFICATION_LIFETIME {
            Phase::Leaving
        } else {
            Phase::Shown
        }
    }
}

#[derive(Debug, Clone)]
pub struct NotificationQueue {
    entries: VecDeque<Notification>,
    max_visible: usize,
}

impl NotificationQueue {
    pub fn new(max_visible: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            max_visible: max_visible.max(1),
        }
    }

    pub fn push(&mut self, text: impl Into<String>, level: Level, now: Instant) {
        if self.entries.len() >= self.max_visible {
            self.entries.pop_front();
        }
        self.entries.push_back(Notification {
            text: text.into(),
            level,
            created_at: now,
        });
    }

    pub fn info(&mut self, text: impl Into<String>, now: Instant) {
        self.push(text, Level::Info, now);
    }

    pub fn error(&mut self, text: impl Into<String>, now: Instant) {
        self.push(text, Level::Error, now);
    }

    /// Drop expired entries.
    pub fn expire(&mut self, now: Instant) {
        self.entries.retain(|n| !n.is_expired(now));
    }

    /// Entries still alive at `now`, oldest first.
    pub fn visible(&self, now: Instant) -> impl Iterator<Item = &Notification> {
        self.entries.iter().filter(move |n| !n.is_expired(now))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
