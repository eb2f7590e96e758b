//! Transition notifications.
//!
//! The engine reports the outcome of every commit through a
//! [`NotificationSink`]. The terminal board shows them as [`Toasts`]; the
//! `move` command streams them as JSON lines.

use std::collections::VecDeque;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use crate::error::{Error, Result};

pub const NOTIFICATION_SCHEMA_VERSION: &str = "boardflow.notification.v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    TransitionSucceeded,
    TransitionFailed,
    Validation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub severity: Severity,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl Notification {
    pub fn new(kind: NotificationKind, message: impl Into<String>) -> Self {
        let severity = match kind {
            NotificationKind::TransitionSucceeded => Severity::Success,
            NotificationKind::TransitionFailed | NotificationKind::Validation => Severity::Error,
        };
        Self {
            kind,
            severity,
            message: message.into(),
            at: Utc::now(),
        }
    }

    pub fn succeeded(message: impl Into<String>) -> Self {
        Self::new(NotificationKind::TransitionSucceeded, message)
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(NotificationKind::TransitionFailed, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(NotificationKind::Validation, message)
    }
}

pub trait NotificationSink {
    fn notify(&mut self, notification: Notification);
}

impl NotificationSink for Vec<Notification> {
    fn notify(&mut self, notification: Notification) {
        self.push(notification);
    }
}

impl<S: NotificationSink + ?Sized> NotificationSink for &mut S {
    fn notify(&mut self, notification: Notification) {
        (**self).notify(notification);
    }
}

/// Transient notifications that expire after a fixed time to live.
#[derive(Debug, Clone)]
pub struct Toasts {
    ttl: Duration,
    queue: VecDeque<(Instant, Notification)>,
    capacity: usize,
}

impl Toasts {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            queue: VecDeque::new(),
            capacity: 4,
        }
    }

    pub fn push_at(&mut self, notification: Notification, now: Instant) {
        if self.queue.len() == self.capacity {
            self.queue.pop_front();
        }
        self.queue.push_back((now, notification));
    }

    /// Drops expired toasts. Returns true when something was removed.
    pub fn prune(&mut self, now: Instant) -> bool {
        let before = self.queue.len();
        let ttl = self.ttl;
        self.queue
            .retain(|(shown_at, _)| now.saturating_duration_since(*shown_at) < ttl);
        before != self.queue.len()
    }

    /// Newest first.
    pub fn visible(&self) -> impl Iterator<Item = &Notification> {
        self.queue.iter().rev().map(|(_, notification)| notification)
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }
}

impl NotificationSink for Toasts {
    fn notify(&mut self, notification: Notification) {
        self.push_at(notification, Instant::now());
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventDestination {
    Stdout,
    File(PathBuf),
}

impl EventDestination {
    /// `-` is stdout; blank means no destination.
    pub fn parse(raw: Option<&str>) -> Option<Self> {
        raw.and_then(|value| {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                return None;
            }
            if trimmed == "-" {
                return Some(EventDestination::Stdout);
            }
            Some(EventDestination::File(PathBuf::from(trimmed)))
        })
    }

    pub fn open(&self) -> Result<JsonlSink> {
        match self {
            EventDestination::Stdout => Ok(JsonlSink::stdout()),
            EventDestination::File(path) => JsonlSink::file(path),
        }
    }
}

#[derive(Serialize)]
struct NotificationLine<'a> {
    schema_version: &'static str,
    #[serde(flatten)]
    notification: &'a Notification,
}

/// Writes notifications as JSON lines.
pub struct JsonlSink {
    writer: Box<dyn Write + Send>,
}

impl JsonlSink {
    pub fn stdout() -> Self {
        Self {
            writer: Box::new(std::io::stdout()),
        }
    }

    /// Appends to `path`, creating it if necessary.
    pub fn file(path: &Path) -> Result<Self> {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        Ok(Self {
            writer: Box::new(file),
        })
    }

    pub fn from_writer(writer: impl Write + Send + 'static) -> Self {
        Self {
            writer: Box::new(writer),
        }
    }

    pub fn emit(&mut self, notification: &Notification) -> Result<()> {
        let line = NotificationLine {
            schema_version: NOTIFICATION_SCHEMA_VERSION,
            notification,
        };
        let serialized = serde_json::to_vec(&line)?;
        self.writer.write_all(&serialized)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush().map_err(Error::Io)?;
        Ok(())
    }
}

impl NotificationSink for JsonlSink {
    fn notify(&mut self, notification: Notification) {
        if let Err(err) = self.emit(&notification) {
            warn!(error = %err, "failed to write notification");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Shared(Arc<Mutex<Vec<u8>>>);

    impl Write for Shared {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn severity_follows_kind() {
        assert_eq!(Notification::succeeded("ok").severity, Severity::Success);
        assert_eq!(Notification::failed("no").severity, Severity::Error);
        assert_eq!(Notification::validation("hm").severity, Severity::Error);
    }

    #[test]
    fn toasts_expire_after_ttl() {
        let start = Instant::now();
        let mut toasts = Toasts::new(Duration::from_millis(100));
        toasts.push_at(Notification::succeeded("first"), start);
        toasts.push_at(Notification::failed("second"), start + Duration::from_millis(60));

        assert!(toasts.prune(start + Duration::from_millis(120)));
        let left: Vec<_> = toasts.visible().map(|n| n.message.as_str()).collect();
        assert_eq!(left, vec!["second"]);
        assert!(toasts.prune(start + Duration::from_millis(200)));
        assert!(toasts.is_empty());
    }

    #[test]
    fn toasts_keep_newest_when_full() {
        let start = Instant::now();
        let mut toasts = Toasts::new(Duration::from_secs(10));
        for index in 0..6 {
            toasts.push_at(Notification::succeeded(format!("n{index}")), start);
        }
        assert_eq!(toasts.len(), 4);
        assert_eq!(toasts.visible().next().unwrap().message, "n5");
    }

    #[test]
    fn jsonl_sink_writes_one_line_per_notification() {
        let buffer = Shared::default();
        let mut sink = JsonlSink::from_writer(buffer.clone());
        sink.notify(Notification::failed("Failed to move A"));
        sink.notify(Notification::succeeded("Moved A"));

        let raw = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
        let lines: Vec<serde_json::Value> = raw
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["schema_version"], NOTIFICATION_SCHEMA_VERSION);
        assert_eq!(lines[0]["kind"], "transition_failed");
        assert_eq!(lines[0]["severity"], "error");
        assert_eq!(lines[1]["message"], "Moved A");
    }

    #[test]
    fn event_destination_parse() {
        assert_eq!(EventDestination::parse(Some(" - ")), Some(EventDestination::Stdout));
        assert_eq!(EventDestination::parse(Some("  ")), None);
        assert_eq!(
            EventDestination::parse(Some("out.jsonl")),
            Some(EventDestination::File(PathBuf::from("out.jsonl")))
        );
    }
}
