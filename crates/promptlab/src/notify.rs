//! User-facing notifications raised by the workspace.
//!
//! The workspace pushes a [`Notification`] whenever a collaborator call fails
//! or a save completes. A frontend drains the [`NotificationBuffer`] at its
//! own pace. The buffer has its own mutex, separate from the workspace
//! state, and is capped so an undrained burst cannot grow without bound.

use std::sync::{Arc, Mutex};

use chrono::Local;
use serde::{Deserialize, Serialize};

/// Maximum buffered notifications before trimming.
pub const MAX_NOTIFICATIONS: usize = 200;

/// Number of newest notifications kept after a trim.
pub const NOTIFICATION_TRIM_TO: usize = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationLevel {
    Info,
    Warn,
    Error,
}

impl NotificationLevel {
    /// Short fixed-width label for display.
    pub fn label(self) -> &'static str {
        match self {
            Self::Info => "INFO ",
            Self::Warn => "WARN ",
            Self::Error => "ERROR",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Local wall-clock time, `HH:MM:SS`.
    pub time: String,
    pub level: NotificationLevel,
    pub message: String,
}

impl std::fmt::Display for Notification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.time, self.level.label(), self.message)
    }
}

/// A shared, capped buffer of pending notifications.
#[derive(Clone, Default)]
pub struct NotificationBuffer(Arc<Mutex<Vec<Notification>>>);

impl NotificationBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, level: NotificationLevel, message: impl Into<String>) {
        let notification = Notification {
            time: Local::now().format("%H:%M:%S").to_string(),
            level,
            message: message.into(),
        };
        let mut buf = self.0.lock().unwrap_or_else(|e| e.into_inner());
        buf.push(notification);
        if buf.len() > MAX_NOTIFICATIONS {
            let trim_to = buf.len() - NOTIFICATION_TRIM_TO;
            buf.drain(..trim_to);
        }
    }

    pub fn info(&self, message: impl Into<String>) {
        self.push(NotificationLevel::Info, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.push(NotificationLevel::Error, message);
    }

    /// Take all pending notifications.
    pub fn drain(&self) -> Vec<Notification> {
        let mut buf = self.0.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::take(&mut *buf)
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_empties_buffer() {
        let buf = NotificationBuffer::new();
        buf.error("save failed");
        buf.info("saved greeter v2");
        let drained = buf.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].level, NotificationLevel::Error);
        assert_eq!(drained[1].message, "saved greeter v2");
        assert!(buf.is_empty());
    }

    #[test]
    fn clones_share_storage() {
        let buf = NotificationBuffer::new();
        let frontend = buf.clone();
        buf.push(NotificationLevel::Warn, "slow");
        assert_eq!(frontend.len(), 1);
    }

    #[test]
    fn buffer_is_capped() {
        let buf = NotificationBuffer::new();
        for i in 0..=MAX_NOTIFICATIONS {
            buf.info(format!("n{i}"));
        }
        let drained = buf.drain();
        assert_eq!(drained.len(), NOTIFICATION_TRIM_TO);
        assert_eq!(drained.last().unwrap().message, format!("n{MAX_NOTIFICATIONS}"));
    }

    #[test]
    fn display_has_time_level_message() {
        let n = Notification {
            time: "12:00:00".into(),
            level: NotificationLevel::Error,
            message: "boom".into(),
        };
        assert_eq!(n.to_string(), "12:00:00 ERROR boom");
    }
}
