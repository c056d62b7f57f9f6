use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A transient user-facing notification produced by cart operations.
/// Every successful mutation confirms; every failed mutation reports a
/// cause-distinguishing kind. Nothing is silently dropped.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Notification {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// Notification taxonomy mirrored from the error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Success,
    ProductNotFound,
    InvalidQuantity,
    Failure,
}

impl Notification {
    pub fn success(message: impl Into<String>) -> Self {
        Self::new(NotificationKind::Success, message)
    }

    pub fn failure(kind: NotificationKind, message: impl Into<String>) -> Self {
        Self::new(kind, message)
    }

    fn new(kind: NotificationKind, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            message: message.into(),
            created_at: Utc::now(),
        }
    }
}

/// Sink for user-facing notifications. The UI layer (toast host,
/// status bar) provides its own implementation; `InMemoryNotifier`
/// ships as the default and doubles as the test observer.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Bounded in-process notification buffer. Oldest entries are evicted
/// once capacity is reached.
pub struct InMemoryNotifier {
    buffer: Mutex<VecDeque<Notification>>,
    capacity: usize,
}

impl InMemoryNotifier {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    /// Most recent notifications, newest first.
    pub fn recent(&self, limit: usize) -> Vec<Notification> {
        let buffer = self.lock();
        buffer.iter().rev().take(limit).cloned().collect()
    }

    /// Removes and returns everything buffered, oldest first.
    pub fn drain(&self) -> Vec<Notification> {
        let mut buffer = self.buffer.lock().unwrap_or_else(|e| e.into_inner());
        buffer.drain(..).collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<Notification>> {
        self.buffer.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for InMemoryNotifier {
    fn default() -> Self {
        Self::new(100)
    }
}

impl Notifier for InMemoryNotifier {
    fn notify(&self, notification: Notification) {
        let mut buffer = self.buffer.lock().unwrap_or_else(|e| e.into_inner());
        if buffer.len() == self.capacity {
            buffer.pop_front();
        }
        buffer.push_back(notification);
    }
}
