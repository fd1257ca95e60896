//! Customer-facing notices (toasts and inline messages).

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// Severity of a notice
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    /// Something went well
    Info,
    /// The customer tried something that is not allowed
    Warning,
    /// A step failed
    Error,
}

/// A message for the customer
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    /// Severity
    pub level: NoticeLevel,
    /// Text to show
    pub message: String,
}

impl Notice {
    /// Informational notice
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    /// Warning notice
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    /// Error notice
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// Where notices are delivered
///
/// Reducers call this synchronously; implementations must not block.
pub trait Notifier: Send + Sync {
    /// Deliver a notice
    fn notify(&self, notice: Notice);
}

/// Writes notices to the log
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Info => tracing::info!(notice = %notice.message, "Customer notice"),
            NoticeLevel::Warning => tracing::warn!(notice = %notice.message, "Customer notice"),
            NoticeLevel::Error => tracing::error!(notice = %notice.message, "Customer notice"),
        }
    }
}

/// Keeps every notice for later inspection
///
/// Clones share the same buffer.
#[derive(Clone, Debug, Default)]
pub struct RecordingNotifier {
    notices: Arc<Mutex<Vec<Notice>>>,
}

impl RecordingNotifier {
    /// Create an empty recorder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All notices so far, oldest first
    #[must_use]
    pub fn notices(&self) -> Vec<Notice> {
        self.notices
            .lock()
            .map_or_else(|poisoned| poisoned.into_inner().clone(), |n| n.clone())
    }

    /// Notices at `level`
    #[must_use]
    pub fn at_level(&self, level: NoticeLevel) -> Vec<String> {
        self.notices()
            .into_iter()
            .filter(|n| n.level == level)
            .map(|n| n.message)
            .collect()
    }

    /// Drop everything recorded so far
    pub fn clear(&self) {
        if let Ok(mut notices) = self.notices.lock() {
            notices.clear();
        }
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        tracing::debug!(level = ?notice.level, message = %notice.message, "Recorded notice");
        if let Ok(mut notices) = self.notices.lock() {
            notices.push(notice);
        }
    }
}
