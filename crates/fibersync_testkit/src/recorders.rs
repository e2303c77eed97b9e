//! Recording implementations of the engine's output ports.

use fibersync_engine::{CacheInvalidator, Invalidation, NoticeLevel, Notifier};
use parking_lot::Mutex;

/// A notifier that keeps every notice.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<(NoticeLevel, String)>>,
}

impl RecordingNotifier {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every notice in order.
    pub fn notices(&self) -> Vec<(NoticeLevel, String)> {
        self.notices.lock().clone()
    }

    /// Returns the messages recorded at `level`.
    pub fn messages(&self, level: NoticeLevel) -> Vec<String> {
        self.notices
            .lock()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m.clone())
            .collect()
    }

    /// Returns the most recent notice.
    pub fn last(&self) -> Option<(NoticeLevel, String)> {
        self.notices.lock().last().cloned()
    }

    /// Forgets recorded notices.
    pub fn clear(&self) {
        self.notices.lock().clear();
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, level: NoticeLevel, message: &str) {
        self.notices.lock().push((level, message.to_string()));
    }
}

/// An invalidator that keeps every signal.
#[derive(Debug, Default)]
pub struct RecordingInvalidator {
    signals: Mutex<Vec<Invalidation>>,
}

impl RecordingInvalidator {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every signal in order.
    pub fn signals(&self) -> Vec<Invalidation> {
        self.signals.lock().clone()
    }

    /// Returns the most recent signal.
    pub fn last(&self) -> Option<Invalidation> {
        self.signals.lock().last().cloned()
    }
}

impl CacheInvalidator for RecordingInvalidator {
    fn invalidate(&self, invalidation: &Invalidation) {
        self.signals.lock().push(invalidation.clone());
    }
}
