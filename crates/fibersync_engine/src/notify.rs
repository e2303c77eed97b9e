//! User-facing run notifications.

use std::fmt;
use tracing::{error, info, warn};

/// Severity of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    /// Progress information.
    Info,
    /// A run finished cleanly.
    Success,
    /// A run finished with failures.
    Warning,
    /// A run could not start.
    Error,
}

impl fmt::Display for NoticeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NoticeLevel::Info => "info",
            NoticeLevel::Success => "success",
            NoticeLevel::Warning => "warning",
            NoticeLevel::Error => "error",
        };
        f.write_str(s)
    }
}

/// Surfaces run-level messages to the user (toasts, CLI output, logs).
pub trait Notifier: Send + Sync {
    /// Shows `message` at `level`.
    fn notify(&self, level: NoticeLevel, message: &str);
}

/// Notifier that writes to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, level: NoticeLevel, message: &str) {
        match level {
            NoticeLevel::Info | NoticeLevel::Success => info!(%level, "{message}"),
            NoticeLevel::Warning => warn!("{message}"),
            NoticeLevel::Error => error!("{message}"),
        }
    }
}
