//! User-visible notices and service status
//!
//! Notices are short messages such as "Listening for wake word..." or a
//! token error. The status is the persistent line shown while the background
//! listener runs (a notification on phones, the tray on desktop).

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// A short message shown to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// State shown in the persistent status notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceStatus {
    /// Spotting the wake word
    Listening,
    /// Between sessions, spotting resumes shortly
    Paused,
    /// Microphone permission missing
    WaitingForPermission,
    /// Fetching credentials or joining the room
    Connecting,
    InSession,
    Stopped,
}

impl ServiceStatus {
    pub fn description(&self) -> &'static str {
        match self {
            ServiceStatus::Listening => "Listening for wake word",
            ServiceStatus::Paused => "Resuming shortly",
            ServiceStatus::WaitingForPermission => "Waiting for microphone permission",
            ServiceStatus::Connecting => "Connecting to assistant",
            ServiceStatus::InSession => "Assistant active",
            ServiceStatus::Stopped => "Stopped",
        }
    }
}

/// Delivers notices and status changes to the user
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);

    fn set_status(&self, status: ServiceStatus);
}

/// Platform permission grants, read each time they matter since the user
/// may revoke them at any moment
pub trait Permissions: Send + Sync {
    fn microphone_granted(&self) -> bool;

    fn overlay_granted(&self) -> bool;
}

/// Notifier that only writes to the log
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Info => tracing::info!("Notice: {}", notice.message),
            NoticeLevel::Warning => tracing::warn!("Notice: {}", notice.message),
            NoticeLevel::Error => tracing::error!("Notice: {}", notice.message),
        }
    }

    fn set_status(&self, status: ServiceStatus) {
        tracing::info!("Status: {}", status.description());
    }
}

/// Permissions for hosts without a grant model, such as desktops
#[derive(Debug, Default)]
pub struct AlwaysGranted;

impl Permissions for AlwaysGranted {
    fn microphone_granted(&self) -> bool {
        true
    }

    fn overlay_granted(&self) -> bool {
        true
    }
}
