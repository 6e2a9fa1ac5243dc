//! Ongoing notification shown while the keep-alive worker runs.
//!
//! Platform implementations:
//! - Desktop: notify-rust
//! - Android: `NotificationManager` with a low-importance, silent channel;
//!   tapping the notification reopens the app

use std::fmt;

use crate::config::ShellConfig;

#[derive(Debug)]
pub enum NotificationError {
    Platform(String),
}

impl fmt::Display for NotificationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Platform(msg) => write!(f, "Notification error: {}", msg),
        }
    }
}

impl std::error::Error for NotificationError {}

impl From<NotificationError> for String {
    fn from(err: NotificationError) -> Self {
        err.to_string()
    }
}

/// What the keep-alive notification says and where it is filed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationContent {
    pub id: i32,
    pub channel_id: String,
    pub channel_name: String,
    pub title: String,
    pub body: String,
}

impl From<&ShellConfig> for NotificationContent {
    fn from(config: &ShellConfig) -> Self {
        Self {
            id: config.notification_id,
            channel_id: config.channel_id.clone(),
            channel_name: config.channel_name.clone(),
            title: config.notification_title.clone(),
            body: config.notification_body.clone(),
        }
    }
}

pub trait KeepAliveNotifier: Send + Sync {
    fn show(&self, content: &NotificationContent) -> Result<(), NotificationError>;

    fn cancel(&self, content: &NotificationContent) -> Result<(), NotificationError>;
}

#[cfg(not(target_os = "android"))]
mod desktop;

#[cfg(not(target_os = "android"))]
pub use desktop::DesktopNotifier as PlatformNotifier;

#[cfg(target_os = "android")]
mod android;

#[cfg(target_os = "android")]
pub use android::AndroidNotifier as PlatformNotifier;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_from_config() {
        let config = ShellConfig::default();
        let content = NotificationContent::from(&config);
        assert_eq!(content.id, 1001);
        assert_eq!(content.channel_id, "mic_service_channel");
        assert_eq!(content.title, config.notification_title);
    }
}
