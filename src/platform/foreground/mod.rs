//! Foreground status for the process while the keep-alive worker runs.
//!
//! Platform implementations:
//! - Desktop: no-op (desktop processes are not reclaimed in the background)
//! - Android: starts the app's `KeepAliveService`, which promotes the posted
//!   keep-alive notification with `startForeground` and restarts sticky

use std::fmt;

use super::NotificationContent;

#[derive(Debug)]
pub enum ForegroundError {
    Start(String),
    Stop(String),
}

impl fmt::Display for ForegroundError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start(msg) => write!(f, "Failed to start foreground service: {}", msg),
            Self::Stop(msg) => write!(f, "Failed to stop foreground service: {}", msg),
        }
    }
}

impl std::error::Error for ForegroundError {}

impl From<ForegroundError> for String {
    fn from(err: ForegroundError) -> Self {
        err.to_string()
    }
}

pub trait ForegroundKeeper: Send + Sync {
    /// Run in the foreground under the already-posted notification `content`
    fn enter(&self, content: &NotificationContent) -> Result<(), ForegroundError>;

    fn leave(&self) -> Result<(), ForegroundError>;
}

#[cfg(not(target_os = "android"))]
mod desktop;

#[cfg(not(target_os = "android"))]
pub use desktop::DesktopForeground as PlatformForeground;

#[cfg(target_os = "android")]
mod android;

#[cfg(target_os = "android")]
pub use android::AndroidForeground as PlatformForeground;
