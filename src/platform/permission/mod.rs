//! Runtime microphone permission.
//!
//! Platform implementations:
//! - Desktop: no runtime gate; the microphone always counts as granted
//! - Android: `RECORD_AUDIO` via `checkSelfPermission` / `requestPermissions`
//!
//! Requesting only launches the system prompt. The answer arrives later and
//! is fed to the bridge as a separate event.

use std::fmt;

#[derive(Debug)]
pub enum PermissionError {
    /// The prompt could not be shown
    PromptFailed(String),
    /// The platform has no such permission
    NotSupported,
}

impl fmt::Display for PermissionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PromptFailed(msg) => write!(f, "Failed to show permission prompt: {}", msg),
            Self::NotSupported => write!(f, "Permission not supported on this platform"),
        }
    }
}

impl std::error::Error for PermissionError {}

impl From<PermissionError> for String {
    fn from(err: PermissionError) -> Self {
        err.to_string()
    }
}

/// The host process's own system-level permissions
pub trait SystemPermissions: Send + Sync {
    /// Is the microphone permission already held?
    fn microphone_granted(&self) -> bool;

    /// Launch the interactive prompt for the microphone permission
    fn request_microphone(&self) -> Result<(), PermissionError>;
}

#[cfg(not(target_os = "android"))]
mod desktop;

#[cfg(not(target_os = "android"))]
pub use desktop::DesktopPermissions as PlatformPermissions;

#[cfg(target_os = "android")]
mod android;

#[cfg(target_os = "android")]
pub use android::AndroidPermissions as PlatformPermissions;
