//! Platform abstraction layer.
//!
//! Each seam is a trait with a desktop and an Android implementation:
//! - Audio: microphone input (CPAL on desktop, `AudioRecord` on Android)
//! - Permission: runtime microphone permission
//! - Power: CPU-only wake lock
//! - Notification: ongoing keep-alive notification
//! - Foreground: keeps the process alive while capturing (Android service)

pub mod audio;
pub mod foreground;
pub mod notification;
pub mod permission;
pub mod power;

#[cfg(target_os = "android")]
pub mod jvm;

#[cfg(target_os = "ios")]
compile_error!("Unsupported platform: webshell targets Android and desktop");

use std::sync::Arc;

pub use audio::{AudioCaptureError, AudioInput, InputSession, PlatformAudioInput};
pub use foreground::{ForegroundError, ForegroundKeeper, PlatformForeground};
pub use notification::{KeepAliveNotifier, NotificationContent, NotificationError, PlatformNotifier};
pub use permission::{PermissionError, PlatformPermissions, SystemPermissions};
pub use power::{HeldWakeLock, PlatformPower, PowerError, PowerManager};

/// The platform services the keep-alive worker drives
#[derive(Clone)]
pub struct Platform {
    pub audio: Arc<dyn AudioInput>,
    pub power: Arc<dyn PowerManager>,
    pub notifier: Arc<dyn KeepAliveNotifier>,
    pub foreground: Arc<dyn ForegroundKeeper>,
}

impl Platform {
    /// Native implementations for the current target
    pub fn native() -> Self {
        Self {
            audio: Arc::new(PlatformAudioInput::new()),
            power: Arc::new(PlatformPower::new()),
            notifier: Arc::new(PlatformNotifier::new()),
            foreground: Arc::new(PlatformForeground::new()),
        }
    }
}
