//! CPU-only wake lock.
//!
//! Platform implementations:
//! - Desktop: no-op lock (desktop hosts do not suspend a running capture)
//! - Android: `PowerManager.PARTIAL_WAKE_LOCK`, acquired without a timeout

use std::fmt;

#[derive(Debug)]
pub enum PowerError {
    /// Could not obtain or acquire the lock
    Acquire(String),
    Release(String),
}

impl fmt::Display for PowerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Acquire(msg) => write!(f, "Failed to acquire wake lock: {}", msg),
            Self::Release(msg) => write!(f, "Failed to release wake lock: {}", msg),
        }
    }
}

impl std::error::Error for PowerError {}

impl From<PowerError> for String {
    fn from(err: PowerError) -> Self {
        err.to_string()
    }
}

pub trait PowerManager: Send + Sync {
    /// Acquire a non-expiring partial wake lock
    fn acquire_partial(&self, tag: &str) -> Result<Box<dyn HeldWakeLock>, PowerError>;
}

/// A held wake lock; releasing consumes it
pub trait HeldWakeLock: Send {
    fn release(self: Box<Self>) -> Result<(), PowerError>;
}

#[cfg(not(target_os = "android"))]
mod desktop;

#[cfg(not(target_os = "android"))]
pub use desktop::DesktopPower as PlatformPower;

#[cfg(target_os = "android")]
mod android;

#[cfg(target_os = "android")]
pub use android::AndroidPower as PlatformPower;
