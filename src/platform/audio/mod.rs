//! Cross-platform microphone input.
//!
//! Platform implementations:
//! - Desktop (macOS/Windows/Linux): CPAL input stream drained through a channel
//! - Android: `android.media.AudioRecord` over JNI
//!
//! Both expose the same blocking read model: open a session at a fixed PCM16
//! format, then pull samples until closed.

use std::fmt;

use crate::config::CaptureFormat;

/// Error type for audio capture operations
#[derive(Debug)]
pub enum AudioCaptureError {
    /// No audio input device available
    NoDevice,
    /// Device configuration error
    Configuration(String),
    /// The device was created but refused to initialize
    NotInitialized,
    /// Stream error during capture
    Stream(String),
    /// Permission denied
    PermissionDenied,
    /// Platform call failed
    Platform(String),
}

impl fmt::Display for AudioCaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoDevice => write!(f, "No audio input device available"),
            Self::Configuration(msg) => write!(f, "Audio configuration error: {}", msg),
            Self::NotInitialized => write!(f, "Audio input failed to initialize"),
            Self::Stream(msg) => write!(f, "Audio stream error: {}", msg),
            Self::PermissionDenied => write!(f, "Microphone permission denied"),
            Self::Platform(msg) => write!(f, "Audio platform error: {}", msg),
        }
    }
}

impl std::error::Error for AudioCaptureError {}

impl From<AudioCaptureError> for String {
    fn from(err: AudioCaptureError) -> Self {
        err.to_string()
    }
}

/// Factory for microphone sessions
pub trait AudioInput: Send + Sync {
    /// Smallest buffer the platform accepts for this format, in bytes.
    /// `None` when the platform cannot tell.
    fn min_buffer_bytes(&self, format: &CaptureFormat) -> Option<usize>;

    /// Open the default microphone.
    ///
    /// Called on the thread that will read from the session.
    fn open(
        &self,
        format: &CaptureFormat,
        buffer_bytes: usize,
    ) -> Result<Box<dyn InputSession>, AudioCaptureError>;
}

/// An open microphone. Not `Send`: it stays on the thread that opened it.
pub trait InputSession {
    /// Blocking read of PCM16 samples into `buffer`.
    /// Returns how many samples were written; 0 means nothing was available.
    fn read(&mut self, buffer: &mut [i16]) -> Result<usize, AudioCaptureError>;

    /// Stop and release the device
    fn close(self: Box<Self>) -> Result<(), AudioCaptureError>;
}

/// Buffer size for a session: the platform minimum, or one second of audio
pub fn session_buffer_bytes(input: &dyn AudioInput, format: &CaptureFormat) -> usize {
    match input.min_buffer_bytes(format) {
        Some(bytes) if bytes > 0 => bytes,
        _ => format.fallback_buffer_bytes(),
    }
}

#[cfg(not(target_os = "android"))]
mod desktop;

#[cfg(not(target_os = "android"))]
pub use desktop::DesktopAudioInput as PlatformAudioInput;

#[cfg(target_os = "android")]
mod android;

#[cfg(target_os = "android")]
pub use android::AndroidAudioInput as PlatformAudioInput;
