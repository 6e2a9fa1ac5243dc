//! Shell configuration.
//!
//! Every field has a default, so a partial JSON file (or none at all) is
//! enough. The file is looked up through the `WEBSHELL_CONFIG` environment
//! variable.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Environment variable naming an optional JSON config file
pub const CONFIG_ENV_VAR: &str = "WEBSHELL_CONFIG";

/// Capture sample rate in Hz
pub const CAPTURE_SAMPLE_RATE: u32 = 44_100;

/// Mono input
pub const CAPTURE_CHANNELS: u16 = 1;

/// Bytes per PCM16 sample
pub const BYTES_PER_SAMPLE: usize = 2;

#[derive(Debug)]
pub enum ConfigError {
    Io(String),
    Parse(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(msg) => write!(f, "Failed to read config: {}", msg),
            Self::Parse(msg) => write!(f, "Invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for String {
    fn from(err: ConfigError) -> Self {
        err.to_string()
    }
}

/// Fixed PCM format the keep-alive worker opens the microphone with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl CaptureFormat {
    /// Buffer size used when the platform cannot report a minimum:
    /// one second of audio in bytes.
    pub fn fallback_buffer_bytes(&self) -> usize {
        self.sample_rate as usize * self.channels as usize * BYTES_PER_SAMPLE
    }
}

impl Default for CaptureFormat {
    fn default() -> Self {
        Self {
            sample_rate: CAPTURE_SAMPLE_RATE,
            channels: CAPTURE_CHANNELS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShellConfig {
    /// Bundled page loaded as the content root
    #[serde(default = "default_content_root")]
    pub content_root: String,
    #[serde(default = "default_notification_title")]
    pub notification_title: String,
    #[serde(default = "default_notification_body")]
    pub notification_body: String,
    /// Notification channel id (Android)
    #[serde(default = "default_channel_id")]
    pub channel_id: String,
    /// User-visible channel name (Android)
    #[serde(default = "default_channel_name")]
    pub channel_name: String,
    #[serde(default = "default_notification_id")]
    pub notification_id: i32,
    #[serde(default = "default_wake_lock_tag")]
    pub wake_lock_tag: String,
    /// Grant non-microphone capabilities without any check.
    /// Hosted content is trusted; turn off for anything loaded remotely.
    #[serde(default = "default_grant_non_audio")]
    pub grant_non_audio: bool,
    #[serde(default)]
    pub capture: CaptureFormat,
    /// How long `stop()` waits for the capture loop, in milliseconds
    #[serde(default = "default_stop_grace_ms")]
    pub stop_grace_ms: u64,
}

fn default_content_root() -> String {
    "index.html".to_string()
}

fn default_notification_title() -> String {
    "Web Shell".to_string()
}

fn default_notification_body() -> String {
    "Microphone is running in the background".to_string()
}

fn default_channel_id() -> String {
    "mic_service_channel".to_string()
}

fn default_channel_name() -> String {
    "Microphone background service".to_string()
}

fn default_notification_id() -> i32 {
    1001
}

fn default_wake_lock_tag() -> String {
    "webshell:MicWakeLock".to_string()
}

fn default_grant_non_audio() -> bool {
    true
}

fn default_stop_grace_ms() -> u64 {
    500
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            content_root: default_content_root(),
            notification_title: default_notification_title(),
            notification_body: default_notification_body(),
            channel_id: default_channel_id(),
            channel_name: default_channel_name(),
            notification_id: default_notification_id(),
            wake_lock_tag: default_wake_lock_tag(),
            grant_non_audio: default_grant_non_audio(),
            capture: CaptureFormat::default(),
            stop_grace_ms: default_stop_grace_ms(),
        }
    }
}

impl ShellConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&raw)
    }

    /// Load from `WEBSHELL_CONFIG` if set; any failure falls back to defaults.
    pub fn load() -> Self {
        let Some(path) = std::env::var_os(CONFIG_ENV_VAR) else {
            return Self::default();
        };

        match Self::from_file(Path::new(&path)) {
            Ok(config) => {
                tracing::info!("Loaded shell config from {}", Path::new(&path).display());
                config
            }
            Err(e) => {
                tracing::warn!("{}; using defaults", e);
                Self::default()
            }
        }
    }

    pub fn stop_grace(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.stop_grace_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = ShellConfig::from_json(r#"{"notification_title": "Studio"}"#).unwrap();
        assert_eq!(config.notification_title, "Studio");
        assert_eq!(config.content_root, "index.html");
        assert_eq!(config.capture.sample_rate, 44_100);
        assert_eq!(config.capture.channels, 1);
        assert!(config.grant_non_audio);
        assert_eq!(config.stop_grace_ms, 500);
    }

    #[test]
    fn test_fallback_buffer_is_one_second() {
        let format = CaptureFormat::default();
        assert_eq!(format.fallback_buffer_bytes(), 88_200);
    }

    #[test]
    fn test_invalid_json() {
        let result = ShellConfig::from_json("{not json");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = ShellConfig::from_file(Path::new("/definitely/not/here.json"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
