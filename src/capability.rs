//! Capabilities requested by the hosted page.
//!
//! Web views hand us opaque resource identifiers. On Android these look like
//! `android.webkit.resource.AUDIO_CAPTURE`; other engines report bare names
//! such as `microphone`. They are classified once into [`Capability`] so the
//! bridge never matches on strings.

use std::fmt;

const ANDROID_RESOURCE_PREFIX: &str = "android.webkit.resource.";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Capability {
    AudioCapture,
    VideoCapture,
    ProtectedMediaId,
    MidiSysex,
    Other(String),
}

impl Capability {
    /// Classify a single resource identifier
    pub fn classify(resource: &str) -> Self {
        let name = resource
            .strip_prefix(ANDROID_RESOURCE_PREFIX)
            .unwrap_or(resource)
            .to_ascii_uppercase();

        match name.as_str() {
            "AUDIO_CAPTURE" | "MICROPHONE" | "AUDIO" => Self::AudioCapture,
            "VIDEO_CAPTURE" | "CAMERA" | "VIDEO" => Self::VideoCapture,
            "PROTECTED_MEDIA_ID" => Self::ProtectedMediaId,
            "MIDI_SYSEX" => Self::MidiSysex,
            _ => Self::Other(resource.to_string()),
        }
    }

    pub fn is_microphone(&self) -> bool {
        matches!(self, Self::AudioCapture)
    }
}

/// Classify every resource in a request
pub fn classify_all<S: AsRef<str>>(resources: &[S]) -> Vec<Capability> {
    resources.iter().map(|r| Capability::classify(r.as_ref())).collect()
}

/// Does any of these capabilities need the microphone?
pub fn needs_microphone(capabilities: &[Capability]) -> bool {
    capabilities.iter().any(Capability::is_microphone)
}

/// Error returned when a request can no longer be resolved
#[derive(Debug)]
pub enum ResolveError {
    /// The page (or the web view) that asked is gone
    Invalidated,
    /// Engine-specific failure
    Platform(String),
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invalidated => write!(f, "Capability request is no longer valid"),
            Self::Platform(msg) => write!(f, "Failed to resolve capability request: {}", msg),
        }
    }
}

impl std::error::Error for ResolveError {}

impl From<ResolveError> for String {
    fn from(err: ResolveError) -> Self {
        err.to_string()
    }
}

/// An in-flight capability request from hosted content.
///
/// `grant` and `deny` take the box by value, so a request resolves at most
/// once.
pub trait CapabilityRequest: Send {
    /// Raw resource identifiers as reported by the web view
    fn resources(&self) -> &[String];

    /// Grant every requested resource
    fn grant(self: Box<Self>) -> Result<(), ResolveError>;

    fn deny(self: Box<Self>) -> Result<(), ResolveError>;
}

/// Request answered over a oneshot channel; the receiving side is the page's
/// pending command call.
pub struct PageRequest {
    resources: Vec<String>,
    reply: tokio::sync::oneshot::Sender<bool>,
}

impl PageRequest {
    pub fn new(resources: Vec<String>) -> (Self, tokio::sync::oneshot::Receiver<bool>) {
        let (reply, rx) = tokio::sync::oneshot::channel();
        (Self { resources, reply }, rx)
    }

    fn answer(self, granted: bool) -> Result<(), ResolveError> {
        self.reply
            .send(granted)
            .map_err(|_| ResolveError::Invalidated)
    }
}

impl CapabilityRequest for PageRequest {
    fn resources(&self) -> &[String] {
        &self.resources
    }

    fn grant(self: Box<Self>) -> Result<(), ResolveError> {
        self.answer(true)
    }

    fn deny(self: Box<Self>) -> Result<(), ResolveError> {
        self.answer(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_android_identifiers() {
        assert_eq!(
            Capability::classify("android.webkit.resource.AUDIO_CAPTURE"),
            Capability::AudioCapture
        );
        assert_eq!(
            Capability::classify("android.webkit.resource.VIDEO_CAPTURE"),
            Capability::VideoCapture
        );
        assert_eq!(
            Capability::classify("android.webkit.resource.PROTECTED_MEDIA_ID"),
            Capability::ProtectedMediaId
        );
        assert_eq!(
            Capability::classify("android.webkit.resource.MIDI_SYSEX"),
            Capability::MidiSysex
        );
    }

    #[test]
    fn test_classify_plain_names() {
        assert_eq!(Capability::classify("microphone"), Capability::AudioCapture);
        assert_eq!(Capability::classify("camera"), Capability::VideoCapture);
        assert_eq!(
            Capability::classify("geolocation"),
            Capability::Other("geolocation".to_string())
        );
    }

    #[test]
    fn test_needs_microphone() {
        let caps = classify_all(&["camera", "android.webkit.resource.AUDIO_CAPTURE"]);
        assert!(needs_microphone(&caps));

        let caps = classify_all(&["camera"]);
        assert!(!needs_microphone(&caps));
    }

    #[tokio::test]
    async fn test_page_request_grant() {
        let (request, rx) = PageRequest::new(vec!["microphone".to_string()]);
        Box::new(request).grant().unwrap();
        assert!(rx.await.unwrap());
    }

    #[test]
    fn test_page_request_gone() {
        let (request, rx) = PageRequest::new(vec!["microphone".to_string()]);
        drop(rx);
        assert!(matches!(
            Box::new(request).deny(),
            Err(ResolveError::Invalidated)
        ));
    }
}
