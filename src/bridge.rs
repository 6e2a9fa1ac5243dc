//! Permission bridge between the hosted page and the OS.
//!
//! The page asks for capabilities; anything that needs the microphone is
//! checked against the host's own `RECORD_AUDIO` permission. When that is
//! missing the request is parked, the system prompt is shown, and the parked
//! request is answered once the prompt's result comes back.
//!
//! All transitions run under one lock, so there is exactly one pending slot
//! and no interleaving between a request and a decision.

use std::sync::Arc;

use once_cell::sync::OnceCell;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::capability::{classify_all, needs_microphone, Capability, CapabilityRequest};
use crate::platform::SystemPermissions;
use crate::service::CaptureControl;

/// Shared handle to the bridge
pub type BridgeHandle = Arc<Mutex<PermissionBridge>>;

/// Bridge reachable from platform callbacks that carry no app state
static BRIDGE: OnceCell<BridgeHandle> = OnceCell::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BridgeState {
    Idle,
    AwaitingSystemGrant,
}

/// What the bridge did with an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BridgeDecision {
    /// Granted without touching the microphone
    Granted,
    /// Granted and the keep-alive capture was started
    GrantedAndStarted,
    /// Parked until the system prompt answers
    Deferred,
    Denied,
    /// Decision with nothing pending
    Ignored,
}

struct PendingCapabilityRequest {
    request: Box<dyn CapabilityRequest>,
    capabilities: Vec<Capability>,
}

pub struct PermissionBridge {
    permissions: Arc<dyn SystemPermissions>,
    capture: Arc<dyn CaptureControl>,
    grant_non_audio: bool,
    pending: Option<PendingCapabilityRequest>,
}

impl PermissionBridge {
    pub fn new(
        permissions: Arc<dyn SystemPermissions>,
        capture: Arc<dyn CaptureControl>,
        grant_non_audio: bool,
    ) -> Self {
        Self {
            permissions,
            capture,
            grant_non_audio,
            pending: None,
        }
    }

    pub fn state(&self) -> BridgeState {
        if self.pending.is_some() {
            BridgeState::AwaitingSystemGrant
        } else {
            BridgeState::Idle
        }
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Handle a capability request from the hosted page
    pub fn on_capability_request(&mut self, request: Box<dyn CapabilityRequest>) -> BridgeDecision {
        let capabilities = classify_all(request.resources());
        tracing::debug!("Capability request: {:?}", capabilities);

        if !needs_microphone(&capabilities) {
            if self.grant_non_audio {
                grant(request);
                return BridgeDecision::Granted;
            }
            tracing::info!("Non-audio capabilities {:?} denied by policy", capabilities);
            deny(request);
            return BridgeDecision::Denied;
        }

        if self.permissions.microphone_granted() {
            grant(request);
            self.capture.start_capture();
            return BridgeDecision::GrantedAndStarted;
        }

        if self.pending.is_some() {
            tracing::warn!("Microphone request while another awaits the system prompt; denying");
            deny(request);
            return BridgeDecision::Denied;
        }

        if let Err(e) = self.permissions.request_microphone() {
            tracing::warn!("{}", e);
            deny(request);
            return BridgeDecision::Denied;
        }

        tracing::info!("Awaiting system microphone permission");
        self.pending = Some(PendingCapabilityRequest {
            request,
            capabilities,
        });
        BridgeDecision::Deferred
    }

    /// Handle the system prompt's answer
    pub fn on_system_decision(&mut self, granted: bool) -> BridgeDecision {
        let Some(pending) = self.pending.take() else {
            tracing::debug!("System decision with no pending request");
            return BridgeDecision::Ignored;
        };

        if granted {
            tracing::info!("Microphone granted; resolving {:?}", pending.capabilities);
            grant(pending.request);
            self.capture.start_capture();
            BridgeDecision::GrantedAndStarted
        } else {
            tracing::info!("Microphone denied by the user");
            deny(pending.request);
            BridgeDecision::Denied
        }
    }

    /// The hosting view is going away: deny whatever is parked
    pub fn abandon(&mut self) {
        if let Some(pending) = self.pending.take() {
            tracing::info!("Abandoning pending capability request");
            deny(pending.request);
        }
    }
}

impl Drop for PermissionBridge {
    fn drop(&mut self) {
        self.abandon();
    }
}

fn grant(request: Box<dyn CapabilityRequest>) {
    if let Err(e) = request.grant() {
        tracing::warn!("{}", e);
    }
}

fn deny(request: Box<dyn CapabilityRequest>) {
    if let Err(e) = request.deny() {
        tracing::warn!("{}", e);
    }
}

/// Make `bridge` the target of [`deliver_system_decision`]. First call wins.
pub fn register(bridge: BridgeHandle) -> bool {
    BRIDGE.set(bridge).is_ok()
}

/// Feed a system prompt result to the registered bridge
pub async fn deliver_system_decision(granted: bool) -> Option<BridgeDecision> {
    let bridge = BRIDGE.get()?.clone();
    let decision = bridge.lock().await.on_system_decision(granted);
    Some(decision)
}
