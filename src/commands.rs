//! Tauri commands for the hosted page, plus the Android hook that delivers
//! the system permission prompt's answer.

use std::sync::Arc;

use tauri::State;

use crate::bridge::BridgeHandle;
use crate::capability::PageRequest;
use crate::service::KeepAliveService;

/// Ask for capabilities (e.g. `["microphone"]`) before calling
/// `getUserMedia`. Resolves once the bridge grants or denies.
#[tauri::command]
pub async fn request_capability(
    bridge: State<'_, BridgeHandle>,
    resources: Vec<String>,
) -> Result<bool, String> {
    let (request, answer) = PageRequest::new(resources);

    {
        let mut bridge = bridge.lock().await;
        let decision = bridge.on_capability_request(Box::new(request));
        tracing::debug!("request_capability -> {:?}", decision);
    }

    answer
        .await
        .map_err(|_| "Capability request was abandoned".to_string())
}

/// Is the keep-alive capture running?
#[tauri::command]
pub async fn capture_status(service: State<'_, Arc<KeepAliveService>>) -> Result<bool, String> {
    let service = service.inner().clone();
    tauri::async_runtime::spawn_blocking(move || service.is_capturing())
        .await
        .map_err(|e| format!("capture_status: {}", e))
}

/// Stop the keep-alive capture. The reader gets the grace period off the
/// main thread.
#[tauri::command]
pub async fn stop_capture(service: State<'_, Arc<KeepAliveService>>) -> Result<(), String> {
    let service = service.inner().clone();
    tauri::async_runtime::spawn_blocking(move || service.stop())
        .await
        .map_err(|e| format!("stop_capture: {}", e))
}

/// Called by `MainActivity.onRequestPermissionsResult` (`gen/android`)
#[cfg(target_os = "android")]
#[no_mangle]
#[allow(non_snake_case)]
pub extern "system" fn Java_com_example_webshell_MainActivity_onRecordAudioPermissionResult(
    _env: jni::JNIEnv,
    _this: jni::objects::JObject,
    granted: jni::sys::jboolean,
) {
    let granted = granted != 0;
    tauri::async_runtime::spawn(async move {
        match crate::bridge::deliver_system_decision(granted).await {
            Some(decision) => tracing::info!("System permission result -> {:?}", decision),
            None => tracing::warn!("Permission result arrived before the bridge was ready"),
        }
    });
}
