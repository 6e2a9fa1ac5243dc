//! Android `RECORD_AUDIO` permission over JNI.
//!
//! `requestPermissions` answers through `Activity.onRequestPermissionsResult`,
//! which Rust cannot override. `MainActivity` in `gen/android` forwards the
//! result to the exported `onRecordAudioPermissionResult` native method (see
//! `commands`).

use jni::objects::{JObject, JValue};
use jni::JNIEnv;

use super::{PermissionError, SystemPermissions};
use crate::platform::jvm;

const RECORD_AUDIO: &str = "android.permission.RECORD_AUDIO";

/// `PackageManager.PERMISSION_GRANTED`
const PERMISSION_GRANTED: i32 = 0;

/// Request code echoed back in `onRequestPermissionsResult`
pub const RECORD_AUDIO_REQUEST_CODE: i32 = 1001;

pub struct AndroidPermissions;

impl AndroidPermissions {
    pub fn new() -> Self {
        Self
    }

    fn check_self_permission(&self) -> Result<bool, String> {
        let mut env = jvm::env()?;
        jvm::with_frame(&mut env, check_record_audio)?
    }

    fn launch_prompt(&self) -> Result<(), String> {
        let mut env = jvm::env()?;
        jvm::with_frame(&mut env, request_record_audio)?
    }
}

fn check_record_audio(env: &mut JNIEnv) -> Result<bool, String> {
    let activity = jvm::activity();

    let permission = env.new_string(RECORD_AUDIO);
    let permission = jvm::check(env, permission, "new_string")?;

    let status = env.call_method(
        &activity,
        "checkSelfPermission",
        "(Ljava/lang/String;)I",
        &[JValue::Object(&permission)],
    );
    let status = jvm::check(env, status, "checkSelfPermission")?
        .i()
        .map_err(|e| format!("checkSelfPermission result: {}", e))?;

    Ok(status == PERMISSION_GRANTED)
}

fn request_record_audio(env: &mut JNIEnv) -> Result<(), String> {
    let activity = jvm::activity();

    let permission = env.new_string(RECORD_AUDIO);
    let permission = jvm::check(env, permission, "new_string")?;

    let permissions = env.new_object_array(1, "java/lang/String", JObject::null());
    let permissions = jvm::check(env, permissions, "new_object_array")?;

    let stored = env.set_object_array_element(&permissions, 0, &permission);
    jvm::check(env, stored, "set_object_array_element")?;

    let requested = env.call_method(
        &activity,
        "requestPermissions",
        "([Ljava/lang/String;I)V",
        &[
            JValue::Object(&permissions),
            JValue::Int(RECORD_AUDIO_REQUEST_CODE),
        ],
    );
    jvm::check(env, requested, "requestPermissions")?;

    Ok(())
}

impl Default for AndroidPermissions {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemPermissions for AndroidPermissions {
    fn microphone_granted(&self) -> bool {
        match self.check_self_permission() {
            Ok(granted) => granted,
            Err(e) => {
                tracing::warn!("Could not check RECORD_AUDIO: {}", e);
                false
            }
        }
    }

    fn request_microphone(&self) -> Result<(), PermissionError> {
        tracing::info!("Requesting RECORD_AUDIO from the system");
        self.launch_prompt().map_err(PermissionError::PromptFailed)
    }
}
