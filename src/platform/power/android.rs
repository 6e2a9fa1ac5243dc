//! Android partial wake lock via `PowerManager`.

use jni::objects::{GlobalRef, JValue};
use jni::JNIEnv;

use super::{HeldWakeLock, PowerError, PowerManager};
use crate::platform::jvm;

/// `PowerManager.PARTIAL_WAKE_LOCK`
const PARTIAL_WAKE_LOCK: i32 = 1;

pub struct AndroidPower;

impl AndroidPower {
    pub fn new() -> Self {
        Self
    }
}

fn new_wake_lock(env: &mut JNIEnv, tag: &str) -> Result<GlobalRef, String> {
    let activity = jvm::activity();

    let power_manager = jvm::system_service(env, &activity, "power")?;

    let tag = env.new_string(tag);
    let tag = jvm::check(env, tag, "new_string")?;

    let wake_lock = env.call_method(
        &power_manager,
        "newWakeLock",
        "(ILjava/lang/String;)Landroid/os/PowerManager$WakeLock;",
        &[JValue::Int(PARTIAL_WAKE_LOCK), JValue::Object(&tag)],
    );
    let wake_lock = jvm::check(env, wake_lock, "newWakeLock")?
        .l()
        .map_err(|e| format!("newWakeLock result: {}", e))?;

    // One acquire, one release
    let counted = env.call_method(&wake_lock, "setReferenceCounted", "(Z)V", &[JValue::Bool(0)]);
    jvm::check(env, counted, "setReferenceCounted")?;

    let acquired = env.call_method(&wake_lock, "acquire", "()V", &[]);
    jvm::check(env, acquired, "WakeLock.acquire")?;

    env.new_global_ref(wake_lock)
        .map_err(|e| format!("new_global_ref: {}", e))
}

impl Default for AndroidPower {
    fn default() -> Self {
        Self::new()
    }
}

impl PowerManager for AndroidPower {
    fn acquire_partial(&self, tag: &str) -> Result<Box<dyn HeldWakeLock>, PowerError> {
        let mut env = jvm::env().map_err(PowerError::Acquire)?;
        let wake_lock = jvm::with_frame(&mut env, |env| new_wake_lock(env, tag))
            .and_then(|acquired| acquired)
            .map_err(PowerError::Acquire)?;
        tracing::info!("Partial wake lock '{}' acquired", tag);
        Ok(Box::new(AndroidWakeLock { wake_lock }))
    }
}

struct AndroidWakeLock {
    wake_lock: GlobalRef,
}

impl HeldWakeLock for AndroidWakeLock {
    fn release(self: Box<Self>) -> Result<(), PowerError> {
        let mut env = jvm::env().map_err(PowerError::Release)?;

        let held = env.call_method(&self.wake_lock, "isHeld", "()Z", &[]);
        let held = jvm::check(&mut env, held, "WakeLock.isHeld")
            .map_err(PowerError::Release)?
            .z()
            .map_err(|e| PowerError::Release(format!("isHeld result: {}", e)))?;

        if held {
            let released = env.call_method(&self.wake_lock, "release", "()V", &[]);
            jvm::check(&mut env, released, "WakeLock.release").map_err(PowerError::Release)?;
            tracing::info!("Partial wake lock released");
        }
        Ok(())
    }
}
