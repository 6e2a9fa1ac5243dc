//! Android foreground service start/stop.
//!
//! The service itself lives in the Android project
//! (`gen/android/.../KeepAliveService.kt`); it looks up the notification we
//! posted by id and calls `startForeground` with it.

use jni::objects::{JObject, JString, JValue};
use jni::JNIEnv;

use super::{ForegroundError, ForegroundKeeper};
use crate::platform::{jvm, NotificationContent};

/// Simple name of the service class, inside the app's package
const SERVICE_CLASS: &str = "KeepAliveService";
/// Intent extras: the notification to promote and the channel it lives on
const EXTRA_NOTIFICATION_ID: &str = "notification_id";
const EXTRA_CHANNEL_ID: &str = "channel_id";
/// Android O: `startForegroundService`
const SDK_O: i32 = 26;

pub struct AndroidForeground;

impl AndroidForeground {
    pub fn new() -> Self {
        Self
    }
}

impl Default for AndroidForeground {
    fn default() -> Self {
        Self::new()
    }
}

/// Explicit `Intent` for `<package>.KeepAliveService`
fn service_intent<'local>(
    env: &mut JNIEnv<'local>,
    context: &JObject,
) -> Result<JObject<'local>, String> {
    let package = env.call_method(context, "getPackageName", "()Ljava/lang/String;", &[]);
    let package = JString::from(
        jvm::check(env, package, "getPackageName")?
            .l()
            .map_err(|e| format!("getPackageName result: {}", e))?,
    );
    let package_name: String = env
        .get_string(&package)
        .map_err(|e| format!("package name: {}", e))?
        .into();

    let class_name = env.new_string(format!("{}.{}", package_name, SERVICE_CLASS));
    let class_name = jvm::check(env, class_name, "new_string")?;

    let intent = env.new_object("android/content/Intent", "()V", &[]);
    let intent = jvm::check(env, intent, "new Intent")?;

    let named = env.call_method(
        &intent,
        "setClassName",
        "(Ljava/lang/String;Ljava/lang/String;)Landroid/content/Intent;",
        &[JValue::Object(&package), JValue::Object(&class_name)],
    );
    jvm::check(env, named, "Intent.setClassName")?;

    Ok(intent)
}

fn start_service(env: &mut JNIEnv, content: &NotificationContent) -> Result<(), String> {
    let context = jvm::activity();
    let sdk = jvm::sdk_int(env)?;
    let intent = service_intent(env, &context)?;

    let key = env.new_string(EXTRA_NOTIFICATION_ID);
    let key = jvm::check(env, key, "new_string")?;
    let extra = env.call_method(
        &intent,
        "putExtra",
        "(Ljava/lang/String;I)Landroid/content/Intent;",
        &[JValue::Object(&key), JValue::Int(content.id)],
    );
    jvm::check(env, extra, "Intent.putExtra")?;

    let key = env.new_string(EXTRA_CHANNEL_ID);
    let key = jvm::check(env, key, "new_string")?;
    let channel = env.new_string(&content.channel_id);
    let channel = jvm::check(env, channel, "new_string")?;
    let extra = env.call_method(
        &intent,
        "putExtra",
        "(Ljava/lang/String;Ljava/lang/String;)Landroid/content/Intent;",
        &[JValue::Object(&key), JValue::Object(&channel)],
    );
    jvm::check(env, extra, "Intent.putExtra")?;

    let method = if sdk >= SDK_O {
        "startForegroundService"
    } else {
        "startService"
    };
    let started = env.call_method(
        &context,
        method,
        "(Landroid/content/Intent;)Landroid/content/ComponentName;",
        &[JValue::Object(&intent)],
    );
    let component = jvm::check(env, started, method)?
        .l()
        .map_err(|e| format!("{} result: {}", method, e))?;

    if component.is_null() {
        return Err(format!("{} is not declared in the manifest", SERVICE_CLASS));
    }
    Ok(())
}

fn stop_service(env: &mut JNIEnv) -> Result<(), String> {
    let context = jvm::activity();
    let intent = service_intent(env, &context)?;

    let stopped = env.call_method(
        &context,
        "stopService",
        "(Landroid/content/Intent;)Z",
        &[JValue::Object(&intent)],
    );
    jvm::check(env, stopped, "stopService")?;
    Ok(())
}

impl ForegroundKeeper for AndroidForeground {
    fn enter(&self, content: &NotificationContent) -> Result<(), ForegroundError> {
        let mut env = jvm::env().map_err(ForegroundError::Start)?;
        jvm::with_frame(&mut env, |env| start_service(env, content))
            .and_then(|started| started)
            .map_err(ForegroundError::Start)?;
        tracing::info!("Foreground service started");
        Ok(())
    }

    fn leave(&self) -> Result<(), ForegroundError> {
        let mut env = jvm::env().map_err(ForegroundError::Stop)?;
        jvm::with_frame(&mut env, stop_service)
            .and_then(|stopped| stopped)
            .map_err(ForegroundError::Stop)
    }
}
