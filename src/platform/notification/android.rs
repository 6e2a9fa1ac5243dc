//! Android keep-alive notification via `NotificationManager`.

use jni::objects::{JObject, JValue};
use jni::JNIEnv;

use super::{KeepAliveNotifier, NotificationContent, NotificationError};
use crate::platform::jvm;

/// `NotificationManager.IMPORTANCE_LOW`
const IMPORTANCE_LOW: i32 = 2;
/// `Notification.PRIORITY_LOW`
const PRIORITY_LOW: i32 = -1;
/// `PendingIntent.FLAG_IMMUTABLE`
const FLAG_IMMUTABLE: i32 = 0x0400_0000;
/// Android O: notification channels
const SDK_O: i32 = 26;
/// Android M: `FLAG_IMMUTABLE`
const SDK_M: i32 = 23;

const BUILDER: &str = "android/app/Notification$Builder";
const BUILDER_SIG: &str = "Landroid/app/Notification$Builder;";

pub struct AndroidNotifier;

impl AndroidNotifier {
    pub fn new() -> Self {
        Self
    }
}

impl Default for AndroidNotifier {
    fn default() -> Self {
        Self::new()
    }
}

fn create_channel(
    env: &mut JNIEnv,
    manager: &JObject,
    content: &NotificationContent,
) -> Result<(), String> {
    let id = env.new_string(&content.channel_id);
    let id = jvm::check(env, id, "new_string")?;
    let name = env.new_string(&content.channel_name);
    let name = jvm::check(env, name, "new_string")?;

    let channel = env.new_object(
        "android/app/NotificationChannel",
        "(Ljava/lang/String;Ljava/lang/CharSequence;I)V",
        &[
            JValue::Object(&id),
            JValue::Object(&name),
            JValue::Int(IMPORTANCE_LOW),
        ],
    );
    let channel = jvm::check(env, channel, "new NotificationChannel")?;

    // Silent channel
    let silenced = env.call_method(
        &channel,
        "setSound",
        "(Landroid/net/Uri;Landroid/media/AudioAttributes;)V",
        &[JValue::Object(&JObject::null()), JValue::Object(&JObject::null())],
    );
    jvm::check(env, silenced, "NotificationChannel.setSound")?;

    let created = env.call_method(
        manager,
        "createNotificationChannel",
        "(Landroid/app/NotificationChannel;)V",
        &[JValue::Object(&channel)],
    );
    jvm::check(env, created, "createNotificationChannel")?;
    Ok(())
}

/// `PendingIntent` that brings the app's launch activity back to front
fn launch_intent<'local>(
    env: &mut JNIEnv<'local>,
    context: &JObject,
    sdk: i32,
) -> Result<JObject<'local>, String> {
    let package_manager = env.call_method(
        context,
        "getPackageManager",
        "()Landroid/content/pm/PackageManager;",
        &[],
    );
    let package_manager = jvm::check(env, package_manager, "getPackageManager")?
        .l()
        .map_err(|e| format!("getPackageManager result: {}", e))?;

    let package = env.call_method(context, "getPackageName", "()Ljava/lang/String;", &[]);
    let package = jvm::check(env, package, "getPackageName")?
        .l()
        .map_err(|e| format!("getPackageName result: {}", e))?;

    let intent = env.call_method(
        &package_manager,
        "getLaunchIntentForPackage",
        "(Ljava/lang/String;)Landroid/content/Intent;",
        &[JValue::Object(&package)],
    );
    let intent = jvm::check(env, intent, "getLaunchIntentForPackage")?
        .l()
        .map_err(|e| format!("getLaunchIntentForPackage result: {}", e))?;

    if intent.is_null() {
        return Err("No launch intent for this package".to_string());
    }

    let flags = if sdk >= SDK_M { FLAG_IMMUTABLE } else { 0 };
    let pending = env.call_static_method(
        "android/app/PendingIntent",
        "getActivity",
        "(Landroid/content/Context;ILandroid/content/Intent;I)Landroid/app/PendingIntent;",
        &[
            JValue::Object(context),
            JValue::Int(0),
            JValue::Object(&intent),
            JValue::Int(flags),
        ],
    );
    jvm::check(env, pending, "PendingIntent.getActivity")?
        .l()
        .map_err(|e| format!("getActivity result: {}", e))
}

fn build_notification<'local>(
    env: &mut JNIEnv<'local>,
    context: &JObject,
    content: &NotificationContent,
    sdk: i32,
) -> Result<JObject<'local>, String> {
    let builder = if sdk >= SDK_O {
        let channel_id = env.new_string(&content.channel_id);
        let channel_id = jvm::check(env, channel_id, "new_string")?;
        env.new_object(
            BUILDER,
            "(Landroid/content/Context;Ljava/lang/String;)V",
            &[JValue::Object(context), JValue::Object(&channel_id)],
        )
    } else {
        env.new_object(BUILDER, "(Landroid/content/Context;)V", &[JValue::Object(context)])
    };
    let builder = jvm::check(env, builder, "new Notification.Builder")?;

    let title = env.new_string(&content.title);
    let title = jvm::check(env, title, "new_string")?;
    let body = env.new_string(&content.body);
    let body = jvm::check(env, body, "new_string")?;

    let icon = env.get_static_field("android/R$drawable", "ic_btn_speak_now", "I");
    let icon = jvm::check(env, icon, "R.drawable.ic_btn_speak_now")?
        .i()
        .map_err(|e| format!("icon result: {}", e))?;

    let chained = [
        ("setContentTitle", "(Ljava/lang/CharSequence;)", JValue::Object(&title)),
        ("setContentText", "(Ljava/lang/CharSequence;)", JValue::Object(&body)),
        ("setSmallIcon", "(I)", JValue::Int(icon)),
        ("setOngoing", "(Z)", JValue::Bool(1)),
        ("setPriority", "(I)", JValue::Int(PRIORITY_LOW)),
    ];
    for (method, args, value) in chained {
        let sig = format!("{}{}", args, BUILDER_SIG);
        let result = env.call_method(&builder, method, &sig, &[value]);
        jvm::check(env, result, method)?;
    }

    match launch_intent(env, context, sdk) {
        Ok(pending) => {
            let sig = format!("(Landroid/app/PendingIntent;){}", BUILDER_SIG);
            let result = env.call_method(&builder, "setContentIntent", &sig, &[JValue::Object(&pending)]);
            jvm::check(env, result, "setContentIntent")?;
        }
        Err(e) => tracing::warn!("Notification will not reopen the app: {}", e),
    }

    let notification = env.call_method(&builder, "build", "()Landroid/app/Notification;", &[]);
    jvm::check(env, notification, "Notification.Builder.build")?
        .l()
        .map_err(|e| format!("build result: {}", e))
}

fn show_notification(env: &mut JNIEnv, content: &NotificationContent) -> Result<(), String> {
    let context = jvm::activity();
    let sdk = jvm::sdk_int(env)?;

    let manager = jvm::system_service(env, &context, "notification")?;

    if sdk >= SDK_O {
        create_channel(env, &manager, content)?;
    }

    let notification = build_notification(env, &context, content, sdk)?;

    let posted = env.call_method(
        &manager,
        "notify",
        "(ILandroid/app/Notification;)V",
        &[JValue::Int(content.id), JValue::Object(&notification)],
    );
    jvm::check(env, posted, "NotificationManager.notify")?;
    Ok(())
}

fn cancel_notification(env: &mut JNIEnv, content: &NotificationContent) -> Result<(), String> {
    let context = jvm::activity();
    let manager = jvm::system_service(env, &context, "notification")?;

    let cancelled = env.call_method(&manager, "cancel", "(I)V", &[JValue::Int(content.id)]);
    jvm::check(env, cancelled, "NotificationManager.cancel")?;
    Ok(())
}

impl KeepAliveNotifier for AndroidNotifier {
    fn show(&self, content: &NotificationContent) -> Result<(), NotificationError> {
        let mut env = jvm::env().map_err(NotificationError::Platform)?;
        jvm::with_frame(&mut env, |env| show_notification(env, content))
            .and_then(|shown| shown)
            .map_err(NotificationError::Platform)
    }

    fn cancel(&self, content: &NotificationContent) -> Result<(), NotificationError> {
        let mut env = jvm::env().map_err(NotificationError::Platform)?;
        jvm::with_frame(&mut env, |env| cancel_notification(env, content))
            .and_then(|cancelled| cancelled)
            .map_err(NotificationError::Platform)
    }
}
