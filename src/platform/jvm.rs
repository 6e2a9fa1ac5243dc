//! Shared JNI access for the Android backends.
//!
//! The web view runtime registers the `JavaVM` and the hosting Activity with
//! `ndk-context` before our code runs; everything here borrows from it.

use jni::objects::{JObject, JValue};
use jni::{JNIEnv, JavaVM};
use once_cell::sync::OnceCell;

static JAVA_VM: OnceCell<JavaVM> = OnceCell::new();

/// Local references one platform call may create before the frame grows
const LOCAL_FRAME_CAPACITY: i32 = 16;

/// Process-wide `JavaVM`
pub fn vm() -> Result<&'static JavaVM, String> {
    JAVA_VM.get_or_try_init(|| {
        let ctx = ndk_context::android_context();
        // SAFETY: the pointer comes from the runtime that owns the VM for the
        // lifetime of the process.
        unsafe { JavaVM::from_raw(ctx.vm().cast()) }
            .map_err(|e| format!("Failed to get JavaVM: {}", e))
    })
}

/// Attach the current thread for the rest of its life and return its env.
///
/// The capture worker reads from the device in a tight loop, so attaching
/// and detaching per call is not an option.
pub fn env() -> Result<JNIEnv<'static>, String> {
    vm()?
        .attach_current_thread_permanently()
        .map_err(|e| format!("Failed to attach to JVM: {}", e))
}

/// The hosting Activity.
///
/// The returned object borrows a global reference owned by the runtime and
/// must not be deleted.
pub fn activity() -> JObject<'static> {
    let ctx = ndk_context::android_context();
    // SAFETY: `ndk-context` hands out a global reference valid for the process.
    unsafe { JObject::from_raw(ctx.context().cast()) }
}

/// Run `f` inside a fresh local reference frame.
///
/// Threads stay attached for good, so locals created outside a frame are never
/// freed. Anything that must outlive `f` has to be a `GlobalRef`.
pub fn with_frame<T>(env: &mut JNIEnv, f: impl FnOnce(&mut JNIEnv) -> T) -> Result<T, String> {
    env.with_local_frame(LOCAL_FRAME_CAPACITY, |env| Ok::<_, jni::errors::Error>(f(env)))
        .map_err(|e| format!("JNI local frame: {}", e))
}

/// Clear a pending Java exception so later JNI calls keep working
pub fn clear_exception(env: &mut JNIEnv) {
    if env.exception_check().unwrap_or(false) {
        let _ = env.exception_describe();
        let _ = env.exception_clear();
    }
}

/// Map a JNI result to a string error, clearing any thrown exception
pub fn check<T>(env: &mut JNIEnv, result: jni::errors::Result<T>, what: &str) -> Result<T, String> {
    result.map_err(|e| {
        clear_exception(env);
        format!("{} failed: {}", what, e)
    })
}

/// `Build.VERSION.SDK_INT`
pub fn sdk_int(env: &mut JNIEnv) -> Result<i32, String> {
    let value = env.get_static_field("android/os/Build$VERSION", "SDK_INT", "I");
    check(env, value, "Build.VERSION.SDK_INT")?
        .i()
        .map_err(|e| format!("SDK_INT result: {}", e))
}

/// `Context.getSystemService(name)`
pub fn system_service<'local>(
    env: &mut JNIEnv<'local>,
    context: &JObject,
    name: &str,
) -> Result<JObject<'local>, String> {
    let name_str = env.new_string(name);
    let name_str = check(env, name_str, "new_string")?;
    let service = env.call_method(
        context,
        "getSystemService",
        "(Ljava/lang/String;)Ljava/lang/Object;",
        &[JValue::Object(&name_str)],
    );
    let service = check(env, service, "getSystemService")?
        .l()
        .map_err(|e| format!("getSystemService result: {}", e))?;

    if service.is_null() {
        return Err(format!("System service '{}' unavailable", name));
    }
    Ok(service)
}
