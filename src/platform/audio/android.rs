//! Android microphone input via `android.media.AudioRecord`.

use jni::objects::{GlobalRef, JObject, JShortArray, JValue};
use jni::JNIEnv;

use super::{AudioCaptureError, AudioInput, InputSession};
use crate::config::{CaptureFormat, BYTES_PER_SAMPLE};
use crate::platform::jvm;

const AUDIO_RECORD: &str = "android/media/AudioRecord";

/// `MediaRecorder.AudioSource.MIC`
const AUDIO_SOURCE_MIC: i32 = 1;
/// `AudioFormat.CHANNEL_IN_MONO` / `CHANNEL_IN_STEREO`
const CHANNEL_IN_MONO: i32 = 16;
const CHANNEL_IN_STEREO: i32 = 12;
/// `AudioFormat.ENCODING_PCM_16BIT`
const ENCODING_PCM_16BIT: i32 = 2;
/// `AudioRecord.STATE_INITIALIZED`
const STATE_INITIALIZED: i32 = 1;

fn channel_mask(format: &CaptureFormat) -> i32 {
    if format.channels >= 2 {
        CHANNEL_IN_STEREO
    } else {
        CHANNEL_IN_MONO
    }
}

fn platform_err(msg: String) -> AudioCaptureError {
    AudioCaptureError::Platform(msg)
}

pub struct AndroidAudioInput;

impl AndroidAudioInput {
    pub fn new() -> Self {
        Self
    }
}

impl Default for AndroidAudioInput {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioInput for AndroidAudioInput {
    fn min_buffer_bytes(&self, format: &CaptureFormat) -> Option<usize> {
        let mut env = jvm::env().ok()?;
        let size = jvm::with_frame(&mut env, |env| {
            let size = env.call_static_method(
                AUDIO_RECORD,
                "getMinBufferSize",
                "(III)I",
                &[
                    JValue::Int(format.sample_rate as i32),
                    JValue::Int(channel_mask(format)),
                    JValue::Int(ENCODING_PCM_16BIT),
                ],
            );
            jvm::check(env, size, "AudioRecord.getMinBufferSize")?
                .i()
                .map_err(|e| format!("getMinBufferSize result: {}", e))
        })
        .ok()?
        .ok()?;

        // ERROR (-1) and ERROR_BAD_VALUE (-2) mean the platform cannot tell
        if size > 0 {
            Some(size as usize)
        } else {
            None
        }
    }

    fn open(
        &self,
        format: &CaptureFormat,
        buffer_bytes: usize,
    ) -> Result<Box<dyn InputSession>, AudioCaptureError> {
        let mut env = jvm::env().map_err(platform_err)?;
        let samples = (buffer_bytes / BYTES_PER_SAMPLE).max(1);

        let (recorder, array) = jvm::with_frame(&mut env, |env| {
            start_recorder(env, format, buffer_bytes, samples)
        })
        .map_err(platform_err)??;

        tracing::info!(
            "AudioRecord started ({}Hz, {} byte buffer)",
            format.sample_rate,
            buffer_bytes
        );

        Ok(Box::new(AndroidInputSession {
            env,
            recorder,
            array,
            capacity: samples,
        }))
    }
}

/// Create, check and start an `AudioRecord` plus the `short[]` reads land in.
/// On any failure the recorder is released before returning.
fn start_recorder(
    env: &mut JNIEnv,
    format: &CaptureFormat,
    buffer_bytes: usize,
    samples: usize,
) -> Result<(GlobalRef, GlobalRef), AudioCaptureError> {
    let recorder = env.new_object(
        AUDIO_RECORD,
        "(IIIII)V",
        &[
            JValue::Int(AUDIO_SOURCE_MIC),
            JValue::Int(format.sample_rate as i32),
            JValue::Int(channel_mask(format)),
            JValue::Int(ENCODING_PCM_16BIT),
            JValue::Int(buffer_bytes as i32),
        ],
    );
    let recorder = match recorder {
        Ok(recorder) => recorder,
        Err(e) => {
            jvm::clear_exception(env);
            // A SecurityException here means RECORD_AUDIO is missing
            tracing::warn!("Failed to create AudioRecord: {}", e);
            return Err(AudioCaptureError::PermissionDenied);
        }
    };

    let recorder = match env.new_global_ref(&recorder) {
        Ok(global) => global,
        Err(e) => {
            jvm::clear_exception(env);
            release(env, &recorder);
            return Err(platform_err(format!("new_global_ref: {}", e)));
        }
    };

    let state = env.call_method(&recorder, "getState", "()I", &[]);
    let state = jvm::check(env, state, "AudioRecord.getState").and_then(|state| {
        state
            .i()
            .map_err(|e| format!("getState result: {}", e))
    });
    match state {
        Ok(STATE_INITIALIZED) => {}
        Ok(_) => {
            release(env, &recorder);
            return Err(AudioCaptureError::NotInitialized);
        }
        Err(e) => {
            release(env, &recorder);
            return Err(platform_err(e));
        }
    }

    let started = env.call_method(&recorder, "startRecording", "()V", &[]);
    if let Err(e) = jvm::check(env, started, "AudioRecord.startRecording") {
        release(env, &recorder);
        return Err(AudioCaptureError::Stream(e));
    }

    let array = env
        .new_short_array(samples as i32)
        .and_then(|array| env.new_global_ref(array));
    match array {
        Ok(array) => Ok((recorder, array)),
        Err(e) => {
            jvm::clear_exception(env);
            release(env, &recorder);
            Err(platform_err(format!("sample buffer: {}", e)))
        }
    }
}

/// `AudioRecord.release()`, which also stops a running recording
fn release(env: &mut JNIEnv, recorder: &JObject) {
    let released = env.call_method(recorder, "release", "()V", &[]);
    if let Err(e) = jvm::check(env, released, "AudioRecord.release") {
        tracing::debug!("{}", e);
    }
}

struct AndroidInputSession {
    env: JNIEnv<'static>,
    recorder: GlobalRef,
    /// Reused Java-side `short[]`
    array: GlobalRef,
    capacity: usize,
}

impl InputSession for AndroidInputSession {
    fn read(&mut self, buffer: &mut [i16]) -> Result<usize, AudioCaptureError> {
        let len = buffer.len().min(self.capacity);
        let array: &JShortArray = self.array.as_obj().into();

        let read = self.env.call_method(
            &self.recorder,
            "read",
            "([SII)I",
            &[JValue::Object(array), JValue::Int(0), JValue::Int(len as i32)],
        );
        let read = jvm::check(&mut self.env, read, "AudioRecord.read")
            .map_err(AudioCaptureError::Stream)?
            .i()
            .map_err(|e| AudioCaptureError::Stream(format!("read result: {}", e)))?;

        if read <= 0 {
            return Ok(0);
        }

        let read = read as usize;
        self.env
            .get_short_array_region(array, 0, &mut buffer[..read])
            .map_err(|e| AudioCaptureError::Stream(format!("get_short_array_region: {}", e)))?;
        Ok(read)
    }

    fn close(mut self: Box<Self>) -> Result<(), AudioCaptureError> {
        let stopped = self.env.call_method(&self.recorder, "stop", "()V", &[]);
        let stopped = jvm::check(&mut self.env, stopped, "AudioRecord.stop");
        release(&mut self.env, &self.recorder);
        stopped.map(|_| ()).map_err(AudioCaptureError::Stream)
    }
}
