//! Desktop microphone input using CPAL.
//!
//! CPAL delivers audio through a callback; the callback forwards PCM16
//! chunks over a bounded channel and `read` pulls from it, which gives the
//! worker the same blocking read model it has on Android.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::time::Duration;

use super::{AudioCaptureError, AudioInput, InputSession};
use crate::config::CaptureFormat;

/// Chunks buffered between the callback and the reader
const CHANNEL_DEPTH: usize = 16;

/// How long a read waits for the callback before reporting "nothing yet"
const READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Desktop microphone input implementation using CPAL
pub struct DesktopAudioInput;

impl DesktopAudioInput {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DesktopAudioInput {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioInput for DesktopAudioInput {
    fn min_buffer_bytes(&self, _format: &CaptureFormat) -> Option<usize> {
        // CPAL picks its own period size
        None
    }

    fn open(
        &self,
        format: &CaptureFormat,
        _buffer_bytes: usize,
    ) -> Result<Box<dyn InputSession>, AudioCaptureError> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or(AudioCaptureError::NoDevice)?;

        if let Ok(name) = device.name() {
            tracing::debug!("Opening input device: {}", name);
        }

        let mut supported_configs = device
            .supported_input_configs()
            .map_err(|e| AudioCaptureError::Configuration(e.to_string()))?;

        // Prefer the requested rate; otherwise take whatever the device runs at.
        // The samples are never used, so no resampling is needed.
        let config: cpal::StreamConfig = match supported_configs.find(|c| {
            c.min_sample_rate().0 <= format.sample_rate && c.max_sample_rate().0 >= format.sample_rate
        }) {
            Some(c) => c.with_sample_rate(cpal::SampleRate(format.sample_rate)).into(),
            None => {
                let default = device
                    .default_input_config()
                    .map_err(|e| AudioCaptureError::Configuration(e.to_string()))?;
                tracing::warn!(
                    "{}Hz not supported, using device default: {}Hz",
                    format.sample_rate,
                    default.sample_rate().0
                );
                default.into()
            }
        };

        let channels = config.channels.max(1) as usize;
        let (tx, rx): (SyncSender<Vec<i16>>, Receiver<Vec<i16>>) = mpsc::sync_channel(CHANNEL_DEPTH);

        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    // First channel only, as PCM16
                    let samples: Vec<i16> = data
                        .chunks(channels)
                        .map(|frame| (frame[0] * 32767.0).clamp(-32768.0, 32767.0) as i16)
                        .collect();
                    // Reader is behind: drop the chunk
                    let _ = tx.try_send(samples);
                },
                |err| {
                    tracing::error!("Audio stream error: {}", err);
                },
                None,
            )
            .map_err(|e| AudioCaptureError::Stream(format!("Failed to build stream: {}", e)))?;

        stream
            .play()
            .map_err(|e| AudioCaptureError::Stream(format!("Failed to start stream: {}", e)))?;

        Ok(Box::new(DesktopInputSession { stream, rx }))
    }
}

struct DesktopInputSession {
    stream: cpal::Stream,
    rx: Receiver<Vec<i16>>,
}

impl InputSession for DesktopInputSession {
    fn read(&mut self, buffer: &mut [i16]) -> Result<usize, AudioCaptureError> {
        match self.rx.recv_timeout(READ_TIMEOUT) {
            Ok(chunk) => {
                let n = chunk.len().min(buffer.len());
                buffer[..n].copy_from_slice(&chunk[..n]);
                Ok(n)
            }
            Err(RecvTimeoutError::Timeout) => Ok(0),
            Err(RecvTimeoutError::Disconnected) => {
                Err(AudioCaptureError::Stream("Input stream closed".to_string()))
            }
        }
    }

    fn close(self: Box<Self>) -> Result<(), AudioCaptureError> {
        self.stream
            .pause()
            .map_err(|e| AudioCaptureError::Stream(e.to_string()))
        // Stream is dropped here, releasing the device
    }
}
