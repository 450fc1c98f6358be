//! Microphone audio capture via cpal.
//!
//! The input device is opened in `start` and closed in `stop`, so the handle is
//! held only for the duration of one capture.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig};
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info};

use super::audio_source::{AudioSource, CaptureError};

pub struct MicAudioSource {
    stream: Option<cpal::Stream>,
    samples: Arc<Mutex<Vec<f32>>>,
    sample_rate: u32,
}

impl Default for MicAudioSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MicAudioSource {
    pub fn new() -> Self {
        Self {
            stream: None,
            samples: Arc::new(Mutex::new(Vec::new())),
            sample_rate: 16000,
        }
    }

    fn push_frames<I>(samples: &Mutex<Vec<f32>>, channels: usize, data: I)
    where
        I: ExactSizeIterator<Item = f32>,
    {
        let Ok(mut buffer) = samples.lock() else {
            return;
        };

        if channels <= 1 {
            buffer.extend(data);
            return;
        }

        // Downmix interleaved frames to mono
        let frame: Vec<f32> = data.collect();
        for chunk in frame.chunks(channels) {
            buffer.push(chunk.iter().sum::<f32>() / chunk.len() as f32);
        }
    }
}

fn denied(err: impl std::fmt::Display) -> CaptureError {
    CaptureError::Permission(err.to_string())
}

impl AudioSource for MicAudioSource {
    fn start(&mut self) -> Result<(), CaptureError> {
        if self.stream.is_some() {
            return Err(CaptureError::AlreadyCapturing);
        }

        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| denied("No input device available"))?;

        info!(
            "Capturing from input device: {}",
            device.name().unwrap_or_else(|_| "unknown".to_string())
        );

        let supported = device.default_input_config().map_err(denied)?;
        let sample_format = supported.sample_format();
        let config: StreamConfig = supported.into();
        let channels = config.channels as usize;
        self.sample_rate = config.sample_rate.0;

        // Clear previous samples
        {
            let mut samples = self
                .samples
                .lock()
                .map_err(|_| CaptureError::Device("Sample buffer poisoned".to_string()))?;
            samples.clear();
            samples.shrink_to_fit();
        }

        let samples = self.samples.clone();
        let err_fn = |err| error!("Microphone stream error: {}", err);

        let stream = match sample_format {
            SampleFormat::I16 => device.build_input_stream(
                &config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    Self::push_frames(
                        &samples,
                        channels,
                        data.iter().map(|&s| s as f32 / i16::MAX as f32),
                    );
                },
                err_fn,
                None,
            ),
            SampleFormat::F32 => device.build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    Self::push_frames(&samples, channels, data.iter().copied());
                },
                err_fn,
                None,
            ),
            other => {
                return Err(CaptureError::Device(format!(
                    "Unsupported sample format: {other:?}"
                )))
            }
        }
        .map_err(denied)?;

        stream.play().map_err(denied)?;
        self.stream = Some(stream);

        info!("Microphone capture started at {} Hz", self.sample_rate);
        Ok(())
    }

    fn stop(&mut self) -> Result<Vec<f32>, CaptureError> {
        let Some(stream) = self.stream.take() else {
            return Err(CaptureError::Device("Microphone not capturing".to_string()));
        };

        debug!("Releasing microphone stream");
        drop(stream);

        let samples = {
            let mut guard = self
                .samples
                .lock()
                .map_err(|_| CaptureError::Device("Sample buffer poisoned".to_string()))?;
            std::mem::take(&mut *guard)
        };

        info!("Microphone stopped, {} samples captured", samples.len());
        Ok(samples)
    }

    fn is_active(&self) -> bool {
        self.stream.is_some()
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl Drop for MicAudioSource {
    fn drop(&mut self) {
        if self.stream.is_some() {
            debug!("Dropping active MicAudioSource, releasing device");
            let _ = self.stop();
        }
    }
}
