//! Microphone session ownership: one capture at a time, device always released.

use tracing::{debug, info, warn};

use super::audio_source::{AudioSource, CaptureError};
use super::mic_source::MicAudioSource;
use super::recording::AudioRecording;

pub struct AudioCaptureController {
    source: Box<dyn AudioSource>,
}

impl AudioCaptureController {
    pub fn new(source: Box<dyn AudioSource>) -> Self {
        Self { source }
    }

    /// Controller backed by the default input device.
    pub fn microphone() -> Self {
        Self::new(Box::new(MicAudioSource::new()))
    }

    pub fn is_capturing(&self) -> bool {
        self.source.is_active()
    }

    pub fn start(&mut self) -> Result<(), CaptureError> {
        if self.source.is_active() {
            return Err(CaptureError::AlreadyCapturing);
        }

        if let Err(e) = self.source.start() {
            warn!("Failed to start capture: {}", e);
            // A source that failed half-way must not keep the device open.
            self.release();
            return Err(e);
        }
        Ok(())
    }

    /// Finishes the active capture. Returns `Ok(None)` when nothing was capturing.
    pub fn stop(&mut self) -> Result<Option<AudioRecording>, CaptureError> {
        if !self.source.is_active() {
            debug!("stop() without an active capture; ignoring");
            return Ok(None);
        }

        let samples = self.source.stop()?;
        if samples.is_empty() {
            return Err(CaptureError::NoAudio);
        }

        let recording = AudioRecording::from_samples(&samples, self.source.sample_rate())
            .map_err(|e| CaptureError::Device(format!("Failed to encode audio: {e}")))?;

        info!(
            "Captured {} samples ({} bytes of {})",
            samples.len(),
            recording.len(),
            recording.mime_type()
        );
        Ok(Some(recording))
    }

    /// Abandons any active capture, discarding its samples.
    pub fn release(&mut self) {
        if self.source.is_active() {
            debug!("Releasing input device");
            if let Err(e) = self.source.stop() {
                warn!("Error while releasing input device: {}", e);
            }
        }
    }
}

impl Drop for AudioCaptureController {
    fn drop(&mut self) {
        self.release();
    }
}
