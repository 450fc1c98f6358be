//! Audio source abstraction for capturing from an input device.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CaptureError {
    /// The input device is missing or access to it was denied.
    #[error("Microphone access denied: {0}")]
    Permission(String),

    #[error("A capture is already in progress")]
    AlreadyCapturing,

    #[error("No audio captured")]
    NoAudio,

    #[error("Audio device error: {0}")]
    Device(String),
}

impl CaptureError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Permission(_) => "permission_error",
            Self::AlreadyCapturing => "already_capturing",
            Self::NoAudio => "no_audio",
            Self::Device(_) => "device_error",
        }
    }
}

/// An input that holds a device handle only while capturing.
///
/// `start` acquires the device, `stop` releases it and returns the mono samples
/// captured in between.
pub trait AudioSource {
    fn start(&mut self) -> Result<(), CaptureError>;

    fn stop(&mut self) -> Result<Vec<f32>, CaptureError>;

    fn is_active(&self) -> bool;

    fn sample_rate(&self) -> u32;
}
