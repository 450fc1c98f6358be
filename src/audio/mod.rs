pub mod audio_source;
pub mod capture;
pub mod mic_source;
pub mod recording;

pub use audio_source::{AudioSource, CaptureError};
pub use capture::AudioCaptureController;
pub use mic_source::MicAudioSource;
pub use recording::{mime_type_for_extension, AudioRecording, DEFAULT_MIME_TYPE};
