//! Finished audio payload handed to the transcription stage.

use hound::{SampleFormat, WavSpec, WavWriter};
use std::io::Cursor;
use std::time::Duration;

pub const DEFAULT_MIME_TYPE: &str = "audio/webm";

/// Binary payload plus its MIME type. Owned by the session that captured it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioRecording {
    data: Vec<u8>,
    mime_type: String,
}

impl AudioRecording {
    pub fn new(data: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            data,
            mime_type: mime_type.into(),
        }
    }

    /// Encodes mono `f32` samples as 16-bit PCM WAV.
    pub fn from_samples(samples: &[f32], sample_rate: u32) -> Result<Self, hound::Error> {
        let spec = WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };

        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut cursor, spec)?;
            for &sample in samples {
                let clamped = sample.clamp(-1.0, 1.0);
                writer.write_sample((clamped * i16::MAX as f32) as i16)?;
            }
            writer.finalize()?;
        }

        Ok(Self::new(cursor.into_inner(), "audio/wav"))
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Playback length, known only for WAV payloads.
    pub fn duration(&self) -> Option<Duration> {
        if self.mime_type != "audio/wav" {
            return None;
        }
        let reader = hound::WavReader::new(Cursor::new(self.data.as_slice())).ok()?;
        let rate = reader.spec().sample_rate;
        if rate == 0 {
            return None;
        }
        Some(Duration::from_secs_f64(
            reader.duration() as f64 / rate as f64,
        ))
    }
}

/// MIME type for common browser- and recorder-produced audio containers.
pub fn mime_type_for_extension(extension: &str) -> &'static str {
    match extension.to_ascii_lowercase().as_str() {
        "wav" => "audio/wav",
        "mp3" => "audio/mpeg",
        "m4a" | "mp4" => "audio/mp4",
        "ogg" | "oga" | "opus" => "audio/ogg",
        "flac" => "audio/flac",
        "webm" => "audio/webm",
        _ => "application/octet-stream",
    }
}
