//! Voice-to-task pipeline: transcription followed by intent extraction.
//!
//! Constructed once at startup and shared by reference. Holds no per-request
//! state, so concurrent requests never interfere.

use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::audio::AudioRecording;
use crate::config::{Config, ConfigError, ExtractionConfig, TranscriptionConfig};
use crate::extraction::{self, GeminiModel, IntentExtractor};
use crate::task::TaskCandidate;
use crate::transcription::{AssemblyAIProvider, TranscriptionError, TranscriptionJobClient};

/// Result of one voice submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceOutcome {
    pub transcript: String,
    pub parsed_data: TaskCandidate,
}

pub struct VoicePipeline {
    transcriber: TranscriptionJobClient,
    extractor: IntentExtractor,
    fixed_anchor: Option<NaiveDate>,
}

impl VoicePipeline {
    pub fn new(transcriber: TranscriptionJobClient, extractor: IntentExtractor) -> Self {
        Self {
            transcriber,
            extractor,
            fixed_anchor: None,
        }
    }

    /// Builds the AssemblyAI + Gemini pipeline. Both API keys are required.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self::new(
            transcriber_from_config(&config.transcription)?,
            extractor_from_config(&config.extraction)?,
        ))
    }

    /// Pins the anchor date instead of using today's local date.
    pub fn with_fixed_anchor(mut self, anchor: NaiveDate) -> Self {
        self.fixed_anchor = Some(anchor);
        self
    }

    pub fn anchor(&self) -> NaiveDate {
        self.fixed_anchor.unwrap_or_else(extraction::today)
    }

    pub fn transcriber(&self) -> &TranscriptionJobClient {
        &self.transcriber
    }

    /// Never fails; see `extraction::degrade`.
    pub async fn extract(&self, transcript: &str) -> TaskCandidate {
        self.extractor.extract_at(transcript, self.anchor()).await
    }

    /// Transcribes and extracts. Only transcription failures are returned.
    pub async fn process(
        &self,
        recording: &AudioRecording,
        cancel: &CancellationToken,
    ) -> Result<VoiceOutcome, TranscriptionError> {
        let transcript = self.transcriber.transcribe(recording, cancel).await?;
        let parsed_data = self.extract(&transcript).await;

        info!("Task candidate ready: {:?}", parsed_data.title);
        Ok(VoiceOutcome {
            transcript,
            parsed_data,
        })
    }
}

/// AssemblyAI job client. Fails without a transcription API key.
pub fn transcriber_from_config(
    config: &TranscriptionConfig,
) -> Result<TranscriptionJobClient, ConfigError> {
    let mut provider = AssemblyAIProvider::new(config.require_api_key()?, config.api_endpoint.clone());
    if let Some(language) = &config.language {
        provider = provider.with_language(language.clone());
    }
    Ok(TranscriptionJobClient::new(
        Arc::new(provider),
        config.poll_policy(),
    ))
}

/// Gemini-backed extractor. Fails without a model API key.
pub fn extractor_from_config(config: &ExtractionConfig) -> Result<IntentExtractor, ConfigError> {
    let model = GeminiModel::new(
        config.require_api_key()?,
        config.api_endpoint.clone(),
        Some(config.model.clone()),
    )
    .with_sampling(config.sampling());
    Ok(IntentExtractor::new(Arc::new(model)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_requires_both_keys() {
        let mut config = Config::default();
        assert!(matches!(
            VoicePipeline::from_config(&config),
            Err(ConfigError::MissingApiKey { name: "AssemblyAI", .. })
        ));

        config.transcription.api_key = Some("aai".to_string());
        assert!(matches!(
            VoicePipeline::from_config(&config),
            Err(ConfigError::MissingApiKey { name: "Gemini", .. })
        ));

        config.extraction.api_key = Some("gem".to_string());
        assert!(VoicePipeline::from_config(&config).is_ok());
    }

    #[test]
    fn test_extractor_needs_only_model_key() {
        let mut config = Config::default();
        config.extraction.api_key = Some("gem".to_string());
        assert!(extractor_from_config(&config.extraction).is_ok());
        assert!(transcriber_from_config(&config.transcription).is_err());
    }

    #[test]
    fn test_outcome_serializes_parsed_data() {
        let outcome = VoiceOutcome {
            transcript: "buy milk".to_string(),
            parsed_data: TaskCandidate::fallback("buy milk"),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["transcript"], "buy milk");
        assert_eq!(json["parsedData"]["title"], "buy milk");
        assert_eq!(json["parsedData"]["priority"], "Medium");
        assert_eq!(json["parsedData"]["status"], "To Do");
        assert!(json["parsedData"]["due_date"].is_null());
    }
}
