use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::audio::AudioRecording;
use crate::transcription::{JobProvider, JobStatus, TranscriptionError, TranscriptionJob};

pub const DEFAULT_ENDPOINT: &str = "https://api.assemblyai.com/v2";

/// Response from the upload endpoint
#[derive(Debug, Deserialize)]
struct UploadResponse {
    upload_url: String,
}

/// Request body for creating a transcript
#[derive(Debug, Serialize)]
struct TranscriptRequest<'a> {
    audio_url: &'a str,
    punctuate: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    language_code: Option<&'a str>,
}

/// Response from transcript creation and polling
#[derive(Debug, Deserialize)]
struct TranscriptResponse {
    id: String,
    status: TranscriptStatus,
    text: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
enum TranscriptStatus {
    Queued,
    Processing,
    Completed,
    Error,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

impl From<TranscriptResponse> for TranscriptionJob {
    fn from(response: TranscriptResponse) -> Self {
        let status = match response.status {
            TranscriptStatus::Queued => JobStatus::Queued,
            TranscriptStatus::Processing => JobStatus::Processing,
            TranscriptStatus::Completed => JobStatus::Completed,
            TranscriptStatus::Error => JobStatus::Error,
        };

        Self {
            id: response.id,
            status,
            text: response.text.filter(|_| status == JobStatus::Completed),
            error: response.error.filter(|_| status == JobStatus::Error),
        }
    }
}

/// Prefer the provider's own `{"error": ...}` message over the raw body.
fn error_detail(status: reqwest::StatusCode, body: &str) -> String {
    match serde_json::from_str::<ErrorResponse>(body) {
        Ok(parsed) => format!("HTTP {}: {}", status, parsed.error),
        Err(_) => format!("HTTP {}: {}", status, body),
    }
}

pub struct AssemblyAIProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    language_code: Option<String>,
}

impl AssemblyAIProvider {
    pub fn new(api_key: impl Into<String>, endpoint: Option<String>) -> Self {
        let client = reqwest::Client::new();
        let base_url = endpoint
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string())
            .trim_end_matches('/')
            .to_string();

        info!(
            "Initialized AssemblyAI provider with base URL: {}",
            base_url
        );

        Self {
            client,
            api_key: api_key.into(),
            base_url,
            language_code: None,
        }
    }

    /// Pins the spoken language instead of letting the service detect it.
    pub fn with_language(mut self, language_code: impl Into<String>) -> Self {
        let code = language_code.into();
        self.language_code = if code.is_empty() || code == "auto" {
            None
        } else {
            Some(code)
        };
        self
    }

    fn transcript_url(&self) -> String {
        format!("{}/transcript", self.base_url)
    }
}

#[async_trait]
impl JobProvider for AssemblyAIProvider {
    fn name(&self) -> &'static str {
        "AssemblyAI API"
    }

    async fn upload(&self, recording: &AudioRecording) -> Result<String, TranscriptionError> {
        let upload_url = format!("{}/upload", self.base_url);

        debug!("Uploading {} bytes to AssemblyAI", recording.len());

        let response = self
            .client
            .post(&upload_url)
            .header("Authorization", &self.api_key)
            .header("Content-Type", "application/octet-stream")
            .body(recording.data().to_vec())
            .send()
            .await
            .map_err(|e| TranscriptionError::Upload(e.to_string()))?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(|e| TranscriptionError::Upload(format!("failed to read response: {e}")))?;

        if !status.is_success() {
            error!(
                "AssemblyAI upload failed with status {}: {}",
                status, response_text
            );
            return Err(TranscriptionError::Upload(error_detail(
                status,
                &response_text,
            )));
        }

        let upload_response: UploadResponse = serde_json::from_str(&response_text)
            .map_err(|e| TranscriptionError::Upload(format!("unexpected response: {e}")))?;

        Ok(upload_response.upload_url)
    }

    async fn create_job(&self, audio_url: &str) -> Result<TranscriptionJob, TranscriptionError> {
        let request_body = TranscriptRequest {
            audio_url,
            punctuate: true,
            language_code: self.language_code.as_deref(),
        };

        debug!("Submitting transcription request to AssemblyAI");

        let response = self
            .client
            .post(self.transcript_url())
            .header("Authorization", &self.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| TranscriptionError::JobCreation(e.to_string()))?;

        let status = response.status();
        let response_text = response.text().await.map_err(|e| {
            TranscriptionError::JobCreation(format!("failed to read response: {e}"))
        })?;

        if !status.is_success() {
            error!(
                "AssemblyAI transcription request failed with status {}: {}",
                status, response_text
            );
            return Err(TranscriptionError::JobCreation(error_detail(
                status,
                &response_text,
            )));
        }

        let transcript_response: TranscriptResponse = serde_json::from_str(&response_text)
            .map_err(|e| TranscriptionError::JobCreation(format!("unexpected response: {e}")))?;

        Ok(transcript_response.into())
    }

    async fn fetch_job(&self, job_id: &str) -> Result<TranscriptionJob, TranscriptionError> {
        let poll_url = format!("{}/{}", self.transcript_url(), job_id);

        let response = self
            .client
            .get(&poll_url)
            .header("Authorization", &self.api_key)
            .send()
            .await
            .map_err(|e| {
                TranscriptionError::Transcription(format!("status request failed: {e}"))
            })?;

        let status = response.status();
        let response_text = response.text().await.map_err(|e| {
            TranscriptionError::Transcription(format!("failed to read status response: {e}"))
        })?;

        if !status.is_success() {
            error!(
                "AssemblyAI poll request failed with status {}: {}",
                status, response_text
            );
            return Err(TranscriptionError::Transcription(error_detail(
                status,
                &response_text,
            )));
        }

        let transcript_response: TranscriptResponse = serde_json::from_str(&response_text)
            .map_err(|e| {
                TranscriptionError::Transcription(format!("unexpected status response: {e}"))
            })?;

        Ok(transcript_response.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shape() {
        let body = TranscriptRequest {
            audio_url: "https://cdn.assemblyai.com/upload/abc",
            punctuate: true,
            language_code: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["audio_url"], "https://cdn.assemblyai.com/upload/abc");
        assert_eq!(json["punctuate"], true);
        assert!(json.get("language_code").is_none());
    }

    #[test]
    fn test_response_maps_to_job() {
        let response: TranscriptResponse = serde_json::from_str(
            r#"{"id":"t-1","status":"completed","text":"hello","error":null}"#,
        )
        .unwrap();
        let job = TranscriptionJob::from(response);
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.text.as_deref(), Some("hello"));
        assert!(job.error.is_none());
    }

    #[test]
    fn test_text_dropped_unless_completed() {
        let response: TranscriptResponse = serde_json::from_str(
            r#"{"id":"t-1","status":"processing","text":"partial"}"#,
        )
        .unwrap();
        let job = TranscriptionJob::from(response);
        assert_eq!(job.status, JobStatus::Processing);
        assert!(job.text.is_none());
    }

    #[test]
    fn test_error_detail_prefers_provider_message() {
        let detail = error_detail(
            reqwest::StatusCode::BAD_REQUEST,
            r#"{"error":"Invalid audio_url"}"#,
        );
        assert!(detail.contains("Invalid audio_url"));
        assert!(detail.contains("400"));

        let detail = error_detail(reqwest::StatusCode::BAD_GATEWAY, "upstream down");
        assert!(detail.contains("upstream down"));
    }

    #[test]
    fn test_language_auto_is_unset() {
        let provider = AssemblyAIProvider::new("key", None).with_language("auto");
        assert!(provider.language_code.is_none());
        let provider = AssemblyAIProvider::new("key", None).with_language("en");
        assert_eq!(provider.language_code.as_deref(), Some("en"));
    }
}
