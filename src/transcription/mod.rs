//! Asynchronous transcription job protocol.
//!
//! upload → create job → poll until `completed` or `error`
//!
//! `JobProvider` is the seam to the remote service; `TranscriptionJobClient`
//! owns the polling schedule and cancellation.

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::audio::AudioRecording;

pub mod poll_policy;
pub mod providers;

pub use poll_policy::PollPolicy;
pub use providers::AssemblyAIProvider;

#[derive(Debug, Clone, Error)]
pub enum TranscriptionError {
    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Transcript start failed: {0}")]
    JobCreation(String),

    #[error("Transcription error: {0}")]
    Transcription(String),

    #[error("Transcription job {job_id} did not finish within {waited:?}")]
    Timeout { job_id: String, waited: Duration },

    #[error("Transcription cancelled")]
    Cancelled,
}

impl TranscriptionError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Upload(_) => "upload_error",
            Self::JobCreation(_) => "job_creation_error",
            Self::Transcription(_) => "transcription_error",
            Self::Timeout { .. } => "transcription_timeout",
            Self::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Error,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

/// Snapshot of a remote transcription job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptionJob {
    pub id: String,
    pub status: JobStatus,
    /// Present only when `status` is `Completed`.
    pub text: Option<String>,
    /// Present only when `status` is `Error`.
    pub error: Option<String>,
}

/// Remote service that stores audio and runs transcription jobs.
#[async_trait]
pub trait JobProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Uploads raw audio and returns a URL the transcription service can read.
    async fn upload(&self, recording: &AudioRecording) -> Result<String, TranscriptionError>;

    async fn create_job(&self, audio_url: &str) -> Result<TranscriptionJob, TranscriptionError>;

    async fn fetch_job(&self, job_id: &str) -> Result<TranscriptionJob, TranscriptionError>;
}

async fn cancellable<T, F>(cancel: &CancellationToken, fut: F) -> Result<T, TranscriptionError>
where
    F: Future<Output = Result<T, TranscriptionError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(TranscriptionError::Cancelled),
        result = fut => result,
    }
}

pub struct TranscriptionJobClient {
    provider: Arc<dyn JobProvider>,
    policy: PollPolicy,
}

impl TranscriptionJobClient {
    pub fn new(provider: Arc<dyn JobProvider>, policy: PollPolicy) -> Self {
        info!("Using {} for transcription", provider.name());
        Self { provider, policy }
    }

    pub async fn upload(
        &self,
        recording: &AudioRecording,
        cancel: &CancellationToken,
    ) -> Result<String, TranscriptionError> {
        info!(
            "Uploading {} bytes of {} audio to {}",
            recording.len(),
            recording.mime_type(),
            self.provider.name()
        );
        let url = cancellable(cancel, self.provider.upload(recording)).await?;
        debug!("Audio uploaded: {}", url);
        Ok(url)
    }

    pub async fn create_job(
        &self,
        audio_url: &str,
        cancel: &CancellationToken,
    ) -> Result<TranscriptionJob, TranscriptionError> {
        let job = cancellable(cancel, self.provider.create_job(audio_url)).await?;
        info!("Transcription job {} created ({})", job.id, job.status.as_str());
        Ok(job)
    }

    /// Polls `job` until it reaches a terminal status, the wait bound is
    /// exceeded, or `cancel` fires.
    pub async fn wait_for_text(
        &self,
        job: TranscriptionJob,
        cancel: &CancellationToken,
    ) -> Result<String, TranscriptionError> {
        let started = Instant::now();
        let mut job = job;
        let mut attempt: u32 = 0;

        loop {
            if job.status.is_terminal() {
                return Self::finished_text(job);
            }

            attempt += 1;
            let delay = self.policy.delay_for_attempt(attempt);
            let waited = started.elapsed();
            if waited + delay > self.policy.max_wait {
                warn!(
                    "Transcription job {} still {} after {:?}, giving up",
                    job.id,
                    job.status.as_str(),
                    waited
                );
                return Err(TranscriptionError::Timeout {
                    job_id: job.id,
                    waited,
                });
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(TranscriptionError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }

            debug!(
                "Polling transcription status (attempt {}): {}",
                attempt, job.id
            );
            let previous = job.status;
            job = cancellable(cancel, self.provider.fetch_job(&job.id)).await?;
            if job.status != previous {
                info!("Transcription job {} status: {}", job.id, job.status.as_str());
            }
        }
    }

    fn finished_text(job: TranscriptionJob) -> Result<String, TranscriptionError> {
        match job.status {
            JobStatus::Completed => {
                let text = job.text.unwrap_or_default().trim().to_string();
                if text.is_empty() {
                    warn!("Transcription job {} completed without speech", job.id);
                    return Err(TranscriptionError::Transcription(
                        "No speech detected".to_string(),
                    ));
                }
                info!("Transcription complete: {} chars", text.len());
                Ok(text)
            }
            JobStatus::Error => {
                let detail = job.error.unwrap_or_else(|| "Unknown error".to_string());
                warn!("Transcription job {} failed: {}", job.id, detail);
                Err(TranscriptionError::Transcription(detail))
            }
            JobStatus::Queued | JobStatus::Processing => Err(TranscriptionError::Transcription(
                format!("job {} is still {}", job.id, job.status.as_str()),
            )),
        }
    }

    /// Runs the full protocol for one recording.
    pub async fn transcribe(
        &self,
        recording: &AudioRecording,
        cancel: &CancellationToken,
    ) -> Result<String, TranscriptionError> {
        let audio_url = self.upload(recording, cancel).await?;
        let job = self.create_job(&audio_url, cancel).await?;
        self.wait_for_text(job, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct ScriptedProvider {
        statuses: Mutex<VecDeque<TranscriptionJob>>,
        polls: AtomicUsize,
    }

    fn job(status: JobStatus, text: Option<&str>, error: Option<&str>) -> TranscriptionJob {
        TranscriptionJob {
            id: "job-1".to_string(),
            status,
            text: text.map(String::from),
            error: error.map(String::from),
        }
    }

    impl ScriptedProvider {
        fn new(statuses: Vec<TranscriptionJob>) -> Arc<Self> {
            Arc::new(Self {
                statuses: Mutex::new(statuses.into()),
                polls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl JobProvider for ScriptedProvider {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn upload(&self, _recording: &AudioRecording) -> Result<String, TranscriptionError> {
            Ok("https://cdn.example/audio".to_string())
        }

        async fn create_job(
            &self,
            _audio_url: &str,
        ) -> Result<TranscriptionJob, TranscriptionError> {
            Ok(job(JobStatus::Queued, None, None))
        }

        async fn fetch_job(&self, _job_id: &str) -> Result<TranscriptionJob, TranscriptionError> {
            self.polls.fetch_add(1, Ordering::SeqCst);
            let mut statuses = self.statuses.lock().unwrap();
            Ok(statuses
                .pop_front()
                .unwrap_or_else(|| job(JobStatus::Processing, None, None)))
        }
    }

    fn fast_policy(max_wait: Duration) -> PollPolicy {
        PollPolicy::fixed(Duration::from_millis(5), max_wait)
    }

    fn recording() -> AudioRecording {
        AudioRecording::new(vec![1, 2, 3], "audio/webm")
    }

    #[tokio::test]
    async fn test_transcribe_polls_until_completed() {
        let provider = ScriptedProvider::new(vec![
            job(JobStatus::Processing, None, None),
            job(JobStatus::Completed, Some("  buy milk  "), None),
        ]);
        let client = TranscriptionJobClient::new(provider.clone(), fast_policy(Duration::from_secs(5)));

        let text = client
            .transcribe(&recording(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(text, "buy milk");
        assert_eq!(provider.polls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_terminal_job_returns_without_polling() {
        let provider = ScriptedProvider::new(Vec::new());
        let client = TranscriptionJobClient::new(provider.clone(), fast_policy(Duration::from_secs(5)));
        let cancel = CancellationToken::new();

        let text = client
            .wait_for_text(job(JobStatus::Completed, Some("call mom"), None), &cancel)
            .await
            .unwrap();
        assert_eq!(text, "call mom");

        let err = client
            .wait_for_text(job(JobStatus::Error, None, None), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, TranscriptionError::Transcription(ref d) if d == "Unknown error"));
        assert_eq!(provider.polls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_error_status_carries_provider_detail() {
        let provider = ScriptedProvider::new(vec![job(
            JobStatus::Error,
            None,
            Some("Audio file is corrupted"),
        )]);
        let client = TranscriptionJobClient::new(provider, fast_policy(Duration::from_secs(5)));

        let err = client
            .transcribe(&recording(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, TranscriptionError::Transcription(ref d) if d == "Audio file is corrupted"));
        assert_eq!(err.kind(), "transcription_error");
    }

    #[tokio::test]
    async fn test_completed_without_text_is_error() {
        let provider = ScriptedProvider::new(vec![job(JobStatus::Completed, Some("   "), None)]);
        let client = TranscriptionJobClient::new(provider, fast_policy(Duration::from_secs(5)));

        let err = client
            .transcribe(&recording(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, TranscriptionError::Transcription(_)));
    }

    #[tokio::test]
    async fn test_never_terminal_times_out() {
        let provider = ScriptedProvider::new(Vec::new());
        let client =
            TranscriptionJobClient::new(provider.clone(), fast_policy(Duration::from_millis(60)));

        let err = client
            .transcribe(&recording(), &CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            TranscriptionError::Timeout { job_id, .. } => assert_eq!(job_id, "job-1"),
            other => panic!("expected timeout, got {other:?}"),
        }
        assert!(provider.polls.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn test_cancellation_stops_polling() {
        let provider = ScriptedProvider::new(Vec::new());
        let client = TranscriptionJobClient::new(provider, fast_policy(Duration::from_secs(30)));
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            trigger.cancel();
        });

        let err = client.transcribe(&recording(), &cancel).await.unwrap_err();
        assert!(matches!(err, TranscriptionError::Cancelled));
    }

    #[tokio::test]
    async fn test_already_cancelled_skips_upload() {
        let provider = ScriptedProvider::new(Vec::new());
        let client = TranscriptionJobClient::new(provider, fast_policy(Duration::from_secs(30)));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = client.upload(&recording(), &cancel).await.unwrap_err();
        assert!(matches!(err, TranscriptionError::Cancelled));
    }

    #[test]
    fn test_job_status_terminal() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Error.is_terminal());
        assert!(!JobStatus::Queued.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
    }
}
