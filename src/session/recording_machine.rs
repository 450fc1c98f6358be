//! One voice-interaction attempt, from microphone to task candidate.
//!
//! ```text
//! Idle --start--> Recording --stop--> Stopped --confirm--> Uploading
//!      --> Polling --> Parsing --> Ready | Error
//! ```
//!
//! Every operation takes `&mut self`, so capture and transcription can never
//! overlap within one session.

use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::status::{SessionPhase, SessionStatusHandle};
use crate::audio::{AudioCaptureController, AudioRecording, CaptureError};
use crate::pipeline::VoicePipeline;
use crate::task::TaskCandidate;
use crate::transcription::TranscriptionError;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Cannot {action} while the session is {phase}")]
    InvalidTransition {
        phase: SessionPhase,
        action: &'static str,
    },

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Pipeline(#[from] TranscriptionError),
}

impl SessionError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::Capture(e) => e.kind(),
            Self::Pipeline(e) => e.kind(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum SessionState {
    Idle,
    Recording,
    Stopped { recording: AudioRecording },
    Uploading,
    Polling { job_id: String },
    Parsing { transcript: String },
    Ready {
        transcript: String,
        candidate: TaskCandidate,
    },
    Error(TranscriptionError),
}

impl SessionState {
    pub fn phase(&self) -> SessionPhase {
        match self {
            Self::Idle => SessionPhase::Idle,
            Self::Recording => SessionPhase::Recording,
            Self::Stopped { .. } => SessionPhase::Stopped,
            Self::Uploading => SessionPhase::Uploading,
            Self::Polling { .. } => SessionPhase::Polling,
            Self::Parsing { .. } => SessionPhase::Parsing,
            Self::Ready { .. } => SessionPhase::Ready,
            Self::Error(_) => SessionPhase::Error,
        }
    }
}

pub struct RecordingStateMachine {
    id: Uuid,
    capture: AudioCaptureController,
    pipeline: Arc<VoicePipeline>,
    state: SessionState,
    status: SessionStatusHandle,
    cancel: CancellationToken,
}

impl RecordingStateMachine {
    pub fn new(capture: AudioCaptureController, pipeline: Arc<VoicePipeline>) -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            capture,
            pipeline,
            state: SessionState::Idle,
            status: SessionStatusHandle::new(id),
            cancel: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn phase(&self) -> SessionPhase {
        self.state.phase()
    }

    /// Shared view of this session's phase for rendering while a stage is
    /// suspended.
    pub fn status(&self) -> SessionStatusHandle {
        self.status.clone()
    }

    /// Token that aborts the in-flight upload or poll when cancelled.
    pub fn cancel_handle(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// The held recording, available for preview while `Stopped`.
    pub fn recording(&self) -> Option<&AudioRecording> {
        match &self.state {
            SessionState::Stopped { recording } => Some(recording),
            _ => None,
        }
    }

    pub fn candidate(&self) -> Option<&TaskCandidate> {
        match &self.state {
            SessionState::Ready { candidate, .. } => Some(candidate),
            _ => None,
        }
    }

    /// The transcript behind the current candidate, once `Ready`.
    pub fn transcript(&self) -> Option<&str> {
        match &self.state {
            SessionState::Ready { transcript, .. } => Some(transcript),
            _ => None,
        }
    }

    /// Moves to `next` and returns the state it replaced.
    async fn transition(&mut self, next: SessionState) -> SessionState {
        let to = next.phase();
        info!("Session {}: {} -> {}", self.id, self.state.phase(), to);

        match &next {
            SessionState::Error(e) => self.status.set_error(to, e.to_string()).await,
            _ => self.status.set_phase(to).await,
        }
        std::mem::replace(&mut self.state, next)
    }

    fn reject(&self, action: &'static str) -> SessionError {
        let phase = self.state.phase();
        warn!("Session {}: cannot {} while {}", self.id, action, phase);
        SessionError::InvalidTransition { phase, action }
    }

    /// Begins capturing. Allowed from `Idle`, or from `Stopped` where the held
    /// recording is discarded.
    pub async fn start(&mut self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Idle => {}
            SessionState::Stopped { .. } => {
                debug!("Session {}: discarding held recording", self.id);
                self.transition(SessionState::Idle).await;
            }
            _ => return Err(self.reject("start")),
        }

        if let Err(e) = self.capture.start() {
            error!("Session {}: failed to start capture: {}", self.id, e);
            self.status.set_error(SessionPhase::Idle, e.to_string()).await;
            return Err(e.into());
        }

        self.transition(SessionState::Recording).await;
        Ok(())
    }

    /// Finishes capturing and holds the recording for preview.
    pub async fn stop(&mut self) -> Result<&AudioRecording, SessionError> {
        if !matches!(self.state, SessionState::Recording) {
            return Err(self.reject("stop"));
        }

        let recording = match self.capture.stop() {
            Ok(Some(recording)) => recording,
            Ok(None) => return Err(self.fail_capture(CaptureError::NoAudio).await),
            Err(e) => return Err(self.fail_capture(e).await),
        };

        self.transition(SessionState::Stopped { recording }).await;
        self.recording().ok_or_else(|| self.reject("stop"))
    }

    async fn fail_capture(&mut self, e: CaptureError) -> SessionError {
        warn!("Session {}: capture ended without audio: {}", self.id, e);
        self.capture.release();
        self.state = SessionState::Idle;
        self.status.set_error(SessionPhase::Idle, e.to_string()).await;
        e.into()
    }

    /// Submits the held recording and runs the pipeline to completion.
    ///
    /// Transcription failures leave the session in `Error`. Extraction never
    /// fails, so a transcript always ends in `Ready`.
    pub async fn confirm(&mut self) -> Result<TaskCandidate, SessionError> {
        if !matches!(self.state, SessionState::Stopped { .. }) {
            return Err(self.reject("confirm"));
        }

        let SessionState::Stopped { recording } = self.transition(SessionState::Uploading).await
        else {
            return Err(self.reject("confirm"));
        };

        match self.run_pipeline(recording).await {
            Ok((transcript, candidate)) => {
                self.transition(SessionState::Ready {
                    transcript,
                    candidate: candidate.clone(),
                })
                .await;
                Ok(candidate)
            }
            Err(e) => {
                error!("Session {} failed ({}): {}", self.id, e.kind(), e);
                self.transition(SessionState::Error(e.clone())).await;
                Err(e.into())
            }
        }
    }

    async fn run_pipeline(
        &mut self,
        recording: AudioRecording,
    ) -> Result<(String, TaskCandidate), TranscriptionError> {
        let pipeline = Arc::clone(&self.pipeline);
        let cancel = self.cancel.clone();
        let transcriber = pipeline.transcriber();

        let audio_url = transcriber.upload(&recording, &cancel).await?;
        drop(recording);
        let job = transcriber.create_job(&audio_url, &cancel).await?;

        self.transition(SessionState::Polling {
            job_id: job.id.clone(),
        })
        .await;
        let transcript = transcriber.wait_for_text(job, &cancel).await?;

        self.transition(SessionState::Parsing {
            transcript: transcript.clone(),
        })
        .await;
        let candidate = pipeline.extract(&transcript).await;

        Ok((transcript, candidate))
    }

    /// Returns to `Idle` under a new session id, releasing the device and
    /// dropping any held recording or result.
    pub async fn reset(&mut self) {
        self.capture.release();
        if self.cancel.is_cancelled() {
            self.cancel = CancellationToken::new();
        }
        self.id = self.status.reset().await;
        self.state = SessionState::Idle;
        info!("Session reset, new session {}", self.id);
    }

    /// Ends the session, aborting any remote wait still holding its token.
    pub fn dispose(mut self) {
        debug!("Disposing session {}", self.id);
        self.cancel.cancel();
        self.capture.release();
    }
}

impl Drop for RecordingStateMachine {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioSource;
    use crate::extraction::{ExtractionError, GenerativeModel, IntentExtractor};
    use crate::task::Priority;
    use crate::transcription::{
        JobProvider, JobStatus, PollPolicy, TranscriptionJob, TranscriptionJobClient,
    };
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct FakeSource {
        active: bool,
        deny: bool,
        samples: Vec<f32>,
    }

    impl AudioSource for FakeSource {
        fn start(&mut self) -> Result<(), CaptureError> {
            if self.deny {
                return Err(CaptureError::Permission("denied by user".to_string()));
            }
            self.active = true;
            Ok(())
        }

        fn stop(&mut self) -> Result<Vec<f32>, CaptureError> {
            self.active = false;
            Ok(self.samples.clone())
        }

        fn is_active(&self) -> bool {
            self.active
        }

        fn sample_rate(&self) -> u32 {
            16000
        }
    }

    /// Provider whose job finishes on the first poll with `outcome`.
    struct OneShotProvider {
        outcome: TranscriptionJob,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl JobProvider for OneShotProvider {
        fn name(&self) -> &'static str {
            "one-shot"
        }

        async fn upload(&self, _recording: &AudioRecording) -> Result<String, TranscriptionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok("https://cdn.example/upload/1".to_string())
        }

        async fn create_job(&self, _audio_url: &str) -> Result<TranscriptionJob, TranscriptionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(TranscriptionJob {
                id: self.outcome.id.clone(),
                status: JobStatus::Queued,
                text: None,
                error: None,
            })
        }

        async fn fetch_job(&self, _job_id: &str) -> Result<TranscriptionJob, TranscriptionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.outcome.clone())
        }
    }

    struct FixedModel(&'static str);

    #[async_trait]
    impl GenerativeModel for FixedModel {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn generate(&self, _prompt: &str) -> Result<Vec<String>, ExtractionError> {
            Ok(vec![self.0.to_string()])
        }
    }

    fn completed(text: &str) -> TranscriptionJob {
        TranscriptionJob {
            id: "job-7".to_string(),
            status: JobStatus::Completed,
            text: Some(text.to_string()),
            error: None,
        }
    }

    fn failed(detail: &str) -> TranscriptionJob {
        TranscriptionJob {
            id: "job-7".to_string(),
            status: JobStatus::Error,
            text: None,
            error: Some(detail.to_string()),
        }
    }

    fn session(deny: bool, outcome: TranscriptionJob) -> (RecordingStateMachine, Arc<OneShotProvider>) {
        let provider = Arc::new(OneShotProvider {
            outcome,
            calls: AtomicUsize::new(0),
        });
        let pipeline = VoicePipeline::new(
            TranscriptionJobClient::new(
                provider.clone(),
                PollPolicy::fixed(Duration::from_millis(5), Duration::from_secs(2)),
            ),
            IntentExtractor::new(Arc::new(FixedModel(
                r#"{"title":"Buy milk","priority":"Low","status":"To Do","due_date":null}"#,
            ))),
        )
        .with_fixed_anchor(NaiveDate::from_ymd_opt(2025, 10, 23).unwrap());

        let capture = AudioCaptureController::new(Box::new(FakeSource {
            active: false,
            deny,
            samples: vec![0.25; 320],
        }));
        (
            RecordingStateMachine::new(capture, Arc::new(pipeline)),
            provider,
        )
    }

    #[tokio::test]
    async fn test_full_session_reaches_ready() {
        let (mut machine, provider) = session(false, completed("buy milk"));

        machine.start().await.unwrap();
        assert_eq!(machine.phase(), SessionPhase::Recording);

        let preview = machine.stop().await.unwrap();
        assert_eq!(preview.mime_type(), "audio/wav");
        assert_eq!(machine.phase(), SessionPhase::Stopped);
        assert!(machine.transcript().is_none());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);

        let candidate = machine.confirm().await.unwrap();
        assert_eq!(candidate.title, "Buy milk");
        assert_eq!(candidate.priority, Priority::Low);
        assert_eq!(machine.phase(), SessionPhase::Ready);
        assert_eq!(machine.candidate(), Some(&candidate));
        assert_eq!(machine.transcript(), Some("buy milk"));
        assert!(machine.recording().is_none());

        let status = machine.status().get().await;
        assert_eq!(status.phase, SessionPhase::Ready);
        assert_eq!(status.session_id, machine.id());
    }

    #[tokio::test]
    async fn test_permission_denied_stays_idle_without_network() {
        let (mut machine, provider) = session(true, completed("unused"));

        let err = machine.start().await.unwrap_err();
        assert_eq!(err.kind(), "permission_error");
        assert_eq!(machine.phase(), SessionPhase::Idle);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);

        let status = machine.status().get().await;
        assert_eq!(status.phase, SessionPhase::Idle);
        assert!(status.last_error.is_some());
    }

    #[tokio::test]
    async fn test_start_rejected_outside_idle_and_stopped() {
        let (mut machine, _) = session(false, completed("buy milk"));

        machine.start().await.unwrap();
        let err = machine.start().await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::InvalidTransition {
                phase: SessionPhase::Recording,
                action: "start"
            }
        ));

        machine.stop().await.unwrap();
        machine.confirm().await.unwrap();
        assert!(matches!(
            machine.start().await,
            Err(SessionError::InvalidTransition {
                phase: SessionPhase::Ready,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_restart_from_stopped_discards_recording() {
        let (mut machine, provider) = session(false, completed("buy milk"));

        machine.start().await.unwrap();
        machine.stop().await.unwrap();
        machine.start().await.unwrap();

        assert_eq!(machine.phase(), SessionPhase::Recording);
        assert!(machine.recording().is_none());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_confirm_requires_stopped() {
        let (mut machine, _) = session(false, completed("buy milk"));
        assert!(matches!(
            machine.confirm().await,
            Err(SessionError::InvalidTransition {
                phase: SessionPhase::Idle,
                action: "confirm"
            })
        ));
        assert!(matches!(
            machine.stop().await,
            Err(SessionError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_job_error_ends_in_error_then_reset() {
        let (mut machine, _) = session(false, failed("Audio duration is too short"));

        machine.start().await.unwrap();
        machine.stop().await.unwrap();
        let err = machine.confirm().await.unwrap_err();
        assert_eq!(err.kind(), "transcription_error");
        assert!(err.to_string().contains("Audio duration is too short"));
        assert_eq!(machine.phase(), SessionPhase::Error);
        assert!(machine.start().await.is_err());

        let old_id = machine.id();
        machine.reset().await;
        assert_eq!(machine.phase(), SessionPhase::Idle);
        assert_ne!(machine.id(), old_id);
        machine.start().await.unwrap();
    }

    #[tokio::test]
    async fn test_cancelled_session_skips_upload() {
        let (mut machine, provider) = session(false, completed("buy milk"));

        machine.start().await.unwrap();
        machine.stop().await.unwrap();
        machine.cancel_handle().cancel();

        let err = machine.confirm().await.unwrap_err();
        assert_eq!(err.kind(), "cancelled");
        assert_eq!(machine.phase(), SessionPhase::Error);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);

        machine.reset().await;
        assert!(!machine.cancel_handle().is_cancelled());
    }

    #[tokio::test]
    async fn test_silent_capture_returns_to_idle() {
        let provider = Arc::new(OneShotProvider {
            outcome: completed("unused"),
            calls: AtomicUsize::new(0),
        });
        let pipeline = VoicePipeline::new(
            TranscriptionJobClient::new(provider, PollPolicy::default()),
            IntentExtractor::new(Arc::new(FixedModel("{}"))),
        );
        let capture = AudioCaptureController::new(Box::new(FakeSource {
            active: false,
            deny: false,
            samples: Vec::new(),
        }));
        let mut machine = RecordingStateMachine::new(capture, Arc::new(pipeline));

        machine.start().await.unwrap();
        let err = machine.stop().await.unwrap_err();
        assert_eq!(err.kind(), "no_audio");
        assert_eq!(machine.phase(), SessionPhase::Idle);
    }

    #[tokio::test]
    async fn test_dispose_cancels_token() {
        let (machine, _) = session(false, completed("buy milk"));
        let token = machine.cancel_handle();
        machine.dispose();
        assert!(token.is_cancelled());
    }
}
