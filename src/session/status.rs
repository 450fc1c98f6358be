//! Session status types and shared state handle.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Phase of a recording session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    Idle,
    Recording,
    Stopped,
    Uploading,
    Polling,
    Parsing,
    Ready,
    Error,
}

impl SessionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Recording => "recording",
            Self::Stopped => "stopped",
            Self::Uploading => "uploading",
            Self::Polling => "polling",
            Self::Parsing => "parsing",
            Self::Ready => "ready",
            Self::Error => "error",
        }
    }

    /// True while the pipeline is working on a confirmed recording.
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Uploading | Self::Polling | Self::Parsing)
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current session state, readable by a UI while a stage is suspended.
#[derive(Debug, Clone)]
pub struct SessionStatus {
    pub session_id: Uuid,
    pub phase: SessionPhase,
    pub last_error: Option<String>,
}

impl Default for SessionStatus {
    fn default() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            phase: SessionPhase::Idle,
            last_error: None,
        }
    }
}

#[derive(Clone, Default)]
pub struct SessionStatusHandle {
    inner: Arc<Mutex<SessionStatus>>,
}

impl SessionStatusHandle {
    pub fn new(session_id: Uuid) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SessionStatus {
                session_id,
                ..SessionStatus::default()
            })),
        }
    }

    pub async fn get(&self) -> SessionStatus {
        self.inner.lock().await.clone()
    }

    pub async fn set_phase(&self, phase: SessionPhase) {
        let mut status = self.inner.lock().await;
        status.phase = phase;
        if phase != SessionPhase::Error {
            status.last_error = None;
        }
    }

    /// Records a failure without leaving `phase`.
    pub async fn set_error(&self, phase: SessionPhase, error: String) {
        let mut status = self.inner.lock().await;
        status.phase = phase;
        status.last_error = Some(error);
    }

    /// Starts a fresh session id in the `Idle` phase.
    pub async fn reset(&self) -> Uuid {
        let mut status = self.inner.lock().await;
        *status = SessionStatus::default();
        status.session_id
    }
}
