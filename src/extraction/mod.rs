//! Intent extraction: transcript in, task candidate out.
//!
//! `IntentExtractor::try_extract_at` is the fallible happy path. `degrade` turns
//! any of its failures into the fallback candidate, so `extract` never fails once
//! a transcript exists.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::task::TaskCandidate;

pub mod dates;
pub mod gemini;
pub mod prompt;
pub mod response;

pub use dates::{DueDate, DueDateParseError, NamedWeekday};
pub use gemini::{GeminiModel, Sampling};
pub use prompt::build_extraction_prompt;

#[derive(Debug, Clone, Error)]
pub enum ExtractionError {
    #[error("Model call failed: {0}")]
    Model(String),

    #[error("Model returned no candidates")]
    NoCandidate,

    #[error("Model output is not a valid task object: {0}")]
    Parse(String),

    #[error("Model output is missing required field '{0}'")]
    MissingField(&'static str),
}

impl ExtractionError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Model(_) => "model_error",
            Self::NoCandidate => "no_candidate",
            Self::Parse(_) => "parse_error",
            Self::MissingField(_) => "missing_field",
        }
    }
}

/// A generative text model that answers a single prompt with zero or more
/// candidate completions.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, prompt: &str) -> Result<Vec<String>, ExtractionError>;
}

/// Today's date in the local time zone, used as the anchor for relative dates.
pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

/// Converts an extraction failure into the fallback candidate for `transcript`.
pub fn degrade(
    result: Result<TaskCandidate, ExtractionError>,
    transcript: &str,
) -> TaskCandidate {
    match result {
        Ok(candidate) => candidate,
        Err(e) => {
            warn!(
                "Extraction degraded to raw transcript ({}): {}",
                e.kind(),
                e
            );
            TaskCandidate::fallback(transcript)
        }
    }
}

pub struct IntentExtractor {
    model: Arc<dyn GenerativeModel>,
}

impl IntentExtractor {
    pub fn new(model: Arc<dyn GenerativeModel>) -> Self {
        Self { model }
    }

    /// Extracts a candidate anchored to today's date. Never fails.
    pub async fn extract(&self, transcript: &str) -> TaskCandidate {
        self.extract_at(transcript, today()).await
    }

    /// Extracts a candidate anchored to `anchor`. Never fails.
    pub async fn extract_at(&self, transcript: &str, anchor: NaiveDate) -> TaskCandidate {
        degrade(self.try_extract_at(transcript, anchor).await, transcript)
    }

    pub async fn try_extract_at(
        &self,
        transcript: &str,
        anchor: NaiveDate,
    ) -> Result<TaskCandidate, ExtractionError> {
        info!("Parsing transcript with {}", self.model.name());

        let prompt = build_extraction_prompt(transcript, anchor);
        let candidates = self.model.generate(&prompt).await?;
        let first = candidates
            .into_iter()
            .next()
            .ok_or(ExtractionError::NoCandidate)?;

        response::parse_candidate(&first, transcript, anchor)
    }
}
