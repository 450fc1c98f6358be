//! Parsing of the model's reply into a `TaskCandidate`.

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::dates::reconcile_due_date;
use super::ExtractionError;
use crate::task::{Priority, TaskCandidate, TaskStatus};

/// Fields as the model returned them, before validation.
#[derive(Debug, Deserialize)]
struct RawCandidate {
    title: Option<String>,
    description: Option<String>,
    due_date: Option<Value>,
    priority: Option<String>,
    status: Option<String>,
}

/// Removes markdown code-fence markers the model may wrap its JSON in.
pub fn strip_code_fences(text: &str) -> String {
    text.replace("```json", "")
        .replace("```JSON", "")
        .replace("```", "")
        .trim()
        .to_string()
}

/// Parses fenced or bare JSON text into a validated candidate.
pub fn parse_candidate(
    text: &str,
    transcript: &str,
    anchor: NaiveDate,
) -> Result<TaskCandidate, ExtractionError> {
    let clean = strip_code_fences(text);
    debug!("Model response JSON: {}", clean);

    let raw: RawCandidate =
        serde_json::from_str(&clean).map_err(|e| ExtractionError::Parse(e.to_string()))?;

    let title = raw
        .title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or(ExtractionError::MissingField("title"))?;

    let description = raw
        .description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty());

    let due_date_text = match raw.due_date {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    };
    let due_date = reconcile_due_date(due_date_text.as_deref(), transcript, anchor);

    let priority = raw
        .priority
        .as_deref()
        .and_then(Priority::from_label)
        .unwrap_or_default();

    let status = raw
        .status
        .as_deref()
        .and_then(TaskStatus::from_label)
        .unwrap_or_default();

    Ok(TaskCandidate {
        title,
        description,
        due_date,
        priority,
        status,
    })
}
