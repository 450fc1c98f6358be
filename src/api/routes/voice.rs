//! Voice submission endpoint.
//!
//! `POST /process-voice` takes a multipart form with an `audio` file field and
//! answers with the transcript and the extracted task candidate.

use axum::{
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, State},
    response::Json,
    routing::post,
    Router,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::error::{ApiError, ApiResult};
use crate::audio::{AudioRecording, DEFAULT_MIME_TYPE};
use crate::pipeline::{VoiceOutcome, VoicePipeline};

pub const AUDIO_FIELD: &str = "audio";
const NO_AUDIO: &str = "No audio file provided";

/// Creates the voice router. `max_upload_bytes` bounds the request body.
pub fn router(pipeline: Arc<VoicePipeline>, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/process-voice", post(process_voice))
        .route("/api/process-voice", post(process_voice))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(pipeline)
}

/// Runs transcription and extraction for one uploaded recording.
///
/// # Response
/// - `200` `{ "transcript": string, "parsedData": TaskCandidate }`
/// - `400` `{ "error": string }` when the `audio` field is missing or empty
/// - `500` `{ "error": string }` when transcription fails
async fn process_voice(
    State(pipeline): State<Arc<VoicePipeline>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<VoiceOutcome>> {
    let mut multipart = multipart.map_err(|e| {
        warn!("Rejected voice upload: {}", e);
        ApiError::bad_request(NO_AUDIO)
    })?;

    let recording = read_audio_field(&mut multipart)
        .await?
        .ok_or_else(|| ApiError::bad_request(NO_AUDIO))?;

    info!(
        "Voice upload received: {} bytes of {}",
        recording.len(),
        recording.mime_type()
    );

    // Dropping the request future drops the poll loop along with it.
    let cancel = CancellationToken::new();
    let outcome = pipeline.process(&recording, &cancel).await?;
    Ok(Json(outcome))
}

async fn read_audio_field(multipart: &mut Multipart) -> ApiResult<Option<AudioRecording>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::new(e.status(), e.body_text()))?
    {
        if field.name() != Some(AUDIO_FIELD) {
            debug!("Ignoring multipart field {:?}", field.name());
            continue;
        }

        let mime_type = field
            .content_type()
            .filter(|ct| !ct.is_empty() && *ct != "application/octet-stream")
            .unwrap_or(DEFAULT_MIME_TYPE)
            .to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::new(e.status(), e.body_text()))?;

        if data.is_empty() {
            return Ok(None);
        }
        return Ok(Some(AudioRecording::new(data.to_vec(), mime_type)));
    }
    Ok(None)
}
