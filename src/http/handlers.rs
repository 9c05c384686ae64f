use super::state::AppState;
use crate::error::{ErrorKind, FinalizeError};
use crate::recording::FinalizeOutcome;
use crate::session::{Chunk, SessionSummary};
use axum::{
    body::Bytes,
    extract::{multipart::MultipartRejection, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Multipart field carrying the audio bytes
const BLOB_FIELD: &str = "blob";

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct ChunkAccepted {
    pub status: String,
    pub chunk_index: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecordingSaved {
    pub status: String,
    pub filename: String,
    /// Same as `filename`; the name older recorders read
    pub wav_filename: String,
    pub chunks: usize,
    /// Server-side processing time in milliseconds
    pub process_time: f64,
    pub frames: u64,
    pub sample_rate: u32,
    pub duration_secs: f64,
}

impl From<&FinalizeOutcome> for RecordingSaved {
    fn from(outcome: &FinalizeOutcome) -> Self {
        let filename = outcome.path.display().to_string();
        Self {
            status: "ok".to_string(),
            wav_filename: filename.clone(),
            filename,
            chunks: outcome.chunks,
            process_time: outcome.process_time_ms(),
            frames: outcome.info.frames,
            sample_rate: outcome.info.sample_rate,
            duration_secs: outcome.info.duration_secs,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: String,
    pub message: String,
}

// ============================================================================
// Errors
// ============================================================================

/// Anything a handler can fail with; always rendered as an `ErrorResponse`
#[derive(Debug)]
pub enum ApiError {
    /// Missing or unparsable form field
    BadRequest(String),
    /// The multipart body itself was rejected (wrong content type, too large, ...)
    Rejected(StatusCode, String),
    Finalize(FinalizeError),
}

impl From<FinalizeError> for ApiError {
    fn from(e: FinalizeError) -> Self {
        ApiError::Finalize(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Rejected(status, message) => (status, message),
            ApiError::Finalize(e) => {
                let status = match e.kind() {
                    ErrorKind::NoChunks => StatusCode::NOT_FOUND,
                    ErrorKind::Encoding | ErrorKind::Io => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, e.to_string())
            }
        };

        (
            status,
            Json(ErrorResponse {
                status: "error".to_string(),
                message,
            }),
        )
            .into_response()
    }
}

// ============================================================================
// Form parsing
// ============================================================================

/// Every field of a multipart form: text fields by name, plus the blob
#[derive(Debug, Default)]
struct FormFields {
    text: HashMap<String, String>,
    blob: Option<Bytes>,
}

impl FormFields {
    async fn read(multipart: Result<Multipart, MultipartRejection>) -> Result<Self, ApiError> {
        let mut multipart =
            multipart.map_err(|rejection| ApiError::Rejected(rejection.status(), rejection.body_text()))?;
        let mut form = FormFields::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::Rejected(e.status(), e.body_text()))?
        {
            let Some(name) = field.name().map(str::to_owned) else {
                continue;
            };

            if name == BLOB_FIELD {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::Rejected(e.status(), e.body_text()))?;
                form.blob = Some(bytes);
            } else {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::Rejected(e.status(), e.body_text()))?;
                form.text.insert(name, value);
            }
        }

        Ok(form)
    }

    /// The id is opaque and used as sent; only a blank one is refused
    fn client_id(&self) -> Result<String, ApiError> {
        match self.text.get("client_id") {
            Some(id) if !id.trim().is_empty() => Ok(id.clone()),
            _ => Err(ApiError::BadRequest("missing field client_id".to_string())),
        }
    }

    fn required<T: FromStr>(&self, name: &str) -> Result<T, ApiError> {
        self.optional(name)?
            .ok_or_else(|| ApiError::BadRequest(format!("missing field {}", name)))
    }

    fn optional<T: FromStr>(&self, name: &str) -> Result<Option<T>, ApiError> {
        match self.text.get(name).map(|s| s.trim()) {
            None | Some("") => Ok(None),
            Some(raw) => raw
                .parse()
                .map(Some)
                .map_err(|_| ApiError::BadRequest(format!("invalid {}: {:?}", name, raw))),
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /audio
/// Buffer one chunk for a client
pub async fn upload_chunk(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ChunkAccepted>, ApiError> {
    let form = FormFields::read(multipart).await?;

    let client_id = form.client_id()?;
    let index: u64 = form.required("index")?;
    let created_at: Option<i64> = form.optional("created_at")?;
    let sample_rate: Option<u32> = form.optional("sample_rate")?;
    if sample_rate == Some(0) {
        return Err(ApiError::BadRequest("sample_rate must be positive".to_string()));
    }
    let blob = form
        .blob
        .ok_or_else(|| ApiError::BadRequest(format!("missing field {}", BLOB_FIELD)))?;

    let size = blob.len();
    let chunk = Chunk::new(index, blob.to_vec()).with_created_at(created_at);
    let latency_ms = chunk.latency_ms(Utc::now());

    let ack = state.store.append_chunk(&client_id, chunk, sample_rate);

    match latency_ms {
        Some(latency) => info!(
            "Chunk {}: client {}, size {} bytes, latency {}ms",
            index, client_id, size, latency
        ),
        None => info!("Chunk {}: client {}, size {} bytes", index, client_id, size),
    }
    debug!("Current chunks for client {}: {}", client_id, ack.chunk_count);

    Ok(Json(ChunkAccepted {
        status: "ok".to_string(),
        chunk_index: ack.index,
    }))
}

/// POST /audio_end
/// Finalize a client's stream into one recording
pub async fn end_stream(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<RecordingSaved>, ApiError> {
    let form = FormFields::read(multipart).await?;
    let client_id = form.client_id()?;

    debug!("Available clients: {:?}", state.store.client_ids());

    match state.finalizer.finalize(&client_id).await {
        Ok(outcome) => Ok(Json(RecordingSaved::from(&outcome))),
        Err(e) => {
            warn!("End request for client {} failed: {}", client_id, e);
            Err(e.into())
        }
    }
}

/// GET /sessions
/// Open sessions and how much each has buffered
pub async fn list_sessions(State(state): State<AppState>) -> Json<Vec<SessionSummary>> {
    Json(state.store.summaries())
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
