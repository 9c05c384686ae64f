//! HTTP API for streaming recorders
//!
//! - POST /audio - Upload one chunk (multipart: client_id, index, created_at, blob, sample_rate)
//! - POST /audio_end - Finalize a client's stream into a recording (multipart: client_id)
//! - GET /sessions - List open sessions
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use handlers::{ChunkAccepted, ErrorResponse, RecordingSaved};
pub use routes::create_router;
pub use state::{AppState, DEFAULT_MAX_CHUNK_BYTES};
