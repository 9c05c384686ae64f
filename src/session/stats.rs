use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::session::ClientSession;

/// Point-in-time view of one open session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    /// Client id the session is keyed by
    pub client_id: String,

    /// Number of chunks buffered so far (duplicates included)
    pub chunks: usize,

    /// Sum of all payload sizes
    pub total_bytes: usize,

    /// Last sample rate reported by an upload
    pub sample_rate: Option<u32>,

    /// When the first chunk arrived
    pub started_at: DateTime<Utc>,

    /// Seconds since the first chunk
    pub age_secs: f64,
}

impl SessionSummary {
    pub fn of(client_id: &str, session: &ClientSession) -> Self {
        let age = Utc::now().signed_duration_since(session.created_at);

        Self {
            client_id: client_id.to_string(),
            chunks: session.chunks.len(),
            total_bytes: session.total_bytes(),
            sample_rate: session.sample_rate,
            started_at: session.created_at,
            age_secs: age.num_milliseconds() as f64 / 1000.0,
        }
    }
}
