use chrono::{DateTime, Utc};

/// One uploaded fragment of a client's stream
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Caller-assigned sequence index (not validated for contiguity)
    pub index: u64,

    /// Raw fragment bytes as uploaded
    pub payload: Vec<u8>,

    /// Client-side creation time in epoch millis, if the uploader sent one
    pub created_at_ms: Option<i64>,
}

impl Chunk {
    pub fn new(index: u64, payload: Vec<u8>) -> Self {
        Self {
            index,
            payload,
            created_at_ms: None,
        }
    }

    pub fn with_created_at(mut self, created_at_ms: Option<i64>) -> Self {
        self.created_at_ms = created_at_ms;
        self
    }

    /// Upload latency against the client's clock, if known
    pub fn latency_ms(&self, now: DateTime<Utc>) -> Option<i64> {
        self.created_at_ms
            .map(|created| now.timestamp_millis() - created)
    }
}

/// Everything accumulated for one client id between its first upload and finalize
#[derive(Debug, Clone)]
pub struct ClientSession {
    /// Chunks in arrival order; reassembly sorts by `index`
    pub chunks: Vec<Chunk>,

    /// Last sample rate any upload reported
    pub sample_rate: Option<u32>,

    /// When the first chunk arrived
    pub created_at: DateTime<Utc>,
}

impl ClientSession {
    pub fn new() -> Self {
        Self {
            chunks: Vec::new(),
            sample_rate: None,
            created_at: Utc::now(),
        }
    }

    pub fn total_bytes(&self) -> usize {
        self.chunks.iter().map(|c| c.payload.len()).sum()
    }

    /// Put chunks in reassembly order.
    ///
    /// The sort is stable: duplicate indices are both kept, in the order
    /// they were appended.
    pub fn sort_by_index(&mut self) {
        self.chunks.sort_by_key(|c| c.index);
    }
}

impl Default for ClientSession {
    fn default() -> Self {
        Self::new()
    }
}
