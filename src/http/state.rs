use crate::recording::SessionFinalizer;
use crate::session::ChunkStore;
use std::sync::Arc;

/// Default upload body limit (16 MiB)
pub const DEFAULT_MAX_CHUNK_BYTES: usize = 16 * 1024 * 1024;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Per-client chunk buffers (client_id → session)
    pub store: ChunkStore,

    /// Writes recordings; shares `store`
    pub finalizer: Arc<SessionFinalizer>,

    /// Largest accepted request body
    pub max_chunk_bytes: usize,
}

impl AppState {
    pub fn new(finalizer: SessionFinalizer) -> Self {
        Self {
            store: finalizer.store().clone(),
            finalizer: Arc::new(finalizer),
            max_chunk_bytes: DEFAULT_MAX_CHUNK_BYTES,
        }
    }

    pub fn with_max_chunk_bytes(mut self, max_chunk_bytes: usize) -> Self {
        self.max_chunk_bytes = max_chunk_bytes;
        self
    }
}
