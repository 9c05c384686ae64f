use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info};

use super::session::{Chunk, ClientSession};
use super::stats::SessionSummary;

/// Acknowledgment returned for every accepted chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendAck {
    /// Index the uploader sent
    pub index: u64,
    /// Chunks held for this client after the append
    pub chunk_count: usize,
}

/// Process-wide chunk buffers, keyed by client id.
///
/// Each client id owns one entry. An append and a take for the same id both
/// hold that entry's shard lock for their whole duration, so a take observes
/// an append completely or not at all. Unrelated ids only contend when they
/// hash to the same shard.
#[derive(Debug, Clone, Default)]
pub struct ChunkStore {
    sessions: Arc<DashMap<String, ClientSession>>,
}

impl ChunkStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk, creating the client's session if it has none.
    ///
    /// `sample_rate`, when given, replaces whatever the session held.
    pub fn append_chunk(&self, client_id: &str, chunk: Chunk, sample_rate: Option<u32>) -> AppendAck {
        let index = chunk.index;
        let mut session = self
            .sessions
            .entry(client_id.to_string())
            .or_insert_with(|| {
                info!("New session for client {}", client_id);
                ClientSession::new()
            });

        session.chunks.push(chunk);
        if let Some(rate) = sample_rate {
            session.sample_rate = Some(rate);
        }

        AppendAck {
            index,
            chunk_count: session.chunks.len(),
        }
    }

    /// Remove and return the client's whole session.
    ///
    /// Any upload after this call starts a fresh session.
    pub fn take_session(&self, client_id: &str) -> Option<ClientSession> {
        self.sessions.remove(client_id).map(|(_, session)| session)
    }

    /// Put a taken session back after a failed finalize.
    ///
    /// Chunks uploaded while the session was out are kept after the restored
    /// ones. A sample rate set by those uploads wins over the restored one.
    pub fn restore_session(&self, client_id: &str, restored: ClientSession) {
        match self.sessions.entry(client_id.to_string()) {
            Entry::Occupied(mut entry) => {
                let newer = entry.get_mut();
                debug!(
                    "Merging {} restored chunks ahead of {} new ones for client {}",
                    restored.chunks.len(),
                    newer.chunks.len(),
                    client_id
                );
                let arrived_meanwhile = std::mem::replace(&mut newer.chunks, restored.chunks);
                newer.chunks.extend(arrived_meanwhile);
                newer.sample_rate = newer.sample_rate.or(restored.sample_rate);
                newer.created_at = restored.created_at;
            }
            Entry::Vacant(entry) => {
                entry.insert(restored);
            }
        }
    }

    pub fn chunk_count(&self, client_id: &str) -> Option<usize> {
        self.sessions.get(client_id).map(|s| s.chunks.len())
    }

    pub fn contains(&self, client_id: &str) -> bool {
        self.sessions.contains_key(client_id)
    }

    pub fn client_ids(&self) -> Vec<String> {
        self.sessions.iter().map(|e| e.key().clone()).collect()
    }

    /// Snapshot of every open session, sorted by client id
    pub fn summaries(&self) -> Vec<SessionSummary> {
        let mut summaries: Vec<SessionSummary> = self
            .sessions
            .iter()
            .map(|e| SessionSummary::of(e.key(), e.value()))
            .collect();
        summaries.sort_by(|a, b| a.client_id.cmp(&b.client_id));
        summaries
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
