use chrono::Local;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info, warn};

use super::naming::{create_unique, recording_stem, scratch_stem, FileGuard};
use crate::audio::{fragment_sample_rate, Encoder, RecordingInfo, WavAssembler};
use crate::error::FinalizeError;
use crate::session::{ChunkStore, ClientSession};

/// Subdirectory the transcode strategy writes into
pub const TRANSCODE_SUBDIR: &str = "wav";

/// How a session's chunks become a file
#[derive(Clone)]
pub enum OutputMode {
    /// Payloads are PCM sample frames, written straight into a WAV container
    Wav,
    /// Payloads are encoded frames, concatenated then converted by the encoder
    Transcode(Arc<dyn Encoder>),
}

impl std::fmt::Debug for OutputMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputMode::Wav => f.write_str("Wav"),
            OutputMode::Transcode(encoder) => write!(f, "Transcode({})", encoder.name()),
        }
    }
}

/// What a successful finalize produced
#[derive(Debug, Clone)]
pub struct FinalizeOutcome {
    pub client_id: String,
    pub path: PathBuf,
    /// Chunks written, duplicates included
    pub chunks: usize,
    pub info: RecordingInfo,
    pub elapsed: Duration,
}

impl FinalizeOutcome {
    pub fn process_time_ms(&self) -> f64 {
        self.elapsed.as_secs_f64() * 1000.0
    }
}

/// Turns one client's buffered chunks into one recording.
///
/// The session is taken out of the store up front. It is only dropped once
/// the output file is complete; on any failure it goes back into the store
/// so the client can retry without re-uploading.
#[derive(Debug, Clone)]
pub struct SessionFinalizer {
    store: ChunkStore,
    recordings_dir: PathBuf,
    default_sample_rate: Option<u32>,
    mode: OutputMode,
}

impl SessionFinalizer {
    pub fn new(store: ChunkStore, recordings_dir: impl Into<PathBuf>, mode: OutputMode) -> Self {
        Self {
            store,
            recordings_dir: recordings_dir.into(),
            default_sample_rate: None,
            mode,
        }
    }

    /// Direct WAV write into `recordings_dir`
    pub fn direct(store: ChunkStore, recordings_dir: impl Into<PathBuf>) -> Self {
        Self::new(store, recordings_dir, OutputMode::Wav)
    }

    /// Concatenate and transcode into `recordings_dir/wav`
    pub fn transcoding(
        store: ChunkStore,
        recordings_dir: impl Into<PathBuf>,
        encoder: Arc<dyn Encoder>,
    ) -> Self {
        Self::new(store, recordings_dir, OutputMode::Transcode(encoder))
    }

    /// Rate assumed for raw PCM sessions that never reported one
    pub fn with_default_sample_rate(mut self, sample_rate: Option<u32>) -> Self {
        self.default_sample_rate = sample_rate;
        self
    }

    pub fn store(&self) -> &ChunkStore {
        &self.store
    }

    pub fn mode(&self) -> &OutputMode {
        &self.mode
    }

    /// Directory finished recordings land in
    pub fn output_dir(&self) -> PathBuf {
        match self.mode {
            OutputMode::Wav => self.recordings_dir.clone(),
            OutputMode::Transcode(_) => self.recordings_dir.join(TRANSCODE_SUBDIR),
        }
    }

    /// Create the output directory if needed
    pub fn prepare(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.output_dir())
    }

    /// Close a client's stream and write its recording
    pub async fn finalize(&self, client_id: &str) -> Result<FinalizeOutcome, FinalizeError> {
        let started = Instant::now();
        info!("Processing end request for client {}", client_id);

        let mut session = match self.store.take_session(client_id) {
            Some(session) => session,
            None => {
                warn!("No chunks found for client {}", client_id);
                return Err(FinalizeError::NoChunks(client_id.to_string()));
            }
        };

        session.sort_by_index();
        let chunk_count = session.chunks.len();
        info!(
            "Found {} chunks ({} bytes) for client {}",
            chunk_count,
            session.total_bytes(),
            client_id
        );

        let guard = SessionGuard::new(self.store.clone(), client_id, session);
        let written = match &self.mode {
            OutputMode::Wav => self.write_direct(client_id, guard.share()).await,
            OutputMode::Transcode(encoder) => {
                self.transcode(client_id, guard.session(), encoder.as_ref()).await
            }
        };

        match written {
            Ok((path, info)) => {
                debug!("Clearing chunks for client {}", client_id);
                guard.release();

                let outcome = FinalizeOutcome {
                    client_id: client_id.to_string(),
                    path,
                    chunks: chunk_count,
                    info,
                    elapsed: started.elapsed(),
                };
                info!(
                    "Saved recording for client {}: {} ({} frames, {:.2}s audio) in {:.1}ms",
                    client_id,
                    outcome.path.display(),
                    outcome.info.frames,
                    outcome.info.duration_secs,
                    outcome.process_time_ms()
                );
                Ok(outcome)
            }
            Err(e) => {
                error!("Finalize failed for client {}: {}", client_id, e);
                drop(guard);
                Err(e)
            }
        }
    }

    /// Pick the container sample rate: the session's own, then the first WAV
    /// fragment header, then the configured default.
    fn resolve_sample_rate(&self, client_id: &str, session: &ClientSession) -> Result<u32, FinalizeError> {
        session
            .sample_rate
            .or_else(|| {
                session
                    .chunks
                    .iter()
                    .find_map(|c| fragment_sample_rate(&c.payload))
            })
            .or(self.default_sample_rate)
            .ok_or_else(|| FinalizeError::MissingSampleRate(client_id.to_string()))
    }

    async fn write_direct(
        &self,
        client_id: &str,
        session: Arc<ClientSession>,
    ) -> Result<(PathBuf, RecordingInfo), FinalizeError> {
        let sample_rate = self.resolve_sample_rate(client_id, &session)?;
        let dir = self.output_dir();
        let stem = recording_stem(client_id, Local::now());

        tokio::task::spawn_blocking(move || write_wav(&dir, &stem, sample_rate, &session))
            .await
            .map_err(|e| FinalizeError::Task(e.to_string()))?
    }

    async fn transcode(
        &self,
        client_id: &str,
        session: &ClientSession,
        encoder: &dyn Encoder,
    ) -> Result<(PathBuf, RecordingInfo), FinalizeError> {
        let dir = self.output_dir();

        let (scratch_file, scratch_path) = create_unique(&dir, &scratch_stem(client_id), "webm")
            .map_err(|e| FinalizeError::io(&dir, e))?;
        // Removed on every path out of this function
        let scratch = FileGuard::new(scratch_path);

        info!("Creating temporary file: {}", scratch.path().display());
        let mut scratch_file = tokio::fs::File::from_std(scratch_file);
        for chunk in &session.chunks {
            scratch_file
                .write_all(&chunk.payload)
                .await
                .map_err(|e| FinalizeError::io(scratch.path(), e))?;
            debug!("Wrote chunk {} ({} bytes)", chunk.index, chunk.payload.len());
        }
        scratch_file
            .flush()
            .await
            .map_err(|e| FinalizeError::io(scratch.path(), e))?;
        drop(scratch_file);

        let (_, output_path) = create_unique(&dir, &recording_stem(client_id, Local::now()), "wav")
            .map_err(|e| FinalizeError::io(&dir, e))?;
        let output = FileGuard::new(output_path);

        encoder.encode(scratch.path(), output.path()).await?;

        let info = probe(output.path())?;
        Ok((output.keep(), info))
    }
}

/// A session taken out of the store for finalizing.
///
/// Goes back into the store on drop unless released, so an error or a
/// cancelled finalize future never loses buffered chunks.
struct SessionGuard {
    store: ChunkStore,
    client_id: String,
    session: Arc<ClientSession>,
    released: bool,
}

impl SessionGuard {
    fn new(store: ChunkStore, client_id: &str, session: ClientSession) -> Self {
        Self {
            store,
            client_id: client_id.to_string(),
            session: Arc::new(session),
            released: false,
        }
    }

    fn session(&self) -> &ClientSession {
        &self.session
    }

    /// Handle for work that may outlive this future, like a blocking task
    fn share(&self) -> Arc<ClientSession> {
        Arc::clone(&self.session)
    }

    /// The output is complete; let the chunks go
    fn release(mut self) {
        self.released = true;
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let shared = std::mem::take(&mut self.session);
        let session = Arc::try_unwrap(shared).unwrap_or_else(|shared| (*shared).clone());
        warn!(
            "Restoring {} chunks for client {}",
            session.chunks.len(),
            self.client_id
        );
        self.store.restore_session(&self.client_id, session);
    }
}

/// Blocking half of the direct strategy
fn write_wav(
    dir: &Path,
    stem: &str,
    sample_rate: u32,
    session: &ClientSession,
) -> Result<(PathBuf, RecordingInfo), FinalizeError> {
    let (file, path) = create_unique(dir, stem, "wav").map_err(|e| FinalizeError::io(dir, e))?;
    let output = FileGuard::new(path);

    let mut assembler = WavAssembler::new(file, output.path(), sample_rate)?;
    for chunk in &session.chunks {
        assembler.append_payload(chunk.index, &chunk.payload)?;
    }
    let frames = assembler.finish()?;

    let info = probe(output.path())?;
    debug_assert_eq!(info.frames, frames);

    Ok((output.keep(), info))
}

fn probe(path: &Path) -> Result<RecordingInfo, FinalizeError> {
    RecordingInfo::probe(path).map_err(|source| FinalizeError::Container {
        path: path.to_path_buf(),
        source,
    })
}
