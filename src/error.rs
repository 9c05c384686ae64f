use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failure reported by an [`Encoder`](crate::audio::Encoder).
#[derive(Debug, Error)]
pub enum EncodeError {
    /// The transcoder process could not be started
    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    /// The transcoder ran and exited non-zero
    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },
}

/// A chunk payload that cannot be turned into 16-bit mono sample frames.
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("chunk {index}: raw PCM payload has odd length {len}")]
    OddLength { index: u64, len: usize },

    #[error("chunk {index}: WAV fragment must be mono 16-bit PCM, got {channels}ch {bits}-bit")]
    UnsupportedFormat { index: u64, channels: u16, bits: u16 },

    #[error("chunk {index}: WAV fragment at {found}Hz does not match {expected}Hz")]
    SampleRateMismatch { index: u64, expected: u32, found: u32 },

    #[error("chunk {index}: malformed WAV fragment: {source}")]
    Malformed {
        index: u64,
        #[source]
        source: hound::Error,
    },
}

/// Every way a finalize can fail.
///
/// `NoChunks` is the caller's problem. The rest are reported as server-side
/// failures, but all of them reach the client as a structured error body.
#[derive(Debug, Error)]
pub enum FinalizeError {
    /// Client unknown or already finalized
    #[error("No audio chunks found for client {0}")]
    NoChunks(String),

    /// Neither the session, its fragments, nor the config supplied a rate
    #[error("no sample rate recorded for client {0}")]
    MissingSampleRate(String),

    #[error(transparent)]
    Payload(#[from] PayloadError),

    #[error("transcode failed: {0}")]
    Encode(#[from] EncodeError),

    /// WAV container write failed
    #[error("failed to write {path}: {source}")]
    Container {
        path: PathBuf,
        #[source]
        source: hound::Error,
    },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The blocking writer task panicked or was cancelled
    #[error("writer task failed: {0}")]
    Task(String),
}

/// Coarse class of a [`FinalizeError`], used to pick the HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NoChunks,
    Encoding,
    Io,
}

impl FinalizeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FinalizeError::NoChunks(_) => ErrorKind::NoChunks,
            FinalizeError::MissingSampleRate(_)
            | FinalizeError::Payload(_)
            | FinalizeError::Encode(_)
            | FinalizeError::Container { .. } => ErrorKind::Encoding,
            FinalizeError::Io { .. } | FinalizeError::Task(_) => ErrorKind::Io,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        FinalizeError::Io {
            path: path.into(),
            source,
        }
    }
}
