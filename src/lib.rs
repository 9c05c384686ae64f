pub mod audio;
pub mod config;
pub mod error;
pub mod http;
pub mod recording;
pub mod session;

pub use audio::{Encoder, FfmpegEncoder, RecordingInfo, WavAssembler};
pub use config::{Config, OutputStrategy};
pub use error::{EncodeError, ErrorKind, FinalizeError, PayloadError};
pub use http::{create_router, AppState};
pub use recording::{FinalizeOutcome, OutputMode, SessionFinalizer};
pub use session::{AppendAck, Chunk, ChunkStore, ClientSession, SessionSummary};
