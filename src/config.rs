use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Environment variables override file settings, e.g.
/// `AUDIO_SINK__OUTPUT__STRATEGY=transcode`
const ENV_PREFIX: &str = "AUDIO_SINK";
const ENV_SEPARATOR: &str = "__";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub audio: AudioConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
    /// Largest accepted upload body
    pub max_chunk_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    /// Output root; `~` is expanded
    pub recordings_path: String,
    /// Used for raw PCM sessions that never reported a sample rate
    #[serde(default)]
    pub default_sample_rate: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    pub strategy: OutputStrategy,
    pub ffmpeg: FfmpegConfig,
}

/// How a finalized session becomes a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStrategy {
    /// Chunks are raw PCM (or WAV fragments) written straight into a WAV container
    Wav,
    /// Chunks are encoded frames, concatenated and converted by ffmpeg
    Transcode,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FfmpegConfig {
    pub binary: String,
    pub sample_rate: u32,
}

impl Config {
    /// Load `path` (any format the config crate knows, extension optional)
    /// over built-in defaults, then apply environment overrides.
    /// A missing file is not an error.
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .set_default("service.name", "audio-sink")?
            .set_default("service.http.bind", "0.0.0.0")?
            .set_default("service.http.port", 8765_i64)?
            .set_default("service.http.max_chunk_bytes", 16_i64 * 1024 * 1024)?
            .set_default("audio.recordings_path", "recordings")?
            .set_default("output.strategy", "wav")?
            .set_default("output.ffmpeg.binary", "ffmpeg")?
            .set_default("output.ffmpeg.sample_rate", 44100_i64)?
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator(ENV_SEPARATOR))
            .build()
            .with_context(|| format!("Failed to read configuration from {}", path))?;

        settings
            .try_deserialize()
            .context("Invalid configuration")
    }

    /// Recordings root with `~` expanded
    pub fn recordings_dir(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.audio.recordings_path).as_ref())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.service.http.bind, self.service.http.port)
    }
}
