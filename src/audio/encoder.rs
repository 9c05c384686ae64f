use async_trait::async_trait;
use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::EncodeError;

/// Lines of transcoder stderr kept in an error message
const STDERR_TAIL_LINES: usize = 12;

/// Converts one audio file into another.
///
/// Implementations:
/// - `FfmpegEncoder`: spawns ffmpeg, output is 16-bit PCM WAV
/// - test doubles that copy or fail
#[async_trait]
pub trait Encoder: Send + Sync {
    /// Read `input`, write `output`, overwriting it if it exists
    async fn encode(&self, input: &Path, output: &Path) -> Result<(), EncodeError>;

    /// Encoder name for logging
    fn name(&self) -> &str;
}

/// Transcodes through an external ffmpeg binary
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    binary: String,
    sample_rate: u32,
}

impl FfmpegEncoder {
    pub fn new(binary: impl Into<String>, sample_rate: u32) -> Self {
        Self {
            binary: binary.into(),
            sample_rate,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Fixed argument list: PCM s16le at the configured rate, overwrite output
    pub fn args(&self, input: &Path, output: &Path) -> Vec<OsString> {
        vec![
            "-i".into(),
            input.as_os_str().to_owned(),
            "-acodec".into(),
            "pcm_s16le".into(),
            "-ar".into(),
            self.sample_rate.to_string().into(),
            "-y".into(),
            output.as_os_str().to_owned(),
        ]
    }
}

impl Default for FfmpegEncoder {
    fn default() -> Self {
        Self::new("ffmpeg", 44100)
    }
}

#[async_trait]
impl Encoder for FfmpegEncoder {
    async fn encode(&self, input: &Path, output: &Path) -> Result<(), EncodeError> {
        info!(
            "Transcoding {} -> {} ({}Hz)",
            input.display(),
            output.display(),
            self.sample_rate
        );

        let result = Command::new(&self.binary)
            .args(self.args(input, output))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| EncodeError::Spawn {
                program: self.binary.clone(),
                source,
            })?;

        if !result.status.success() {
            return Err(EncodeError::Failed {
                program: self.binary.clone(),
                status: result.status.to_string(),
                stderr: stderr_tail(&result.stderr),
            });
        }

        debug!("{} finished: {}", self.binary, result.status);
        Ok(())
    }

    fn name(&self) -> &str {
        &self.binary
    }
}

/// Last few non-empty lines of a process's stderr
fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}
