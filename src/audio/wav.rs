use hound::{SampleFormat, WavSpec, WavWriter};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::payload::decode_payload;
use crate::error::{FinalizeError, PayloadError};

/// Container format of every direct-write recording: mono, 16-bit linear PCM
pub fn recording_spec(sample_rate: u32) -> WavSpec {
    WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    }
}

/// Writes a client's chunks, in order, into one WAV file
pub struct WavAssembler {
    writer: Option<WavWriter<BufWriter<File>>>,
    path: PathBuf,
    sample_rate: u32,
    frames: u64,
}

impl WavAssembler {
    /// Start a container on an already-created, empty file
    pub fn new(file: File, path: &Path, sample_rate: u32) -> Result<Self, FinalizeError> {
        let writer = WavWriter::new(BufWriter::new(file), recording_spec(sample_rate))
            .map_err(|source| FinalizeError::Container {
                path: path.to_path_buf(),
                source,
            })?;

        Ok(Self {
            writer: Some(writer),
            path: path.to_path_buf(),
            sample_rate,
            frames: 0,
        })
    }

    /// Decode one chunk payload and append its frames
    pub fn append_payload(&mut self, index: u64, payload: &[u8]) -> Result<(), FinalizeError> {
        let decoded = decode_payload(index, payload)?;

        if let Some(found) = decoded.sample_rate {
            if found != self.sample_rate {
                return Err(PayloadError::SampleRateMismatch {
                    index,
                    expected: self.sample_rate,
                    found,
                }
                .into());
            }
        }

        self.write_samples(&decoded.samples)?;

        debug!(
            "Wrote chunk {} ({} bytes, {} frames)",
            index,
            payload.len(),
            decoded.samples.len()
        );

        Ok(())
    }

    fn write_samples(&mut self, samples: &[i16]) -> Result<(), FinalizeError> {
        if let Some(writer) = &mut self.writer {
            for &sample in samples {
                writer
                    .write_sample(sample)
                    .map_err(|source| FinalizeError::Container {
                        path: self.path.clone(),
                        source,
                    })?;
            }
            self.frames += samples.len() as u64;
        }

        Ok(())
    }

    /// Patch the header sizes and close the file. Returns the frame count.
    pub fn finish(mut self) -> Result<u64, FinalizeError> {
        if let Some(writer) = self.writer.take() {
            writer.finalize().map_err(|source| FinalizeError::Container {
                path: self.path.clone(),
                source,
            })?;
        }

        Ok(self.frames)
    }
}

impl Drop for WavAssembler {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.take() {
            if let Err(e) = writer.finalize() {
                warn!("Failed to finalize WAV writer on drop: {}", e);
            }
        }
    }
}
