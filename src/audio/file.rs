use hound::WavReader;
use serde::Serialize;
use std::path::Path;

/// Header facts about a finished recording
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordingInfo {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    /// Sample frames declared by the header
    pub frames: u64,
    pub duration_secs: f64,
}

impl RecordingInfo {
    /// Read a WAV header without loading the samples
    pub fn probe(path: impl AsRef<Path>) -> hound::Result<Self> {
        let reader = WavReader::open(path.as_ref())?;
        let spec = reader.spec();
        let frames = u64::from(reader.duration());

        Ok(Self {
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            bits_per_sample: spec.bits_per_sample,
            frames,
            duration_secs: frames as f64 / f64::from(spec.sample_rate),
        })
    }

    /// Size of the sample data in bytes
    pub fn data_bytes(&self) -> u64 {
        self.frames * u64::from(self.channels) * u64::from(self.bits_per_sample / 8)
    }
}
