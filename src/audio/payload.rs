// Chunk payload decoding
//
// Uploaders send either raw little-endian 16-bit mono PCM, or self-contained
// WAV fragments (a browser AudioWorklet wraps every second of audio in its own
// RIFF header). Both decode to a run of i16 sample frames.

use hound::{SampleFormat, WavReader};
use std::io::Cursor;

use crate::error::PayloadError;

/// Sample frames recovered from one chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedPayload {
    pub samples: Vec<i16>,
    /// Rate from the fragment's own header (WAV fragments only)
    pub sample_rate: Option<u32>,
}

/// True if the bytes start with a RIFF/WAVE header
pub fn is_wav_fragment(bytes: &[u8]) -> bool {
    bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE"
}

/// Read only the header of a WAV fragment and return its sample rate
pub fn fragment_sample_rate(bytes: &[u8]) -> Option<u32> {
    if !is_wav_fragment(bytes) {
        return None;
    }
    WavReader::new(Cursor::new(bytes))
        .ok()
        .map(|reader| reader.spec().sample_rate)
}

/// Decode one chunk's payload into sample frames
pub fn decode_payload(index: u64, bytes: &[u8]) -> Result<DecodedPayload, PayloadError> {
    if is_wav_fragment(bytes) {
        decode_wav_fragment(index, bytes)
    } else {
        decode_raw_pcm(index, bytes)
    }
}

fn decode_raw_pcm(index: u64, bytes: &[u8]) -> Result<DecodedPayload, PayloadError> {
    if bytes.len() % 2 != 0 {
        return Err(PayloadError::OddLength {
            index,
            len: bytes.len(),
        });
    }

    let samples = bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect();

    Ok(DecodedPayload {
        samples,
        sample_rate: None,
    })
}

fn decode_wav_fragment(index: u64, bytes: &[u8]) -> Result<DecodedPayload, PayloadError> {
    let reader = WavReader::new(Cursor::new(bytes))
        .map_err(|source| PayloadError::Malformed { index, source })?;

    let spec = reader.spec();
    if spec.channels != 1 || spec.bits_per_sample != 16 || spec.sample_format != SampleFormat::Int {
        return Err(PayloadError::UnsupportedFormat {
            index,
            channels: spec.channels,
            bits: spec.bits_per_sample,
        });
    }

    let samples = reader
        .into_samples::<i16>()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| PayloadError::Malformed { index, source })?;

    Ok(DecodedPayload {
        samples,
        sample_rate: Some(spec.sample_rate),
    })
}
