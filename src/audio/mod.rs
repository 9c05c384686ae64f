pub mod encoder;
pub mod file;
pub mod payload;
pub mod wav;

pub use encoder::{Encoder, FfmpegEncoder};
pub use file::RecordingInfo;
pub use payload::{decode_payload, fragment_sample_rate, is_wav_fragment, DecodedPayload};
pub use wav::{recording_spec, WavAssembler};
