//! Audio decoding and silence analysis for normalized tracks.

pub mod silence;
pub mod wav;

pub use silence::{SilenceConfig, Span, calculate_rms, voiced_regions};
pub use wav::{decode_wav, encode_wav, read_wav_file};
