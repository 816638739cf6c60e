//! WAV decoding and encoding for normalized tracks and recognition segments.

use crate::defaults::{CHANNELS, SAMPLE_RATE};
use crate::error::{AlignError, Result};
use std::io::{Cursor, Read};
use std::path::Path;

/// Decode WAV data into 16 kHz mono samples.
///
/// Normalized tracks are already canonical; other rates and stereo input are
/// downmixed and resampled so hand-made fixtures work too.
pub fn decode_wav<R: Read>(reader: R) -> Result<Vec<i16>> {
    let mut wav_reader = hound::WavReader::new(reader).map_err(|e| AlignError::AudioDecode {
        message: format!("Failed to parse WAV data: {}", e),
    })?;

    let spec = wav_reader.spec();
    if spec.bits_per_sample != 16 || spec.sample_format != hound::SampleFormat::Int {
        return Err(AlignError::AudioDecode {
            message: format!(
                "Expected 16-bit integer PCM, got {}-bit {:?}",
                spec.bits_per_sample, spec.sample_format
            ),
        });
    }

    let raw_samples: Vec<i16> = wav_reader
        .samples::<i16>()
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| AlignError::AudioDecode {
            message: format!("Failed to read WAV samples: {}", e),
        })?;

    let mono = downmix(&raw_samples, spec.channels);
    Ok(resample(&mono, spec.sample_rate, SAMPLE_RATE))
}

/// Read a WAV file from disk.
pub fn read_wav_file(path: &Path) -> Result<Vec<i16>> {
    let file = std::fs::File::open(path)?;
    decode_wav(std::io::BufReader::new(file))
}

/// Encode 16 kHz mono samples as an in-memory WAV file.
pub fn encode_wav(samples: &[i16]) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: CHANNELS,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let encode_err = |e: hound::Error| AlignError::AudioDecode {
        message: format!("Failed to encode WAV: {}", e),
    };

    let mut cursor = Cursor::new(Vec::with_capacity(44 + samples.len() * 2));
    let mut writer = hound::WavWriter::new(&mut cursor, spec).map_err(encode_err)?;
    for &sample in samples {
        writer.write_sample(sample).map_err(encode_err)?;
    }
    writer.finalize().map_err(encode_err)?;
    Ok(cursor.into_inner())
}

/// Duration in milliseconds of `len` samples at the canonical rate.
pub fn samples_to_ms(len: usize) -> u64 {
    len as u64 * 1000 / SAMPLE_RATE as u64
}

/// Sample index at `ms` milliseconds, at the canonical rate.
pub fn ms_to_samples(ms: u64) -> usize {
    (ms * SAMPLE_RATE as u64 / 1000) as usize
}

fn downmix(samples: &[i16], channels: u16) -> Vec<i16> {
    if channels <= 1 {
        return samples.to_vec();
    }
    let channels = channels as usize;
    samples
        .chunks_exact(channels)
        .map(|frame| {
            let sum: i32 = frame.iter().map(|&s| s as i32).sum();
            (sum / channels as i32) as i16
        })
        .collect()
}

/// Simple linear interpolation resampling.
fn resample(samples: &[i16], from_rate: u32, to_rate: u32) -> Vec<i16> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let output_len = (samples.len() as f64 / ratio).ceil() as usize;

    (0..output_len)
        .map(|i| {
            let source_pos = i as f64 * ratio;
            let source_idx = (source_pos.floor() as usize).min(samples.len() - 1);
            let fraction = source_pos - source_idx as f64;

            if source_idx + 1 >= samples.len() {
                samples[source_idx]
            } else {
                let left = samples[source_idx] as f64;
                let right = samples[source_idx + 1] as f64;
                (left + (right - left) * fraction) as i16
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_wav_data(sample_rate: u32, channels: u16, samples: &[i16]) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
        cursor.into_inner()
    }

    #[test]
    fn decode_16khz_mono_matches_exactly() {
        let input = vec![100i16, 200, 300, 400, 500];
        let decoded = decode_wav(Cursor::new(make_wav_data(16000, 1, &input))).unwrap();
        assert_eq!(decoded, input);
    }

    #[test]
    fn decode_stereo_downmixes_to_mono() {
        let stereo = vec![100i16, 200, 300, 400, 500, 600];
        let decoded = decode_wav(Cursor::new(make_wav_data(16000, 2, &stereo))).unwrap();
        assert_eq!(decoded, vec![150i16, 350, 550]);
    }

    #[test]
    fn decode_48khz_resamples_to_16khz() {
        let input = vec![1000i16; 48000];
        let decoded = decode_wav(Cursor::new(make_wav_data(48000, 1, &input))).unwrap();
        assert!(decoded.len() >= 15900 && decoded.len() <= 16100);
        assert!(decoded.iter().all(|&s| (900..=1100).contains(&s)));
    }

    #[test]
    fn decode_rejects_garbage() {
        let result = decode_wav(Cursor::new(b"definitely not a wav".to_vec()));
        assert!(matches!(result, Err(AlignError::AudioDecode { .. })));
    }

    #[test]
    fn encode_then_decode_preserves_samples() {
        let samples: Vec<i16> = (0..1600).map(|i| (i % 300) as i16 - 150).collect();
        let bytes = encode_wav(&samples).unwrap();
        assert_eq!(&bytes[..4], b"RIFF");
        assert_eq!(decode_wav(Cursor::new(bytes)).unwrap(), samples);
    }

    #[test]
    fn read_wav_file_from_disk() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("track");
        std::fs::write(&path, make_wav_data(16000, 1, &[7i16; 320])).unwrap();
        assert_eq!(read_wav_file(&path).unwrap().len(), 320);
    }

    #[test]
    fn sample_time_conversions() {
        assert_eq!(samples_to_ms(16000), 1000);
        assert_eq!(samples_to_ms(160), 10);
        assert_eq!(ms_to_samples(1500), 24000);
    }
}
