//! Silence analysis over a whole track.
//!
//! Splits a track into voiced regions using frame RMS levels. Short dips
//! below the threshold are bridged so a single word is not split in two.

use crate::audio::wav::samples_to_ms;
use crate::defaults;

/// Configuration for silence analysis.
#[derive(Debug, Clone, Copy)]
pub struct SilenceConfig {
    /// RMS level (0.0 to 1.0) below which a frame is silent.
    pub threshold: f32,
    /// Analysis frame length in milliseconds.
    pub frame_ms: u64,
    /// Silent runs shorter than this are treated as voiced.
    pub min_silence_ms: u64,
}

impl Default for SilenceConfig {
    fn default() -> Self {
        Self {
            threshold: defaults::SILENCE_THRESHOLD,
            frame_ms: defaults::FRAME_MS,
            min_silence_ms: defaults::MIN_SILENCE_MS,
        }
    }
}

/// Half-open time range `[start_ms, end_ms)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start_ms: u64,
    pub end_ms: u64,
}

impl Span {
    pub fn new(start_ms: u64, end_ms: u64) -> Self {
        Self { start_ms, end_ms }
    }

    pub fn duration_ms(&self) -> u64 {
        self.end_ms - self.start_ms
    }
}

/// Root mean square level of 16-bit samples, normalized to 0.0..=1.0.
pub fn calculate_rms(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f64 = samples
        .iter()
        .map(|&sample| {
            let normalized = sample as f64 / i16::MAX as f64;
            normalized * normalized
        })
        .sum();

    (sum_squares / samples.len() as f64).sqrt() as f32
}

/// Voiced regions of a 16 kHz track, in time order.
pub fn voiced_regions(samples: &[i16], config: &SilenceConfig) -> Vec<Span> {
    let frame_len = ((defaults::SAMPLE_RATE as u64 * config.frame_ms) / 1000).max(1) as usize;
    let total_ms = samples_to_ms(samples.len());
    let voiced: Vec<bool> = samples
        .chunks(frame_len)
        .map(|frame| calculate_rms(frame) > config.threshold)
        .collect();

    let min_silent_frames = config.min_silence_ms.div_ceil(config.frame_ms.max(1)) as usize;
    let mut regions: Vec<(usize, usize)> = Vec::new();
    let mut i = 0;
    while i < voiced.len() {
        if !voiced[i] {
            i += 1;
            continue;
        }
        let start = i;
        while i < voiced.len() && voiced[i] {
            i += 1;
        }
        match regions.last_mut() {
            Some(last) if start - last.1 < min_silent_frames => last.1 = i,
            _ => regions.push((start, i)),
        }
    }

    regions
        .into_iter()
        .map(|(start, end)| {
            Span::new(
                start as u64 * config.frame_ms,
                (end as u64 * config.frame_ms).min(total_ms),
            )
        })
        .collect()
}
