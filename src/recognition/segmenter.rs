//! Segmentation policy: cut a normalized track into recognition requests.
//!
//! Short tracks go out whole. Longer tracks are cut into contiguous spans
//! covering the whole track, with cuts placed in silence and voiced regions
//! merged up to `max_segment_ms`:
//! - a gap longer than `large_gap_ms` always cuts, and the gap becomes its
//!   own span (or several, if it is longer than `max_segment_ms`);
//! - a merge that would exceed `max_segment_ms` cuts; a gap shorter than
//!   `min_viable_gap_ms` leads the next segment, a longer one trails the
//!   current segment;
//! - any region longer than `max_segment_ms` is split into fixed pieces.
//!
//! Audio under the silence threshold is still sent, so soft speech is never
//! lost to the level detector.

use crate::audio::silence::{SilenceConfig, Span, voiced_regions};
use crate::audio::wav::{ms_to_samples, samples_to_ms};
use crate::defaults;
use serde::{Deserialize, Serialize};

/// Configuration for the segmenter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SegmenterConfig {
    /// Tracks shorter than this are one segment.
    pub short_clip_ms: u64,
    /// Longest segment sent in one request.
    pub max_segment_ms: u64,
    /// Silence longer than this always cuts.
    pub large_gap_ms: u64,
    /// Silence at least this long trails the earlier segment at a length cut.
    pub min_viable_gap_ms: u64,
    /// Silent runs shorter than this do not split voiced regions.
    pub min_silence_ms: u64,
    /// RMS level below which a frame is silent.
    pub silence_threshold: f32,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            short_clip_ms: defaults::SHORT_CLIP_MS,
            max_segment_ms: defaults::MAX_SEGMENT_MS,
            large_gap_ms: defaults::LARGE_GAP_MS,
            min_viable_gap_ms: defaults::MIN_VIABLE_GAP_MS,
            min_silence_ms: defaults::MIN_SILENCE_MS,
            silence_threshold: defaults::SILENCE_THRESHOLD,
        }
    }
}

impl SegmenterConfig {
    fn silence(&self) -> SilenceConfig {
        SilenceConfig {
            threshold: self.silence_threshold,
            frame_ms: defaults::FRAME_MS,
            min_silence_ms: self.min_silence_ms,
        }
    }
}

/// A slice of a track submitted as one recognition request.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub index: usize,
    /// Position of the first sample within the track.
    pub offset_ms: u64,
    pub samples: Vec<i16>,
}

impl Segment {
    pub fn duration_ms(&self) -> u64 {
        samples_to_ms(self.samples.len())
    }
}

/// Splits tracks into segments according to [`SegmenterConfig`].
#[derive(Debug, Clone, Default)]
pub struct Segmenter {
    config: SegmenterConfig,
}

impl Segmenter {
    pub fn new(config: SegmenterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SegmenterConfig {
        &self.config
    }

    /// Time spans to submit, in order. They are contiguous and cover the
    /// whole track.
    pub fn plan(&self, samples: &[i16]) -> Vec<Span> {
        let total_ms = samples_to_ms(samples.len());
        if total_ms == 0 {
            return Vec::new();
        }
        if total_ms < self.config.short_clip_ms {
            return vec![Span::new(0, total_ms)];
        }

        let max = self.config.max_segment_ms.max(1);
        let pieces = voiced_regions(samples, &self.config.silence())
            .into_iter()
            .flat_map(|region| split_long(region, max));

        // The running segment is [start, end); end is the last voiced sample
        let mut spans = Vec::new();
        let (mut start, mut end) = (0, 0);
        for piece in pieces {
            let gap = piece.start_ms - end;
            if gap > self.config.large_gap_ms {
                if end > start {
                    spans.push(Span::new(start, end));
                }
                spans.extend(split_long(Span::new(end, piece.start_ms), max));
                start = piece.start_ms;
            } else if piece.end_ms - start > max {
                let fits_current = piece.start_ms - start <= max;
                let fits_next = piece.end_ms - end <= max;
                if fits_next && (gap < self.config.min_viable_gap_ms || !fits_current) {
                    spans.push(Span::new(start, end));
                    start = end;
                } else if fits_current {
                    spans.push(Span::new(start, piece.start_ms));
                    start = piece.start_ms;
                } else {
                    spans.push(Span::new(start, end));
                    spans.push(Span::new(end, piece.start_ms));
                    start = piece.start_ms;
                }
            }
            end = piece.end_ms;
        }

        let tail = total_ms - end;
        if tail <= self.config.large_gap_ms && total_ms - start <= max {
            end = total_ms;
        }
        if end > start {
            spans.push(Span::new(start, end));
        }
        if end < total_ms {
            spans.extend(split_long(Span::new(end, total_ms), max));
        }
        spans
    }

    /// Cut a track into indexed segments carrying their audio.
    pub fn split(&self, samples: &[i16]) -> Vec<Segment> {
        self.plan(samples)
            .into_iter()
            .enumerate()
            .map(|(index, span)| {
                let start = ms_to_samples(span.start_ms).min(samples.len());
                let end = ms_to_samples(span.end_ms).min(samples.len());
                Segment {
                    index,
                    offset_ms: span.start_ms,
                    samples: samples[start..end].to_vec(),
                }
            })
            .collect()
    }
}

fn split_long(region: Span, max: u64) -> Vec<Span> {
    let mut pieces = Vec::new();
    let mut start = region.start_ms;
    while region.end_ms - start > max {
        pieces.push(Span::new(start, start + max));
        start += max;
    }
    pieces.push(Span::new(start, region.end_ms));
    pieces
}
