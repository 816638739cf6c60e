//! Line to timecode alignment.
//!
//! Lines are visited in script order. Each track keeps a cursor, and a line
//! may only match words at or after its track's cursor, so accepted start
//! times never go backwards on a track.

use crate::defaults;
use crate::matching::fuzz::LcsPattern;
use crate::matching::phonetic;
use crate::matching::resolver::TrackSpeakerMap;
use crate::recognition::transcript::Transcript;
use crate::script::ScriptDocument;
use crate::store::ContentHash;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

/// Window sizing and acceptance for the aligner.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AlignerConfig {
    /// Minimum similarity for a window to be accepted.
    pub accept_score: u32,
    /// Expected recognized units per phonetic unit of script text.
    pub words_per_token: f32,
    /// Floor for the expected window size.
    pub min_window_words: usize,
    /// Window may be this many units shorter than expected.
    pub window_slack_below: usize,
    /// Window may be this many units longer than expected.
    pub window_slack_above: usize,
}

impl Default for AlignerConfig {
    fn default() -> Self {
        Self {
            accept_score: defaults::LINE_ACCEPT_SCORE,
            words_per_token: defaults::WORDS_PER_TOKEN,
            min_window_words: defaults::MIN_WINDOW_WORDS,
            window_slack_below: defaults::WINDOW_SLACK_BELOW,
            window_slack_above: defaults::WINDOW_SLACK_ABOVE,
        }
    }
}

impl AlignerConfig {
    /// Inclusive bounds on a window's unit count for a line of `units`.
    fn band(&self, units: usize) -> (usize, usize) {
        let expected = ((units as f32 * self.words_per_token).ceil() as usize)
            .max(self.min_window_words);
        (
            expected.saturating_sub(self.window_slack_below).max(1),
            expected + self.window_slack_above,
        )
    }
}

/// A script line located on a track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineMatch {
    pub line_id: usize,
    pub track: ContentHash,
    pub start_ms: u64,
    pub end_ms: u64,
    pub score: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlignmentResult {
    pub map: TrackSpeakerMap,
    pub matches: Vec<LineMatch>,
    /// Ids of lines that received no match, in script order.
    pub unmatched: Vec<usize>,
}

impl AlignmentResult {
    pub fn match_for(&self, line_id: usize) -> Option<&LineMatch> {
        self.matches.iter().find(|m| m.line_id == line_id)
    }
}

/// A transcript prepared for window scoring.
struct TrackWords<'a> {
    transcript: &'a Transcript,
    /// Normalized text of each word.
    text: Vec<String>,
    /// Phonetic units in each word.
    units: Vec<usize>,
}

impl<'a> TrackWords<'a> {
    fn new(transcript: &'a Transcript) -> Self {
        let text: Vec<String> = transcript
            .words
            .iter()
            .map(|w| phonetic::normalize(&w.text))
            .collect();
        let units = text
            .iter()
            .map(|t| t.split(' ').filter(|u| !u.is_empty()).count())
            .collect();
        Self {
            transcript,
            text,
            units,
        }
    }

    /// Index of the first word starting at or after `ms`.
    fn first_at(&self, ms: u64) -> usize {
        self.transcript.words.partition_point(|w| w.start_ms < ms)
    }
}

struct PreparedLine {
    id: usize,
    speaker: String,
    units: usize,
    pattern: LcsPattern,
}

struct Candidate {
    start: usize,
    end: usize,
    score: u32,
}

#[derive(Default)]
struct Cursor {
    floor_ms: u64,
}

#[derive(Debug, Clone, Default)]
pub struct LineAligner {
    config: AlignerConfig,
}

impl LineAligner {
    pub fn new(config: AlignerConfig) -> Self {
        Self { config }
    }

    /// Find a time range for every line whose speaker has a track.
    pub fn align(
        &self,
        script: &ScriptDocument,
        map: &TrackSpeakerMap,
        tracks: &[(ContentHash, Transcript)],
    ) -> AlignmentResult {
        let prepared: HashMap<&ContentHash, TrackWords> = tracks
            .iter()
            .filter(|(_, t)| !t.is_empty())
            .map(|(hash, t)| (hash, TrackWords::new(t)))
            .collect();

        let lines: Vec<PreparedLine> = script
            .lines
            .iter()
            .map(|line| {
                let text = phonetic::normalize(&line.text());
                PreparedLine {
                    id: line.id,
                    speaker: line.speaker.clone(),
                    units: phonetic::units(&line.text()).len(),
                    pattern: LcsPattern::new(&text),
                }
            })
            .collect();

        let mut result = AlignmentResult {
            map: map.clone(),
            ..Default::default()
        };
        let mut cursors: HashMap<&ContentHash, Cursor> = HashMap::new();

        for line in &lines {
            let Some((hash, words)) = map
                .track_of(&line.speaker)
                .and_then(|hash| prepared.get_key_value(hash))
            else {
                debug!("Line {}: {} has no usable track", line.id, line.speaker);
                result.unmatched.push(line.id);
                continue;
            };

            let cursor = cursors.entry(*hash).or_default();
            let peers: Vec<&PreparedLine> =
                lines.iter().filter(|l| l.speaker == line.speaker).collect();

            match self.best_window(line, &peers, words, cursor.floor_ms) {
                Some(c) if c.score >= self.config.accept_score => {
                    let span = &words.transcript.words[c.start..=c.end];
                    let start_ms = span.iter().map(|w| w.start_ms).min().unwrap_or(0);
                    let end_ms = span.iter().map(|w| w.end_ms).max().unwrap_or(start_ms);
                    debug!(
                        "Line {} -> {} [{}, {}] score {}",
                        line.id,
                        hash.short(),
                        start_ms,
                        end_ms,
                        c.score
                    );
                    cursor.floor_ms = cursor.floor_ms.max(end_ms.saturating_sub(1)).max(start_ms);
                    result.matches.push(LineMatch {
                        line_id: line.id,
                        track: (*hash).clone(),
                        start_ms,
                        end_ms,
                        score: c.score,
                    });
                }
                best => {
                    info!(
                        "Line {} ({}) unmatched, best score {}",
                        line.id,
                        line.speaker,
                        best.map_or(0, |c| c.score)
                    );
                    result.unmatched.push(line.id);
                }
            }
        }

        info!(
            "Aligned {} of {} lines",
            result.matches.len(),
            script.lines.len()
        );
        result
    }

    /// Highest-scoring window at or after `floor_ms` whose best match among
    /// the speaker's lines is `line`.
    fn best_window(
        &self,
        line: &PreparedLine,
        peers: &[&PreparedLine],
        words: &TrackWords,
        floor_ms: u64,
    ) -> Option<Candidate> {
        if line.units == 0 {
            return None;
        }
        let (lo, hi) = self.config.band(line.units);
        let n = words.text.len();
        let mut best: Option<Candidate> = None;
        let mut below_accept: Option<Candidate> = None;

        for start in words.first_at(floor_ms)..n {
            let mut units = 0;
            let mut window: Vec<char> = Vec::new();
            for end in start..n {
                units += words.units[end];
                if units > hi {
                    break;
                }
                if !window.is_empty() && !words.text[end].is_empty() {
                    window.push(' ');
                }
                window.extend(words.text[end].chars());
                if units < lo {
                    continue;
                }

                let score = line.pattern.ratio(&window);
                if score < self.config.accept_score {
                    if below_accept.as_ref().is_none_or(|b| score > b.score) {
                        below_accept = Some(Candidate { start, end, score });
                    }
                    continue;
                }
                if best.as_ref().is_some_and(|b| score <= b.score) {
                    continue;
                }
                // Only keep the window if no other line of this speaker
                // matches it better
                let stolen = peers
                    .iter()
                    .any(|p| p.id != line.id && p.pattern.ratio(&window) > score);
                if !stolen {
                    best = Some(Candidate { start, end, score });
                }
            }
        }
        best.or(below_accept)
    }
}
