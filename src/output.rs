//! Final output artifact and plain-text reports.
//!
//! The exported document is keyed by script content hash. Each entry holds
//! the resolved speaker map and every line with its match, or `null` when the
//! line could not be aligned.

use crate::matching::aligner::AlignmentResult;
use crate::matching::resolver::TrackSpeakerMap;
use crate::script::ScriptDocument;
use crate::store::ContentHash;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Time range of a matched line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub track: ContentHash,
    pub start_ms: u64,
    pub end_ms: u64,
    pub score: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRecord {
    pub id: usize,
    pub speaker: String,
    pub text: String,
    #[serde(rename = "match")]
    pub matched: Option<MatchRecord>,
}

/// Alignment of one script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptAlignment {
    pub title: String,
    pub tracks: TrackSpeakerMap,
    pub lines: Vec<LineRecord>,
}

impl ScriptAlignment {
    pub fn new(script: &ScriptDocument, result: &AlignmentResult) -> Self {
        let lines = script
            .lines
            .iter()
            .map(|line| LineRecord {
                id: line.id,
                speaker: line.speaker.clone(),
                text: line.text(),
                matched: result.match_for(line.id).map(|m| MatchRecord {
                    track: m.track.clone(),
                    start_ms: m.start_ms,
                    end_ms: m.end_ms,
                    score: m.score,
                }),
            })
            .collect();

        Self {
            title: script.title.clone(),
            tracks: result.map.clone(),
            lines,
        }
    }

    pub fn matched_count(&self) -> usize {
        self.lines.iter().filter(|l| l.matched.is_some()).count()
    }
}

/// Exported document: one alignment per script.
pub type OutputDocument = BTreeMap<ContentHash, ScriptAlignment>;

/// Format milliseconds as `HH:MM:SS.mmm`.
pub fn format_timecode(ms: u64) -> String {
    let hours = ms / 3_600_000;
    let minutes = (ms / 60_000) % 60;
    let seconds = (ms / 1000) % 60;
    let millis = ms % 1000;
    format!("{hours:02}:{minutes:02}:{seconds:02}.{millis:03}")
}

/// Human-readable listing of an alignment.
pub fn render_alignment(hash: &ContentHash, alignment: &ScriptAlignment) -> String {
    let mut out = format!(
        "{} ({}) {}/{} lines matched\n",
        alignment.title,
        hash.short(),
        alignment.matched_count(),
        alignment.lines.len()
    );
    for (track, speakers) in alignment.tracks.iter() {
        let names: Vec<&str> = speakers.iter().map(String::as_str).collect();
        out.push_str(&format!("  track {}: {}\n", track.short(), names.join(", ")));
    }
    for line in &alignment.lines {
        let span = match &line.matched {
            Some(m) => format!(
                "{} {} - {}",
                m.track.short(),
                format_timecode(m.start_ms),
                format_timecode(m.end_ms)
            ),
            None => format!("{:8} {:<27}", "-", "unmatched"),
        };
        out.push_str(&format!(
            "  {:>4} {}  {}: {}\n",
            line.id, span, line.speaker, line.text
        ));
    }
    out
}
