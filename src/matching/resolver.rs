//! Speaker to track resolution.
//!
//! Phase A pairs a speaker with a track when the speaker's dialogue is found
//! almost verbatim in the track's transcript. Phase B places a single
//! leftover speaker on the track whose transcript gets closest to the
//! reference text when that speaker's lines are added to it. Two or more
//! leftover speakers are never guessed.

use crate::defaults;
use crate::error::{AlignError, Result};
use crate::matching::fuzz::{partial_ratio, ratio};
use crate::matching::phonetic;
use crate::recognition::transcript::Transcript;
use crate::script::ScriptDocument;
use crate::store::ContentHash;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// Thresholds for speaker resolution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ResolverConfig {
    /// Minimum partial similarity to accept a content match.
    pub accept_score: u32,
    /// Speakers with less normalized text than this are left to Phase B.
    pub min_text_chars: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            accept_score: defaults::SPEAKER_ACCEPT_SCORE,
            min_text_chars: defaults::SPEAKER_MIN_TEXT_CHARS,
        }
    }
}

/// Speakers resolved onto each track.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackSpeakerMap(BTreeMap<ContentHash, BTreeSet<String>>);

impl TrackSpeakerMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a track with no speakers yet.
    pub fn add_track(&mut self, track: &ContentHash) {
        self.0.entry(track.clone()).or_default();
    }

    pub fn assign(&mut self, track: &ContentHash, speaker: &str) {
        self.0
            .entry(track.clone())
            .or_default()
            .insert(speaker.to_string());
    }

    /// The track a speaker was resolved onto.
    pub fn track_of(&self, speaker: &str) -> Option<&ContentHash> {
        self.0
            .iter()
            .find(|(_, speakers)| speakers.contains(speaker))
            .map(|(track, _)| track)
    }

    pub fn speakers_on(&self, track: &ContentHash) -> Option<&BTreeSet<String>> {
        self.0.get(track)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ContentHash, &BTreeSet<String>)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// How a speaker was placed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    /// Phase A, with the partial similarity score.
    Content { score: u32 },
    /// Phase B, with the change in edit distance caused by the speaker.
    Ordering { delta: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub speaker: String,
    pub track: ContentHash,
    pub method: Method,
}

/// Outcome of a successful resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub map: TrackSpeakerMap,
    pub decisions: Vec<Decision>,
}

struct TrackText<'a> {
    hash: &'a ContentHash,
    text: String,
}

#[derive(Debug, Clone, Default)]
pub struct SpeakerTrackResolver {
    config: ResolverConfig,
}

impl SpeakerTrackResolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self { config }
    }

    /// Assign every script speaker to exactly one track.
    ///
    /// Tracks with an empty transcript are ignored.
    ///
    /// # Errors
    /// - `SpeakerOnMultipleTracks` if a speaker's dialogue matches more
    ///   than one track
    /// - `UnresolvedSpeakers` if speakers remain after both phases
    pub fn resolve(
        &self,
        script: &ScriptDocument,
        tracks: &[(ContentHash, Transcript)],
    ) -> Result<Resolution> {
        let usable: Vec<TrackText> = tracks
            .iter()
            .filter(|(hash, transcript)| {
                if transcript.is_empty() {
                    warn!("Track {} has no recognized words, skipping", hash.short());
                }
                !transcript.is_empty()
            })
            .map(|(hash, transcript)| TrackText {
                hash,
                text: phonetic::normalize(&transcript.text()),
            })
            .collect();

        let mut resolution = Resolution::default();
        for track in &usable {
            resolution.map.add_track(track.hash);
        }

        let mut unresolved = Vec::new();
        for speaker in &script.speakers {
            let text = speaker_text(script, speaker);
            if phonetic::char_count(&text) < self.config.min_text_chars {
                debug!("{} has too little dialogue for a content match", speaker);
                unresolved.push(speaker.clone());
                continue;
            }

            let accepted: Vec<(&ContentHash, u32)> = usable
                .iter()
                .map(|track| (track.hash, partial_ratio(&text, &track.text)))
                .inspect(|(hash, score)| debug!("{} vs {}: {}", speaker, hash.short(), score))
                .filter(|(_, score)| *score >= self.config.accept_score)
                .collect();

            match accepted.as_slice() {
                [] => unresolved.push(speaker.clone()),
                [(track, score)] => {
                    info!("{} -> {} (content {})", speaker, track.short(), score);
                    resolution.map.assign(track, speaker);
                    resolution.decisions.push(Decision {
                        speaker: speaker.clone(),
                        track: (*track).clone(),
                        method: Method::Content { score: *score },
                    });
                }
                many => {
                    return Err(AlignError::SpeakerOnMultipleTracks {
                        speaker: speaker.clone(),
                        tracks: many.iter().map(|(t, _)| t.to_string()).collect(),
                    });
                }
            }
        }

        match unresolved.as_slice() {
            [] => Ok(resolution),
            [speaker] if !usable.is_empty() => {
                let (track, delta) = self.place_by_ordering(script, &resolution.map, &usable, speaker);
                info!("{} -> {} (ordering {:+})", speaker, track.short(), delta);
                resolution.map.assign(&track, speaker);
                resolution.decisions.push(Decision {
                    speaker: speaker.clone(),
                    track,
                    method: Method::Ordering { delta },
                });
                Ok(resolution)
            }
            _ => Err(AlignError::UnresolvedSpeakers {
                speakers: unresolved,
            }),
        }
    }

    /// Phase B: pick the track where adding `speaker`'s lines to the
    /// reference text reduces the edit distance the most.
    fn place_by_ordering(
        &self,
        script: &ScriptDocument,
        map: &TrackSpeakerMap,
        usable: &[TrackText],
        speaker: &str,
    ) -> (ContentHash, i64) {
        let mut best: Option<(&ContentHash, i64)> = None;
        for track in usable {
            let mut members: BTreeSet<&str> = map
                .speakers_on(track.hash)
                .map(|s| s.iter().map(String::as_str).collect())
                .unwrap_or_default();
            let without = ratio(&track.text, &reference_text(script, &members));
            members.insert(speaker);
            let with = ratio(&track.text, &reference_text(script, &members));

            // Distance is 100 - score, so the change in distance is
            // (100 - with) - (100 - without)
            let delta = without as i64 - with as i64;
            debug!("{} on {}: {} -> {}", speaker, track.hash.short(), without, with);
            if best.is_none_or(|(_, d)| delta < d) {
                best = Some((track.hash, delta));
            }
        }
        // `usable` is non-empty here
        best.map(|(hash, delta)| (hash.clone(), delta))
            .unwrap_or_else(|| (usable[0].hash.clone(), 0))
    }
}

/// Normalized text of everything `speaker` says, in script order.
fn speaker_text(script: &ScriptDocument, speaker: &str) -> String {
    reference_text(script, &BTreeSet::from([speaker]))
}

/// Normalized text of the lines spoken by any of `speakers`, in script order.
fn reference_text(script: &ScriptDocument, speakers: &BTreeSet<&str>) -> String {
    script
        .lines
        .iter()
        .filter(|line| speakers.contains(line.speaker.as_str()))
        .map(|line| phonetic::normalize(&line.text()))
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
