//! Matching script dialogue against transcripts.
//!
//! [`SpeakerTrackResolver`] decides which track each speaker is on, then
//! [`LineAligner`] locates every line on its speaker's track. Both compare
//! phonetically normalized text with the scores in [`fuzz`].

pub mod aligner;
pub mod fuzz;
pub mod phonetic;
pub mod resolver;

pub use aligner::{AlignerConfig, AlignmentResult, LineAligner, LineMatch};
pub use resolver::{
    Decision, Method, Resolution, ResolverConfig, SpeakerTrackResolver, TrackSpeakerMap,
};
