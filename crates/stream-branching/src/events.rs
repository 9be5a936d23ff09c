//! Out-of-band player events.
//!
//! Events are broadcast for UI/telemetry/diagnostics. They are not required for
//! correct playback: the decision UI is driven through [`crate::DecisionUi`].

use crate::abr::{ProbeOutcome, QualityTier};
use crate::error::PlayerError;
use crate::manifest::ChapterOption;

/// A segment that was fully appended to the playback buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentIngested {
    /// Chapter key of the segment.
    pub key: String,
    /// Resolved URL the bytes were fetched from.
    pub url: String,
    pub tier: QualityTier,
    /// Timeline position the segment was placed at.
    pub placement: f64,
    /// Media duration carried by the URL.
    pub duration: f64,
    /// Timeline total after this segment.
    pub timeline: f64,
    pub bytes: usize,
}

/// Events emitted by a running [`crate::BranchingPlayer`].
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    /// The engine moved to another state (see [`crate::PlaybackState::name`]).
    StateChanged { state: &'static str },
    /// A new Active Selection was created.
    SelectionChanged {
        key: String,
        url: String,
        decision_at: Option<u64>,
        loop_delay_applied: bool,
    },
    /// Bandwidth probe finished for the next segment.
    ResolutionSelected { key: String, outcome: ProbeOutcome },
    /// Segment bytes were ingested and the timeline advanced.
    SegmentIngested(SegmentIngested),
    /// Options were handed to the decision UI.
    DecisionPoint {
        key: String,
        options: Vec<ChapterOption>,
    },
    /// Loading a segment failed; the session stops.
    SegmentFailed { key: String, error: PlayerError },
}
