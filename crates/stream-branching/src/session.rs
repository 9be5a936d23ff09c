//! Branching playback state machine.
//!
//! `Session` is the synchronous core of the engine: it owns the playback state, the
//! visited set and the "already surfaced" marker, and it never performs I/O. The async
//! engine in [`crate::player`] feeds it play-head samples and viewer choices and acts
//! on what it returns.
//!
//! States:
//!
//! ```text
//! Uninitialized -> Priming -> Playing(intro) -> AwaitingChoice(intro)
//!                                  ^                    |
//!                                  +---- choose(key) ---+
//! ```

use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::error::{PlayerError, PlayerResult};
use crate::manifest::{ChapterOption, INTRO_KEY, Manifest, SegmentDescriptor};

/// Identity of one Active Selection instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SelectionId(pub u64);

/// The segment instance currently playing.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveSelection {
    pub id: SelectionId,
    /// Normalised chapter key.
    pub key: String,
    /// Copy of the manifest descriptor this instance was created from.
    pub segment: SegmentDescriptor,
    /// Absolute play-head second at which the decision point fires.
    pub decision_at: Option<u64>,
    /// Whether the anti-loop delay was added to `decision_at`.
    pub loop_delay_applied: bool,
}

impl ActiveSelection {
    /// URL template of the segment.
    pub fn url(&self) -> &str {
        &self.segment.url
    }

    pub fn options(&self) -> &[ChapterOption] {
        &self.segment.options
    }
}

/// Tagged playback state.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum PlaybackState {
    #[default]
    Uninitialized,
    Priming,
    Playing(ActiveSelection),
    AwaitingChoice(ActiveSelection),
}

impl PlaybackState {
    pub fn name(&self) -> &'static str {
        match self {
            PlaybackState::Uninitialized => "uninitialized",
            PlaybackState::Priming => "priming",
            PlaybackState::Playing(_) => "playing",
            PlaybackState::AwaitingChoice(_) => "awaiting-choice",
        }
    }

    pub fn selection(&self) -> Option<&ActiveSelection> {
        match self {
            PlaybackState::Playing(s) | PlaybackState::AwaitingChoice(s) => Some(s),
            PlaybackState::Uninitialized | PlaybackState::Priming => None,
        }
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of comparing a play-head sample with the active decision point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionCheck {
    /// The segment has no decision point.
    NoDecisionPoint,
    /// Truncated play-head differs from the decision second.
    NotReached,
    /// Same second, but this selection already surfaced its options.
    AlreadySurfaced,
    /// Options must be presented now.
    Fire,
}

/// Play-head seconds truncated to a whole second. Negative and NaN samples map to 0.
pub fn truncate_seconds(play_head: f64) -> u64 {
    if play_head.is_finite() && play_head > 0.0 {
        play_head.trunc() as u64
    } else {
        0
    }
}

/// Pure decision-point detection.
///
/// Fires on exact equality of the truncated play-head with `decision_at`, unless
/// `surfaced` already names this selection.
///
/// The "already surfaced" marker is the selection instance, not its URL: choosing
/// the same segment again creates a new instance whose decision point fires again,
/// even when both instances share a URL.
pub fn check_decision_point(
    play_head: f64,
    selection: &ActiveSelection,
    surfaced: Option<SelectionId>,
) -> DecisionCheck {
    let Some(at) = selection.decision_at else {
        return DecisionCheck::NoDecisionPoint;
    };
    if truncate_seconds(play_head) != at {
        return DecisionCheck::NotReached;
    }
    if surfaced == Some(selection.id) {
        return DecisionCheck::AlreadySurfaced;
    }
    DecisionCheck::Fire
}

/// Segment URLs played during this session, in first-play order. Never shrinks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisitedSet {
    urls: Vec<String>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, url: &str) -> bool {
        self.urls.iter().any(|u| u == url)
    }

    /// Record `url`; returns `false` if it was already present.
    pub fn record(&mut self, url: &str) -> bool {
        if self.contains(url) {
            return false;
        }
        self.urls.push(url.to_string());
        true
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.urls.iter().map(String::as_str)
    }
}

/// Synchronous branching state machine for one playback session.
#[derive(Debug)]
pub struct Session {
    manifest: Arc<Manifest>,
    state: PlaybackState,
    visited: VisitedSet,
    surfaced: Option<SelectionId>,
    next_id: u64,
    loop_delay_secs: u64,
}

impl Session {
    pub fn new(manifest: Arc<Manifest>, loop_delay_secs: u64) -> Self {
        Self {
            manifest,
            state: PlaybackState::Uninitialized,
            visited: VisitedSet::new(),
            surfaced: None,
            next_id: 0,
            loop_delay_secs,
        }
    }

    pub fn manifest(&self) -> &Arc<Manifest> {
        &self.manifest
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn visited(&self) -> &VisitedSet {
        &self.visited
    }

    /// Last selection whose decision point was surfaced.
    pub fn surfaced(&self) -> Option<SelectionId> {
        self.surfaced
    }

    /// `Uninitialized -> Priming`, once the surface accepted the codec.
    pub fn begin_priming(&mut self) -> PlayerResult<()> {
        match self.state {
            PlaybackState::Uninitialized => {
                self.state = PlaybackState::Priming;
                Ok(())
            }
            ref other => Err(PlayerError::msg(format!(
                "cannot start priming from state `{other}`"
            ))),
        }
    }

    /// `Priming -> Playing(intro)`.
    pub fn start(&mut self, play_head: f64) -> PlayerResult<ActiveSelection> {
        if !matches!(self.state, PlaybackState::Priming) {
            return Err(PlayerError::msg(format!(
                "cannot start playback from state `{}`",
                self.state
            )));
        }
        // The timeline starts at 0, so the intro's `at` is already absolute. The intro
        // is not recorded as visited: only transitions go through the anti-loop rule.
        let segment = self.manifest.intro().clone();
        trace!(play_head, "starting intro");
        let selection = ActiveSelection {
            id: self.next_selection_id(),
            key: INTRO_KEY.to_string(),
            decision_at: segment.at.map(u64::from),
            segment,
            loop_delay_applied: false,
        };
        self.state = PlaybackState::Playing(selection.clone());
        Ok(selection)
    }

    /// Sample the play-head. Returns the options to present when a decision point fires,
    /// moving the session to `AwaitingChoice`.
    pub fn poll(&mut self, play_head: f64) -> Option<Vec<ChapterOption>> {
        let PlaybackState::Playing(selection) = &self.state else {
            return None;
        };

        match check_decision_point(play_head, selection, self.surfaced) {
            DecisionCheck::Fire => {
                let selection = selection.clone();
                debug!(
                    key = %selection.key,
                    at = ?selection.decision_at,
                    play_head,
                    "decision point reached"
                );
                let options = selection.options().to_vec();
                self.surfaced = Some(selection.id);
                self.state = PlaybackState::AwaitingChoice(selection);
                Some(options)
            }
            DecisionCheck::AlreadySurfaced => {
                trace!(play_head, "decision point already surfaced");
                None
            }
            DecisionCheck::NotReached | DecisionCheck::NoDecisionPoint => None,
        }
    }

    /// `AwaitingChoice -> Playing(next)`.
    pub fn choose(&mut self, key: &str, play_head: f64) -> PlayerResult<ActiveSelection> {
        if !matches!(self.state, PlaybackState::AwaitingChoice(_)) {
            return Err(PlayerError::NoPendingDecision);
        }
        let segment = self.manifest.chapter(key)?.clone();
        let selection = self.activate(key.to_lowercase(), segment, play_head);
        self.state = PlaybackState::Playing(selection.clone());
        Ok(selection)
    }

    fn next_selection_id(&mut self) -> SelectionId {
        let id = SelectionId(self.next_id);
        self.next_id += 1;
        id
    }

    fn activate(
        &mut self,
        key: String,
        segment: SegmentDescriptor,
        play_head: f64,
    ) -> ActiveSelection {
        let id = self.next_selection_id();

        let mut decision_at = segment
            .at
            .map(|at| truncate_seconds(play_head + f64::from(at)));

        let first_visit = self.visited.record(&segment.url);
        let loop_delay_applied = !first_visit && decision_at.is_some();
        if loop_delay_applied {
            decision_at = decision_at.map(|at| at + self.loop_delay_secs);
            debug!(
                key = %key,
                url = %segment.url,
                delay_secs = self.loop_delay_secs,
                "segment revisited, delaying decision point"
            );
        }

        ActiveSelection {
            id,
            key,
            segment,
            decision_at,
            loop_delay_applied,
        }
    }
}
