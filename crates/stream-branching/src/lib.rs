//! Branching ("choose your path") video playback.
//!
//! A manifest describes chapters, each a video segment that may end in a decision
//! point. This crate drives playback of such a manifest:
//! - before every segment download a calibration resource is timed and mapped to a
//!   quality tier (`abr`),
//! - segment bytes are appended to an injected playback buffer at contiguous
//!   timeline offsets (`worker`, `timeline`),
//! - the play-head is polled for decision points whose options go to an injected UI,
//!   and the viewer's choice selects the next segment, with a delay added when a
//!   segment is revisited (`session`, `player`).
//!
//! Modules:
//! - `abr`: tier table and the probe-driven `ResolutionSelector`.
//! - `downloader`: `reqwest`-based `Fetcher`.
//! - `error`: unified error types.
//! - `events`: out-of-band `PlayerEvent`s.
//! - `manifest`: manifest model and JSON loading.
//! - `player`: async engine and its handle.
//! - `session`: synchronous state machine and decision-point detection.
//! - `settings`: unified configuration.
//! - `template`: URL token substitution and segment durations.
//! - `traits`: collaborator traits (fetcher, surface, buffer, UI).
//!
//! This file acts as a facade and re-exports the public API.

mod abr;
mod downloader;
mod error;
mod events;
mod manifest;
mod player;
mod session;
mod settings;
mod template;
mod timeline;
mod traits;
mod worker;

pub use crate::abr::{ProbeOutcome, QualityTier, ResolutionSelector, TierBand, tier_for_elapsed};
pub use crate::downloader::HttpFetcher;
pub use crate::error::{PlayerError, PlayerResult};
pub use crate::events::{PlayerEvent, SegmentIngested};
pub use crate::manifest::{ChapterOption, INTRO_KEY, Manifest, SegmentDescriptor};
pub use crate::player::{BranchingPlayer, Collaborators, PlayerHandle};
pub use crate::session::{
    ActiveSelection, DecisionCheck, PlaybackState, SelectionId, Session, VisitedSet,
    check_decision_point, truncate_seconds,
};
pub use crate::settings::{PlayerSettings, ProbeFailurePolicy};
pub use crate::template::{parse_manifest_url, segment_duration};
pub use crate::timeline::Timeline;
pub use crate::traits::{DecisionUi, Fetcher, PlaybackBuffer, PlaybackSurface};

pub use bytes::Bytes;
pub use std::time::Duration;
