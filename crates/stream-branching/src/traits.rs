//! Collaborator traits consumed by the playback engine.
//!
//! The engine never talks to a network stack, a decoder or a UI toolkit directly.
//! Everything it needs is injected through the traits below, which keeps the
//! state machine testable with in-memory doubles.
//!
//! # Ordering contract
//!
//! [`PlaybackBuffer::append`] resolves only once the appended bytes have been fully
//! ingested. The engine never calls `append` again before the previous call resolved,
//! so implementations can assume a single outstanding append.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::time::Instant;

use crate::error::{PlayerError, PlayerResult};
use crate::manifest::ChapterOption;

/// Byte fetcher used for bandwidth probes and segment downloads.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Download the full body at `url`.
    async fn fetch(&self, url: &str) -> PlayerResult<Bytes>;

    /// Download the full body at `url` and measure the wall-clock time it took,
    /// from request start to the last body byte.
    async fn fetch_timed(&self, url: &str) -> PlayerResult<(Bytes, Duration)> {
        let started = Instant::now();
        let bytes = self.fetch(url).await?;
        Ok((bytes, started.elapsed()))
    }
}

/// The element that actually renders media and owns the play-head.
pub trait PlaybackSurface: Send + Sync {
    /// Current play-head position in seconds (fractional).
    fn current_time(&self) -> f64;

    /// Whether media of the given codec string can be played.
    fn supports_codec(&self, codec: &str) -> bool;

    /// Resume (or keep) playing already buffered content.
    fn play(&self);
}

/// Append-ordered sink that places media on the shared timeline.
#[async_trait]
pub trait PlaybackBuffer: Send {
    /// Append bytes; resolves when ingestion completed.
    ///
    /// Errors should be reported as [`PlayerError::Ingestion`].
    async fn append(&mut self, data: Bytes) -> PlayerResult<()>;

    /// Timeline position (seconds) at which the next appended bytes are placed.
    fn set_timestamp_offset(&mut self, offset: f64);
}

/// Presents decision points to the viewer.
///
/// The viewer's answer is delivered back through [`crate::PlayerHandle::choose`].
pub trait DecisionUi: Send + Sync {
    /// Show the ordered options of the decision point that was just reached.
    fn present_options(&self, options: &[ChapterOption]);

    /// Surface a condition that stops or prevents playback.
    fn report_error(&self, error: &PlayerError);
}
