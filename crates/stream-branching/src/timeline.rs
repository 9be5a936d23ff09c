//! Timeline-offset bookkeeping for appended media.

/// Running total of media duration appended to the playback buffer.
///
/// Invariant: `placement()` before appending segment `k + 1` equals the sum of the
/// durations of segments `1..=k`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Timeline {
    total_secs: f64,
    segments: u64,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Where the next segment starts on the shared timeline.
    pub fn placement(&self) -> f64 {
        self.total_secs
    }

    /// Number of segments accounted for.
    pub fn segments(&self) -> u64 {
        self.segments
    }

    /// Account for an ingested segment; returns the new total.
    ///
    /// Negative or non-finite durations are ignored so the total never decreases.
    pub fn advance(&mut self, duration_secs: f64) -> f64 {
        if duration_secs.is_finite() && duration_secs > 0.0 {
            self.total_secs += duration_secs;
        }
        self.segments += 1;
        self.total_secs
    }
}
