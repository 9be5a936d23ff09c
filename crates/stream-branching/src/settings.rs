//! Unified configuration for the `stream-branching` crate.
//!
//! Included configuration domains:
//! - Network (host substitution, request timeouts)
//! - Resolution selection (probe tier, interval table, floor tier, failure policy)
//! - Playback engine (poll cadence, anti-loop delay, channel capacities)

use std::time::Duration;

use crate::abr::{QualityTier, TierBand};

/// What to do when the bandwidth probe itself fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProbeFailurePolicy {
    /// Treat a failed probe like the slowest measurement and use the floor tier.
    #[default]
    FloorTier,
    /// Return the probe error to the caller; the segment load fails.
    Propagate,
}

/// Unified settings for branching playback.
#[derive(Debug, Clone)]
pub struct PlayerSettings {
    // ----------------------------
    // Network
    // ----------------------------
    /// Value substituted for the manifest's host token.
    /// Default: empty string.
    pub host: String,

    /// Overall timeout for a single fetch (probe or segment).
    /// Default: 30 seconds.
    pub request_timeout: Duration,

    /// Idle timeout between body chunks while streaming a response.
    /// Default: 10 seconds.
    pub idle_timeout: Duration,

    // ----------------------------
    // Resolution selection
    // ----------------------------
    /// Tier substituted into the calibration URL when probing.
    /// Default: 144.
    pub probe_tier: QualityTier,

    /// Ordered elapsed-time bands, first match wins.
    /// Default: 0-900ms => 720, 901-3000ms => 360, 3001-20000ms => 144.
    pub tier_bands: Vec<TierBand>,

    /// Tier used when no band matches.
    /// Default: 144.
    pub floor_tier: QualityTier,

    /// Handling of a failed probe request.
    /// Default: [`ProbeFailurePolicy::FloorTier`].
    pub probe_failure_policy: ProbeFailurePolicy,

    // ----------------------------
    // Playback engine
    // ----------------------------
    /// How often the play-head is sampled for decision points.
    /// Default: 200ms.
    pub poll_interval: Duration,

    /// Seconds added to the decision time of a segment that was already played.
    /// Default: 5.
    pub loop_delay_secs: u64,

    /// Capacity of the out-of-band event broadcast channel.
    /// Default: 64.
    pub event_channel_capacity: usize,

    /// Capacity of the viewer command channel.
    /// Default: 8.
    pub command_channel_capacity: usize,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            host: String::new(),
            request_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(10),

            probe_tier: QualityTier::P144,
            tier_bands: TierBand::default_table(),
            floor_tier: QualityTier::P144,
            probe_failure_policy: ProbeFailurePolicy::FloorTier,

            poll_interval: Duration::from_millis(200),
            loop_delay_secs: 5,
            event_channel_capacity: 64,
            command_channel_capacity: 8,
        }
    }
}

impl PlayerSettings {
    /// Create default settings.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn host(mut self, v: impl Into<String>) -> Self {
        self.host = v.into();
        self
    }

    pub fn request_timeout(mut self, v: Duration) -> Self {
        self.request_timeout = v;
        self
    }

    pub fn idle_timeout(mut self, v: Duration) -> Self {
        self.idle_timeout = v;
        self
    }

    pub fn probe_tier(mut self, v: QualityTier) -> Self {
        self.probe_tier = v;
        self
    }

    pub fn tier_bands(mut self, v: Vec<TierBand>) -> Self {
        self.tier_bands = v;
        self
    }

    pub fn floor_tier(mut self, v: QualityTier) -> Self {
        self.floor_tier = v;
        self
    }

    pub fn probe_failure_policy(mut self, v: ProbeFailurePolicy) -> Self {
        self.probe_failure_policy = v;
        self
    }

    pub fn poll_interval(mut self, v: Duration) -> Self {
        self.poll_interval = v;
        self
    }

    pub fn loop_delay_secs(mut self, v: u64) -> Self {
        self.loop_delay_secs = v;
        self
    }

    pub fn event_channel_capacity(mut self, v: usize) -> Self {
        self.event_channel_capacity = v;
        self
    }

    pub fn command_channel_capacity(mut self, v: usize) -> Self {
        self.command_channel_capacity = v;
        self
    }
}
