//! Probe-driven resolution selection.
//!
//! Before every segment download the selector fetches a small calibration resource
//! and maps the elapsed time onto a discrete quality tier. There is no running
//! estimator: each segment gets a fresh measurement, so a transient slowdown only
//! affects the segment that was fetched during it.
//!
//! A failed probe is reported as [`ProbeOutcome::Failed`] and, depending on
//! [`ProbeFailurePolicy`], either degrades to the floor tier or fails the load.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::PlayerResult;
use crate::settings::{PlayerSettings, ProbeFailurePolicy};
use crate::traits::Fetcher;

/// Vertical resolution of a rendition, as used in segment URLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QualityTier(pub u32);

impl QualityTier {
    pub const P144: QualityTier = QualityTier(144);
    pub const P360: QualityTier = QualityTier(360);
    pub const P720: QualityTier = QualityTier(720);
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Closed interval of probe durations (milliseconds) mapped to a tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierBand {
    pub start_ms: i64,
    pub end_ms: i64,
    pub tier: QualityTier,
}

impl TierBand {
    pub const fn new(start_ms: i64, end_ms: i64, tier: QualityTier) -> Self {
        Self {
            start_ms,
            end_ms,
            tier,
        }
    }

    /// Inclusive on both ends.
    pub fn contains(&self, elapsed_ms: i64) -> bool {
        self.start_ms <= elapsed_ms && elapsed_ms <= self.end_ms
    }

    /// The reference table: fast, medium and slow links.
    pub fn default_table() -> Vec<TierBand> {
        vec![
            TierBand::new(0, 900, QualityTier::P720),
            TierBand::new(901, 3_000, QualityTier::P360),
            TierBand::new(3_001, 20_000, QualityTier::P144),
        ]
    }
}

/// Map a probe duration onto a tier. First matching band wins; `floor` otherwise.
pub fn tier_for_elapsed(elapsed_ms: i64, bands: &[TierBand], floor: QualityTier) -> QualityTier {
    bands
        .iter()
        .find(|band| band.contains(elapsed_ms))
        .map(|band| band.tier)
        .unwrap_or(floor)
}

/// Result of one probe.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeOutcome {
    /// Probe completed; `tier` was derived from `elapsed`.
    Measured { elapsed: Duration, tier: QualityTier },
    /// Probe failed and the floor tier was substituted.
    Failed { tier: QualityTier, reason: String },
}

impl ProbeOutcome {
    pub fn tier(&self) -> QualityTier {
        match self {
            ProbeOutcome::Measured { tier, .. } | ProbeOutcome::Failed { tier, .. } => *tier,
        }
    }

    pub fn elapsed(&self) -> Option<Duration> {
        match self {
            ProbeOutcome::Measured { elapsed, .. } => Some(*elapsed),
            ProbeOutcome::Failed { .. } => None,
        }
    }
}

/// Picks a quality tier by timing a calibration fetch.
#[derive(Clone)]
pub struct ResolutionSelector {
    fetcher: Arc<dyn Fetcher>,
    bands: Vec<TierBand>,
    floor: QualityTier,
    policy: ProbeFailurePolicy,
}

impl fmt::Debug for ResolutionSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolutionSelector")
            .field("bands", &self.bands)
            .field("floor", &self.floor)
            .field("policy", &self.policy)
            .finish()
    }
}

impl ResolutionSelector {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        bands: Vec<TierBand>,
        floor: QualityTier,
        policy: ProbeFailurePolicy,
    ) -> Self {
        Self {
            fetcher,
            bands,
            floor,
            policy,
        }
    }

    /// Build a selector from the resolution-related fields of `settings`.
    pub fn from_settings(fetcher: Arc<dyn Fetcher>, settings: &PlayerSettings) -> Self {
        Self::new(
            fetcher,
            settings.tier_bands.clone(),
            settings.floor_tier,
            settings.probe_failure_policy,
        )
    }

    /// Probe `probe_url` and return the tier to use for the next segment.
    pub async fn select(&self, probe_url: &str) -> PlayerResult<QualityTier> {
        self.probe(probe_url).await.map(|outcome| outcome.tier())
    }

    /// Probe `probe_url` and report how the tier was obtained.
    pub async fn probe(&self, probe_url: &str) -> PlayerResult<ProbeOutcome> {
        match self.fetcher.fetch_timed(probe_url).await {
            Ok((bytes, elapsed)) => {
                let elapsed_ms = i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX);
                let tier = tier_for_elapsed(elapsed_ms, &self.bands, self.floor);
                debug!(
                    url = probe_url,
                    elapsed_ms,
                    bytes = bytes.len(),
                    tier = tier.0,
                    "bandwidth probe measured"
                );
                Ok(ProbeOutcome::Measured { elapsed, tier })
            }
            Err(e) => match self.policy {
                ProbeFailurePolicy::FloorTier => {
                    warn!(
                        url = probe_url,
                        error = %e,
                        tier = self.floor.0,
                        "bandwidth probe failed, using floor tier"
                    );
                    Ok(ProbeOutcome::Failed {
                        tier: self.floor,
                        reason: e.to_string(),
                    })
                }
                ProbeFailurePolicy::Propagate => Err(e.with_context("bandwidth probe")),
            },
        }
    }
}
