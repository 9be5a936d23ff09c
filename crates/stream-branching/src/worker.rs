//! Segment ingest worker.
//!
//! The worker owns the playback buffer and the timeline. It consumes load jobs in
//! FIFO order, so the append of segment N+1 never starts before segment N signalled
//! completion, while the engine keeps polling the play-head on its own task.
//!
//! Per job:
//! 1. probe the calibration URL and pick a tier,
//! 2. resolve the segment URL (tier + host) and read its duration,
//! 3. fetch the bytes and append them,
//! 4. advance the timeline and stamp the placement for the next segment.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::abr::{QualityTier, ResolutionSelector};
use crate::error::{PlayerError, PlayerResult};
use crate::events::{PlayerEvent, SegmentIngested};
use crate::manifest::Manifest;
use crate::session::SelectionId;
use crate::template::{parse_manifest_url, segment_duration};
use crate::timeline::Timeline;
use crate::traits::{Fetcher, PlaybackBuffer};

/// Request to load one segment.
#[derive(Debug, Clone)]
pub(crate) struct IngestJob {
    pub selection: SelectionId,
    pub key: String,
    /// Manifest URL template (tokens not substituted).
    pub url_template: String,
}

/// Outcome of one job, reported back to the engine.
#[derive(Debug)]
pub(crate) enum IngestReport {
    Completed {
        selection: SelectionId,
        segment: SegmentIngested,
    },
    Failed {
        selection: SelectionId,
        key: String,
        error: PlayerError,
    },
}

pub(crate) struct IngestWorker {
    manifest: Arc<Manifest>,
    host: String,
    probe_tier: QualityTier,
    selector: ResolutionSelector,
    fetcher: Arc<dyn Fetcher>,
    buffer: Box<dyn PlaybackBuffer>,
    timeline: Timeline,
    jobs: mpsc::UnboundedReceiver<IngestJob>,
    reports: mpsc::UnboundedSender<IngestReport>,
    events: broadcast::Sender<PlayerEvent>,
    cancel: CancellationToken,
}

impl IngestWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        manifest: Arc<Manifest>,
        host: String,
        probe_tier: QualityTier,
        selector: ResolutionSelector,
        fetcher: Arc<dyn Fetcher>,
        buffer: Box<dyn PlaybackBuffer>,
        jobs: mpsc::UnboundedReceiver<IngestJob>,
        reports: mpsc::UnboundedSender<IngestReport>,
        events: broadcast::Sender<PlayerEvent>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            manifest,
            host,
            probe_tier,
            selector,
            fetcher,
            buffer,
            timeline: Timeline::new(),
            jobs,
            reports,
            events,
            cancel,
        }
    }

    pub async fn run(mut self) {
        // New content starts at the beginning of the timeline.
        self.buffer.set_timestamp_offset(self.timeline.placement());

        let cancel = self.cancel.clone();
        loop {
            let job = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                job = self.jobs.recv() => match job {
                    Some(job) => job,
                    None => break,
                },
            };

            let report = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                res = self.load(&job) => match res {
                    Ok(segment) => IngestReport::Completed {
                        selection: job.selection,
                        segment,
                    },
                    Err(error) => IngestReport::Failed {
                        selection: job.selection,
                        key: job.key.clone(),
                        error,
                    },
                },
            };

            if self.reports.send(report).is_err() {
                break;
            }
        }

        trace!(segments = self.timeline.segments(), "ingest worker stopped");
    }

    fn resolve(&self, template: &str, tier: QualityTier) -> String {
        parse_manifest_url(
            template,
            tier,
            self.manifest.tier_tag(),
            self.manifest.host_tag(),
            &self.host,
        )
    }

    async fn load(&mut self, job: &IngestJob) -> PlayerResult<SegmentIngested> {
        let probe_url = self.resolve(self.manifest.calibration_url(), self.probe_tier);
        let outcome = self.selector.probe(&probe_url).await?;
        let tier = outcome.tier();
        let _ = self.events.send(PlayerEvent::ResolutionSelected {
            key: job.key.clone(),
            outcome,
        });

        let url = self.resolve(&job.url_template, tier);
        let duration = segment_duration(&url)?;
        let placement = self.timeline.placement();

        debug!(key = %job.key, url = %url, tier = tier.0, placement, "fetching segment");
        let data = self
            .fetcher
            .fetch(&url)
            .await
            .map_err(|e| e.with_context("segment fetch"))?;
        let bytes = data.len();

        self.buffer.append(data).await?;

        let total = self.timeline.advance(duration);
        self.buffer.set_timestamp_offset(total);

        info!(
            key = %job.key,
            tier = tier.0,
            bytes,
            placement,
            duration,
            timeline = total,
            "segment ingested"
        );

        Ok(SegmentIngested {
            key: job.key.clone(),
            url,
            tier,
            placement,
            duration,
            timeline: total,
            bytes,
        })
    }
}
