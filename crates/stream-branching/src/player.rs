//! Async branching playback engine.
//!
//! [`BranchingPlayer`] wires a [`Session`] to its collaborators and runs it on a
//! tokio task. The engine task multiplexes four inputs:
//! - cancellation (session end),
//! - the poll ticker that samples the play-head for decision points,
//! - viewer commands from [`PlayerHandle`],
//! - load reports from the ingest worker (see [`crate::worker`]).
//!
//! Segment loads run on the worker task, so the poll keeps sampling while the next
//! segment is still downloading. Polling starts only after the intro was ingested.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::abr::ResolutionSelector;
use crate::error::{PlayerError, PlayerResult};
use crate::events::PlayerEvent;
use crate::manifest::Manifest;
use crate::session::{ActiveSelection, PlaybackState, Session};
use crate::settings::PlayerSettings;
use crate::traits::{DecisionUi, Fetcher, PlaybackBuffer, PlaybackSurface};
use crate::worker::{IngestJob, IngestReport, IngestWorker};

/// External collaborators injected into the engine.
pub struct Collaborators {
    pub fetcher: Arc<dyn Fetcher>,
    pub surface: Arc<dyn PlaybackSurface>,
    pub buffer: Box<dyn PlaybackBuffer>,
    pub ui: Arc<dyn DecisionUi>,
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

enum PlayerCommand {
    Choose {
        key: String,
        reply: oneshot::Sender<PlayerResult<()>>,
    },
}

#[derive(Debug, Default)]
struct SharedState {
    state: PlaybackState,
    timeline_secs: f64,
}

/// A branching player that has not been started yet.
#[derive(Debug)]
pub struct BranchingPlayer {
    manifest: Arc<Manifest>,
    settings: PlayerSettings,
    collaborators: Collaborators,
    events: broadcast::Sender<PlayerEvent>,
}

impl BranchingPlayer {
    pub fn new(
        manifest: Arc<Manifest>,
        settings: PlayerSettings,
        collaborators: Collaborators,
    ) -> Self {
        let (events, _) = broadcast::channel(settings.event_channel_capacity.max(1));
        Self {
            manifest,
            settings,
            collaborators,
            events,
        }
    }

    /// Subscribe to events before the engine starts, so none are missed.
    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.events.subscribe()
    }

    /// Check the codec and start the session. Must be called within a tokio runtime.
    ///
    /// Fails with [`PlayerError::CodecUnsupported`] (also reported to the decision UI)
    /// when the playback surface rejects the manifest codec; nothing is fetched then.
    pub fn spawn(self) -> PlayerResult<PlayerHandle> {
        let Self {
            manifest,
            settings,
            collaborators,
            events,
        } = self;
        let Collaborators {
            fetcher,
            surface,
            buffer,
            ui,
        } = collaborators;

        let mut session = Session::new(manifest.clone(), settings.loop_delay_secs);

        if !surface.supports_codec(manifest.codec()) {
            let err = PlayerError::CodecUnsupported(manifest.codec().to_string());
            warn!(codec = manifest.codec(), "playback surface rejected codec");
            ui.report_error(&err);
            return Err(err);
        }
        session.begin_priming()?;

        let cancel = CancellationToken::new();
        let shared = Arc::new(RwLock::new(SharedState {
            state: session.state().clone(),
            timeline_secs: 0.0,
        }));
        let _ = events.send(PlayerEvent::StateChanged {
            state: session.state().name(),
        });

        let (job_tx, job_rx) = mpsc::unbounded_channel();
        let (report_tx, report_rx) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = mpsc::channel(settings.command_channel_capacity.max(1));

        let selector = ResolutionSelector::from_settings(fetcher.clone(), &settings);
        let worker = IngestWorker::new(
            manifest,
            settings.host.clone(),
            settings.probe_tier,
            selector,
            fetcher,
            buffer,
            job_rx,
            report_tx,
            events.clone(),
            cancel.clone(),
        );
        tokio::spawn(worker.run());

        let engine = Engine {
            session,
            settings,
            surface,
            ui,
            jobs: job_tx,
            reports: report_rx,
            commands: command_rx,
            events: events.clone(),
            shared: shared.clone(),
            cancel: cancel.clone(),
            polling: false,
        };
        let task = tokio::spawn(engine.run());

        Ok(PlayerHandle {
            commands: command_tx,
            events,
            shared,
            cancel,
            task,
        })
    }
}

/// Control handle of a running session. Dropping it ends the session.
#[derive(Debug)]
pub struct PlayerHandle {
    commands: mpsc::Sender<PlayerCommand>,
    events: broadcast::Sender<PlayerEvent>,
    shared: Arc<RwLock<SharedState>>,
    cancel: CancellationToken,
    task: JoinHandle<PlayerResult<()>>,
}

impl fmt::Debug for PlayerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayerCommand::Choose { key, .. } => {
                f.debug_struct("Choose").field("key", key).finish()
            }
        }
    }
}

impl PlayerHandle {
    /// Submit the viewer's choice for the open decision point.
    ///
    /// Resolves once the next selection was computed; the segment itself keeps
    /// loading in the background.
    pub async fn choose(&self, key: &str) -> PlayerResult<()> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(PlayerCommand::Choose {
                key: key.to_string(),
                reply,
            })
            .await
            .map_err(|_| PlayerError::Cancelled)?;
        rx.await.map_err(|_| PlayerError::Cancelled)?
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.events.subscribe()
    }

    /// Snapshot of the current playback state.
    pub fn state(&self) -> PlaybackState {
        self.shared.read().state.clone()
    }

    /// Total media duration ingested so far.
    pub fn timeline_secs(&self) -> f64 {
        self.shared.read().timeline_secs
    }

    /// End the session.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the engine task to stop and return how it ended.
    pub async fn join(self) -> PlayerResult<()> {
        let Self { task, commands, .. } = self;
        // Keep the command channel open until the engine stopped on its own.
        let res = task
            .await
            .map_err(|e| PlayerError::msg(format!("player task failed: {e}")))?;
        drop(commands);
        res
    }
}

struct Engine {
    session: Session,
    settings: PlayerSettings,
    surface: Arc<dyn PlaybackSurface>,
    ui: Arc<dyn DecisionUi>,
    jobs: mpsc::UnboundedSender<IngestJob>,
    reports: mpsc::UnboundedReceiver<IngestReport>,
    commands: mpsc::Receiver<PlayerCommand>,
    events: broadcast::Sender<PlayerEvent>,
    shared: Arc<RwLock<SharedState>>,
    cancel: CancellationToken,
    /// Set once the intro was ingested; the play-head is not sampled before that.
    polling: bool,
}

impl Engine {
    async fn run(mut self) -> PlayerResult<()> {
        let res = self.run_loop().await;
        // Stop the ingest worker together with the engine.
        self.cancel.cancel();
        if let Err(e) = &res {
            warn!(error = %e, "playback session ended with error");
        }
        res
    }

    async fn run_loop(&mut self) -> PlayerResult<()> {
        let intro = self.session.start(self.surface.current_time())?;
        self.on_selection(&intro)?;

        let mut ticker = interval(self.settings.poll_interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let cancel = self.cancel.clone();
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("playback session cancelled");
                    return Ok(());
                }
                report = self.reports.recv() => match report {
                    Some(report) => self.on_report(report)?,
                    None => return Err(PlayerError::msg("ingest worker stopped unexpectedly")),
                },
                command = self.commands.recv() => match command {
                    Some(command) => self.on_command(command),
                    None => {
                        debug!("all player handles dropped");
                        return Ok(());
                    }
                },
                _ = ticker.tick(), if self.polling => self.on_tick(),
            }
        }
    }

    fn on_tick(&mut self) {
        let play_head = self.surface.current_time();
        let Some(options) = self.session.poll(play_head) else {
            return;
        };
        let key = self
            .session
            .state()
            .selection()
            .map(|s| s.key.clone())
            .unwrap_or_default();

        self.ui.present_options(&options);
        self.publish_state();
        let _ = self.events.send(PlayerEvent::DecisionPoint { key, options });
    }

    fn on_command(&mut self, command: PlayerCommand) {
        match command {
            PlayerCommand::Choose { key, reply } => {
                let res = self.choose(&key);
                if let Err(e) = &res {
                    warn!(key = %key, error = %e, "choice rejected");
                }
                let _ = reply.send(res);
            }
        }
    }

    fn choose(&mut self, key: &str) -> PlayerResult<()> {
        let play_head = self.surface.current_time();
        let selection = self.session.choose(key, play_head)?;
        info!(
            key = %selection.key,
            play_head,
            decision_at = ?selection.decision_at,
            loop_delay_applied = selection.loop_delay_applied,
            "branch selected"
        );
        // Buffered content keeps playing while the next segment loads.
        self.surface.play();
        self.on_selection(&selection)
    }

    fn on_selection(&mut self, selection: &ActiveSelection) -> PlayerResult<()> {
        self.publish_state();
        let _ = self.events.send(PlayerEvent::SelectionChanged {
            key: selection.key.clone(),
            url: selection.url().to_string(),
            decision_at: selection.decision_at,
            loop_delay_applied: selection.loop_delay_applied,
        });

        self.jobs
            .send(IngestJob {
                selection: selection.id,
                key: selection.key.clone(),
                url_template: selection.url().to_string(),
            })
            .map_err(|_| PlayerError::msg("ingest worker is not running"))
    }

    fn on_report(&mut self, report: IngestReport) -> PlayerResult<()> {
        match report {
            IngestReport::Completed { selection, segment } => {
                debug!(selection = selection.0, key = %segment.key, "segment ready");
                self.shared.write().timeline_secs = segment.timeline;
                if !self.polling {
                    debug!("first segment ingested, polling play-head");
                    self.polling = true;
                }
                let _ = self.events.send(PlayerEvent::SegmentIngested(segment));
                Ok(())
            }
            IngestReport::Failed {
                selection,
                key,
                error,
            } => {
                warn!(selection = selection.0, key = %key, error = %error, "segment load failed");
                self.ui.report_error(&error);
                let _ = self.events.send(PlayerEvent::SegmentFailed {
                    key,
                    error: error.clone(),
                });
                Err(error)
            }
        }
    }

    fn publish_state(&self) {
        let state = self.session.state().clone();
        let name = state.name();
        self.shared.write().state = state;
        let _ = self.events.send(PlayerEvent::StateChanged { state: name });
    }
}
