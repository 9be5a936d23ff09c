use std::io::{self, BufRead};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};

use stream_branching::{
    BranchingPlayer, ChapterOption, Collaborators, DecisionUi, HttpFetcher, Manifest,
    PlaybackBuffer, PlaybackSurface, PlayerError, PlayerEvent, PlayerResult, PlayerSettings,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, metadata::LevelFilter, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
enum UserCommand {
    Choose(String),
    Status,
    Quit,
}

fn print_usage() {
    eprintln!("branching_cli - play a branching manifest without rendering video");
    eprintln!("Usage:");
    eprintln!("  branching_cli <manifest.json> <host>");
    eprintln!();
    eprintln!("Interactive commands during playback:");
    eprintln!("  <key>   - pick the option leading to chapter <key>");
    eprintln!("  status  - print state and buffered duration");
    eprintln!("  quit    - exit");
    eprintln!();
}

fn spawn_stdin_command_loop(tx: mpsc::UnboundedSender<UserCommand>) {
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let cmd = match trimmed.to_lowercase().as_str() {
                "quit" | "exit" => UserCommand::Quit,
                "status" => UserCommand::Status,
                key => UserCommand::Choose(key.to_string()),
            };
            if tx.send(cmd).is_err() {
                break;
            }
        }
    });
}

/// Play-head driven by the wall clock, stalled at the end of buffered media.
struct ClockSurface {
    started: Mutex<Option<Instant>>,
    buffered: Arc<Mutex<f64>>,
}

impl PlaybackSurface for ClockSurface {
    fn current_time(&self) -> f64 {
        let started = *self.started.lock();
        let elapsed = started.map(|t| t.elapsed().as_secs_f64()).unwrap_or(0.0);
        elapsed.min(*self.buffered.lock())
    }

    fn supports_codec(&self, codec: &str) -> bool {
        codec.starts_with("video/mp4")
    }

    fn play(&self) {
        self.started.lock().get_or_insert_with(Instant::now);
    }
}

/// Counts appended bytes and tracks how far media is buffered.
struct CountingBuffer {
    bytes: usize,
    buffered: Arc<Mutex<f64>>,
}

#[async_trait]
impl PlaybackBuffer for CountingBuffer {
    async fn append(&mut self, data: Bytes) -> PlayerResult<()> {
        self.bytes += data.len();
        Ok(())
    }

    fn set_timestamp_offset(&mut self, offset: f64) {
        // The offset after an append is the end of buffered media.
        *self.buffered.lock() = offset;
        info!("buffered {:.1}s ({} bytes total)", offset, self.bytes);
    }
}

struct StdoutUi;

impl DecisionUi for StdoutUi {
    fn present_options(&self, options: &[ChapterOption]) {
        println!("Choose your path:");
        for option in options {
            println!("  {:<12} -> type `{}`", option.label, option.next);
        }
    }

    fn report_error(&self, error: &PlayerError) {
        eprintln!("Playback error: {error}");
    }
}

#[tokio::main]
async fn main() -> PlayerResult<()> {
    // Logging setup
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::default()
                .add_directive(
                    "stream_branching=debug"
                        .parse()
                        .map_err(|e| PlayerError::msg(format!("bad log directive: {e}")))?,
                )
                .add_directive(LevelFilter::INFO.into()),
        )
        .with_line_number(true)
        .with_file(true)
        .init();

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    if args.len() != 2 || args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }
    let (manifest_path, host) = (&args[0], &args[1]);

    let json = std::fs::read_to_string(manifest_path)
        .map_err(|e| PlayerError::msg(format!("failed to read {manifest_path}: {e}")))?;
    let manifest = Arc::new(Manifest::from_json(&json)?);

    info!("Starting branching playback demo");
    info!("  Manifest: {} ({} chapters)", manifest_path, manifest.len());
    info!("  Host: {}", host);
    info!("  Codec: {}", manifest.codec());

    let settings = PlayerSettings::new().host(host.clone());
    let buffered = Arc::new(Mutex::new(0.0));
    let surface = Arc::new(ClockSurface {
        started: Mutex::new(None),
        buffered: buffered.clone(),
    });
    surface.play();

    let player = BranchingPlayer::new(
        manifest,
        settings.clone(),
        Collaborators {
            fetcher: Arc::new(HttpFetcher::from_settings(
                &settings,
                CancellationToken::new(),
            )),
            surface: surface.clone(),
            buffer: Box::new(CountingBuffer {
                bytes: 0,
                buffered,
            }),
            ui: Arc::new(StdoutUi),
        },
    );
    let mut events = player.subscribe();
    let handle = player.spawn()?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    spawn_stdin_command_loop(tx);

    let mut status = tokio::time::interval(Duration::from_secs(5));
    loop {
        tokio::select! {
            cmd = rx.recv() => match cmd {
                Some(UserCommand::Choose(key)) => {
                    if let Err(e) = handle.choose(&key).await {
                        warn!("choice `{key}` rejected: {e}");
                    }
                }
                Some(UserCommand::Status) => {
                    println!(
                        "state={} play_head={:.1}s timeline={:.1}s",
                        handle.state(),
                        surface.current_time(),
                        handle.timeline_secs()
                    );
                }
                Some(UserCommand::Quit) | None => {
                    info!("Quit requested");
                    handle.cancel();
                    break;
                }
            },
            ev = events.recv() => match ev {
                Ok(PlayerEvent::SegmentIngested(s)) => {
                    info!(
                        "[{}] {}p {:.1}s at {:.1}s -> timeline {:.1}s",
                        s.key, s.tier, s.duration, s.placement, s.timeline
                    );
                }
                Ok(PlayerEvent::ResolutionSelected { key, outcome }) => {
                    info!("[{}] probe: {:?}", key, outcome);
                }
                Ok(PlayerEvent::SegmentFailed { key, error }) => {
                    warn!("[{}] failed: {}", key, error);
                    break;
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(n)) => warn!("missed {n} events"),
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = status.tick() => {
                info!("play_head={:.1}s state={}", surface.current_time(), handle.state());
            }
        }
    }

    handle.join().await
}
