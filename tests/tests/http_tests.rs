//! HTTP integration tests.
//!
//! All tests run against a local in-memory fixture server (no external network):
//! - `HttpFetcher` status and timeout mapping,
//! - tier selection from real probe latency,
//! - a full intro load through the player.

use std::sync::Arc;
use std::time::Duration;

use rstest::rstest;
use tokio_util::sync::CancellationToken;

use stream_branching::{
    BranchingPlayer, Collaborators, Fetcher, HttpFetcher, Manifest, PlayerError, PlayerEvent,
    PlayerSettings, ProbeFailurePolicy, ProbeOutcome, QualityTier, ResolutionSelector,
};

mod branch_fixture;

use branch_fixture::{BranchFixture, MANIFEST, SEGMENT_LEN};
use doubles::{ManualSurface, RecordingBuffer, RecordingUi, wait_for};

fn fetcher(settings: &PlayerSettings) -> Arc<HttpFetcher> {
    Arc::new(HttpFetcher::from_settings(settings, CancellationToken::new()))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn fetcher_downloads_full_body() {
    let fixture = BranchFixture::new();
    let base = fixture.start().await;
    let fetcher = fetcher(&PlayerSettings::new());

    let bytes = fetcher
        .fetch(&format!("{base}seg/left-8-360.mp4"))
        .await
        .expect("download");
    assert_eq!(bytes.len(), SEGMENT_LEN);
    assert_eq!(fixture.request_count("/seg/left-8-360.mp4"), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn fetcher_maps_missing_resource_to_status_error() {
    let fixture = BranchFixture::new();
    let base = fixture.start().await;
    let fetcher = fetcher(&PlayerSettings::new());

    let err = fetcher
        .fetch(&format!("{base}seg/nowhere-3-720.mp4"))
        .await
        .expect_err("404");
    assert!(matches!(err, PlayerError::HttpStatus { status: 404, .. }));
    assert!(err.is_transport());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn fetcher_times_out_on_slow_response() {
    let fixture = BranchFixture::new().with_probe_delay(Duration::from_secs(5));
    let base = fixture.start().await;
    let fetcher = fetcher(&PlayerSettings::new().request_timeout(Duration::from_millis(300)));

    let err = fetcher
        .fetch(&format!("{base}probe-1-144.mp4"))
        .await
        .expect_err("timeout");
    assert!(matches!(err, PlayerError::Timeout(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn fetcher_rejects_untemplated_url() {
    let fetcher = fetcher(&PlayerSettings::new());
    let err = fetcher
        .fetch("{host}seg/intro-10-720.mp4")
        .await
        .expect_err("invalid url");
    assert!(matches!(err, PlayerError::InvalidUrl(_)));
}

#[rstest]
#[case(Duration::ZERO, QualityTier::P720)]
#[case(Duration::from_millis(1_200), QualityTier::P360)]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn probe_latency_selects_tier(#[case] delay: Duration, #[case] expected: QualityTier) {
    let fixture = BranchFixture::new().with_probe_delay(delay);
    let base = fixture.start().await;
    let settings = PlayerSettings::new();
    let selector = ResolutionSelector::from_settings(fetcher(&settings), &settings);

    let outcome = selector
        .probe(&format!("{base}probe-1-144.mp4"))
        .await
        .expect("probe");
    assert!(matches!(outcome, ProbeOutcome::Measured { .. }));
    assert_eq!(outcome.tier(), expected);
    assert!(outcome.elapsed().expect("measured") >= delay);
}

#[rstest]
#[case(ProbeFailurePolicy::FloorTier, Ok(QualityTier::P144))]
#[case(ProbeFailurePolicy::Propagate, Err(()))]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failed_probe_follows_policy(
    #[case] policy: ProbeFailurePolicy,
    #[case] expected: Result<QualityTier, ()>,
) {
    let fixture = BranchFixture::new();
    let base = fixture.start().await;
    let settings = PlayerSettings::new().probe_failure_policy(policy);
    let selector = ResolutionSelector::from_settings(fetcher(&settings), &settings);

    let res = selector.select(&format!("{base}probe-missing.mp4")).await;
    match expected {
        Ok(tier) => assert_eq!(res.expect("floor tier"), tier),
        Err(()) => {
            let err = res.expect_err("propagated");
            assert!(matches!(err.root(), PlayerError::HttpStatus { status: 404, .. }));
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn player_loads_intro_over_http() {
    let fixture = BranchFixture::new();
    let base = fixture.start().await;

    let settings = PlayerSettings::new()
        .host(base.clone())
        .poll_interval(Duration::from_millis(50));
    let manifest = Arc::new(Manifest::from_json(MANIFEST).expect("manifest"));
    let surface = ManualSurface::new(true);
    let ui = RecordingUi::new();
    let (buffer, log) = RecordingBuffer::new();

    let player = BranchingPlayer::new(
        manifest,
        settings.clone(),
        Collaborators {
            fetcher: fetcher(&settings),
            surface: surface.clone(),
            buffer,
            ui: ui.clone(),
        },
    );
    let mut events = player.subscribe();
    let handle = player.spawn().expect("spawn");

    let PlayerEvent::SegmentIngested(intro) = wait_for(&mut events, |ev| {
        matches!(ev, PlayerEvent::SegmentIngested(s) if s.key == "intro")
    })
    .await
    else {
        unreachable!()
    };
    assert_eq!(intro.tier, QualityTier::P720);
    assert_eq!(intro.url, format!("{base}seg/intro-10-720.mp4"));
    assert_eq!(intro.bytes, SEGMENT_LEN);
    assert_eq!(intro.timeline, 10.0);

    // The calibration resource is always requested at the probe tier.
    assert_eq!(fixture.request_count("/probe-1-144.mp4"), 1);
    assert_eq!(fixture.request_count("/seg/intro-10-720.mp4"), 1);

    surface.set_time(5.2);
    wait_for(&mut events, |ev| matches!(ev, PlayerEvent::DecisionPoint { .. })).await;
    handle.choose("right").await.expect("choose");
    wait_for(&mut events, |ev| {
        matches!(ev, PlayerEvent::SegmentIngested(s) if s.key == "right")
    })
    .await;

    assert_eq!(log.placements(), vec![0.0, 10.0]);
    assert_eq!(handle.timeline_secs(), 16.0);
    assert_eq!(ui.presented().len(), 1);
    assert_eq!(
        fixture.requested_paths(),
        vec![
            "/probe-1-144.mp4".to_string(),
            "/seg/intro-10-720.mp4".to_string(),
            "/seg/right-6-720.mp4".to_string(),
        ]
    );

    handle.cancel();
    handle.join().await.expect("clean shutdown");
}
