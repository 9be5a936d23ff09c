//! Local HTTP fixture serving a branching manifest's probe and segments.
//!
//! Routes:
//! - `/probe-1-{tier}.mp4`: calibration resource, optionally delayed,
//! - `/seg/{name}`: segment payloads.
//!
//! Every request (including 404s) is counted per path.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::Path;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use bytes::Bytes;
use parking_lot::Mutex;

/// Manifest served by the fixture; `{host}` is substituted by the player.
pub const MANIFEST: &str = r#"{
    "codec": "video/mp4; codecs=\"avc1.640029, mp4a.40.5\"",
    "hostTag": "{host}",
    "fileResolutionTag": "{resolution}",
    "calibration": { "url": "{host}probe-1-{resolution}.mp4" },
    "intro": {
        "url": "{host}seg/intro-10-{resolution}.mp4",
        "at": 5,
        "options": [ { "label": "Left", "next": "left" }, { "label": "Right", "next": "right" } ]
    },
    "left": { "url": "{host}seg/left-8-{resolution}.mp4" },
    "right": { "url": "{host}seg/right-6-{resolution}.mp4" }
}"#;

pub const SEGMENT_LEN: usize = 4096;

#[derive(Clone)]
pub struct BranchFixture {
    blobs: Arc<HashMap<String, Bytes>>,
    probe_delay: Duration,
    request_counts: Arc<Mutex<HashMap<String, u64>>>,
}

impl BranchFixture {
    pub fn new() -> Self {
        let mut blobs = HashMap::new();
        for tier in [144, 360, 720] {
            blobs.insert(
                format!("probe-1-{tier}.mp4"),
                Bytes::from(vec![0xAB; 512]),
            );
            for (name, secs) in [("intro", 10), ("left", 8), ("right", 6)] {
                blobs.insert(
                    format!("seg/{name}-{secs}-{tier}.mp4"),
                    Bytes::from(vec![tier as u8; SEGMENT_LEN]),
                );
            }
        }
        Self {
            blobs: Arc::new(blobs),
            probe_delay: Duration::ZERO,
            request_counts: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Delay every calibration response by `delay`.
    pub fn with_probe_delay(mut self, delay: Duration) -> Self {
        self.probe_delay = delay;
        self
    }

    /// Number of requests seen for `path` (leading `/` included).
    pub fn request_count(&self, path: &str) -> u64 {
        self.request_counts.lock().get(path).copied().unwrap_or(0)
    }

    pub fn requested_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.request_counts.lock().keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Start the server and return its base URL (ending with `/`).
    pub async fn start(&self) -> String {
        let app = self.build_router();

        let listener = std::net::TcpListener::bind("127.0.0.1:0")
            .expect("failed to bind local fixture server");
        listener
            .set_nonblocking(true)
            .expect("failed to set nonblocking on fixture listener");
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let listener = tokio::net::TcpListener::from_std(listener)
                .expect("failed to convert fixture listener to tokio listener");
            axum::serve(listener, app).await.unwrap();
        });

        format!("http://{addr}/")
    }

    fn build_router(&self) -> Router {
        async fn serve_blob(
            key: String,
            fixture: BranchFixture,
        ) -> impl IntoResponse {
            *fixture
                .request_counts
                .lock()
                .entry(format!("/{key}"))
                .or_insert(0) += 1;

            if key.starts_with("probe-") && fixture.probe_delay != Duration::ZERO {
                tokio::time::sleep(fixture.probe_delay).await;
            }

            let Some(bytes) = fixture.blobs.get(&key) else {
                return (StatusCode::NOT_FOUND, HeaderMap::new(), Bytes::new());
            };

            let mut headers = HeaderMap::new();
            headers.insert(
                axum::http::header::CONTENT_TYPE,
                HeaderValue::from_static("video/mp4"),
            );
            (StatusCode::OK, headers, bytes.clone())
        }

        Router::new()
            .route(
                "/seg/{name}",
                get({
                    let fixture = self.clone();
                    move |Path(name): Path<String>| serve_blob(format!("seg/{name}"), fixture.clone())
                }),
            )
            .route(
                "/{path}",
                get({
                    let fixture = self.clone();
                    move |Path(path): Path<String>| serve_blob(path, fixture.clone())
                }),
            )
    }
}
