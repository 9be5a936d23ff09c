//! HTTP [`Fetcher`] built on `reqwest`.
//!
//! Supports cancellation and bounded waiting: `idle_timeout` bounds the gap between
//! two body chunks, `request_timeout` bounds a whole download. There are no automatic
//! retries; a failed fetch is reported to the caller as-is.

use std::fmt::Display;
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures_util::{Stream, StreamExt};
use reqwest::Client;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};
use url::Url;

use crate::error::{PlayerError, PlayerResult};
use crate::settings::PlayerSettings;
use crate::traits::Fetcher;

/// HTTP downloader for probes and segments.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    request_timeout: Duration,
    idle_timeout: Duration,
    cancel: CancellationToken,
}

impl HttpFetcher {
    /// Creates a new fetcher around an existing client.
    pub fn new(
        client: Client,
        request_timeout: Duration,
        idle_timeout: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            client,
            request_timeout,
            idle_timeout,
            cancel,
        }
    }

    /// Creates a fetcher with a default client and the timeouts from `settings`.
    pub fn from_settings(settings: &PlayerSettings, cancel: CancellationToken) -> Self {
        Self::new(
            Client::new(),
            settings.request_timeout,
            settings.idle_timeout,
            cancel,
        )
    }

    /// Returns the cancellation token used by this fetcher.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    fn parse_url(url: &str) -> PlayerResult<Url> {
        Url::parse(url).map_err(|e| PlayerError::InvalidUrl(format!("{url}: {e}")))
    }

    async fn download_once(&self, url: Url) -> PlayerResult<Bytes> {
        let url_str = url.to_string();

        let response = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(PlayerError::Cancelled),
            res = timeout(self.request_timeout, self.client.get(url).send()) => match res {
                Ok(Ok(resp)) => resp,
                Ok(Err(e)) if e.is_timeout() => return Err(PlayerError::Timeout(url_str)),
                Ok(Err(e)) => return Err(PlayerError::network(url_str, e)),
                Err(_) => return Err(PlayerError::Timeout(url_str)),
            },
        };

        let status = response.status();
        if !status.is_success() {
            return Err(PlayerError::HttpStatus {
                status: status.as_u16(),
                url: url_str,
            });
        }

        Self::collect_stream_to_bytes(
            Box::pin(response.bytes_stream()),
            &self.cancel,
            self.idle_timeout,
            &url_str,
        )
        .await
    }

    async fn collect_stream_to_bytes<S, E>(
        mut stream: S,
        cancel: &CancellationToken,
        idle_timeout: Duration,
        url: &str,
    ) -> PlayerResult<Bytes>
    where
        S: Stream<Item = Result<Bytes, E>> + Unpin,
        E: Display,
    {
        let mut buf = BytesMut::with_capacity(16 * 1024);

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(PlayerError::Cancelled),
                item = timeout(idle_timeout, stream.next()) => match item {
                    Ok(v) => v,
                    Err(_) => return Err(PlayerError::Timeout(url.to_string())),
                },
            };

            match next {
                Some(Ok(chunk)) => {
                    trace!(url, chunk = chunk.len(), "body chunk");
                    buf.extend_from_slice(&chunk);
                }
                Some(Err(e)) => return Err(PlayerError::network(url, e)),
                None => break,
            }
        }

        Ok(buf.freeze())
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> PlayerResult<Bytes> {
        let parsed = Self::parse_url(url)?;

        // Bound the whole attempt while letting slow-but-progressing bodies finish
        // within it.
        let bytes = match timeout(self.request_timeout, self.download_once(parsed)).await {
            Ok(res) => res?,
            Err(_) => return Err(PlayerError::Timeout(url.to_string())),
        };

        debug!(url, bytes = bytes.len(), "download finished");
        Ok(bytes)
    }
}
