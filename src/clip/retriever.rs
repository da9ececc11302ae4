// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! Clip retrieval: direct export with retries, playlist rebuild as fallback.
//!
//! Failure policy:
//!  - non-2xx or transport error on the direct path → returned as is, no fallback;
//!  - 2xx with an empty body → retried, then the playlist fallback runs;
//!  - fallback failures reached that way are reported as `EmptyClip`.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::clip::endpoints::NvrEndpoints;
use crate::clip::proxy::VodProxy;
use crate::clip::reconstruct::PlaylistReconstructor;
use crate::clip::source::{HttpSource, MediaSource};
use crate::clip::{ClipAsset, ClipOrigin, ClipRequest, ContainerKind};
use crate::config::{ClipConfig, Config};
use crate::error::{MediaError, Result};
use crate::retry::{retry_on_empty, Attempt, RetryOutcome, RetryPolicy};

pub struct ClipRetriever {
    source: Arc<dyn MediaSource>,
    endpoints: NvrEndpoints,
    policy: RetryPolicy,
    reconstructor: PlaylistReconstructor,
    proxy: VodProxy,
    deadline: Option<Duration>,
}

impl ClipRetriever {
    pub fn new(source: Arc<dyn MediaSource>, endpoints: NvrEndpoints, config: &ClipConfig) -> Self {
        let reconstructor =
            PlaylistReconstructor::new(source.clone(), endpoints.clone(), config.segment_concurrency);
        let proxy = VodProxy::new(source.clone(), endpoints.clone());
        Self {
            source,
            endpoints,
            policy: RetryPolicy::from_config(config),
            reconstructor,
            proxy,
            deadline: config.deadline(),
        }
    }

    /// Retriever talking HTTP to the server named in `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let source = Arc::new(HttpSource::new(&config.server)?);
        let endpoints = NvrEndpoints::new(&config.server.base_url)?;
        Ok(Self::new(source, endpoints, &config.clip))
    }

    /// The playlist fallback on its own; its errors are not folded.
    pub fn reconstructor(&self) -> &PlaylistReconstructor {
        &self.reconstructor
    }

    /// Proxy for the clip's VOD files, sharing this retriever's source.
    pub fn vod_proxy(&self) -> &VodProxy {
        &self.proxy
    }

    pub async fn fetch_clip(&self, camera: &str, start: i64, end: i64) -> Result<ClipAsset> {
        self.fetch_clip_with_token(camera, start, end, &CancellationToken::new())
            .await
    }

    /// Like [`fetch_clip`](Self::fetch_clip), stopping early when `token` is
    /// cancelled.
    pub async fn fetch_clip_with_token(
        &self,
        camera: &str,
        start: i64,
        end: i64,
        token: &CancellationToken,
    ) -> Result<ClipAsset> {
        let request = ClipRequest::new(camera, start, end)?;
        match self.deadline {
            Some(limit) => tokio::time::timeout(limit, self.retrieve(&request, token))
                .await
                .map_err(|_| MediaError::Timeout(limit))?,
            None => self.retrieve(&request, token).await,
        }
    }

    async fn retrieve(&self, request: &ClipRequest, token: &CancellationToken) -> Result<ClipAsset> {
        let url = self.endpoints.clip_url(request);
        info!(
            camera = request.camera,
            start = request.start,
            end = request.end,
            duration_secs = request.duration_secs(),
            "Fetching clip"
        );

        let outcome =
            retry_on_empty(&self.policy, token, |attempt| self.attempt_direct(&url, attempt, token))
                .await?;

        match outcome {
            RetryOutcome::Done { value, attempts } => {
                let asset = ClipAsset::new(request, value, ClipOrigin::Direct { attempts });
                if asset.container != ContainerKind::Mp4 {
                    warn!(
                        camera = request.camera,
                        bytes = asset.len(),
                        "Clip does not carry an ftyp box at offset 4, returning it anyway"
                    );
                }
                info!(camera = request.camera, attempts, bytes = asset.len(), "Clip downloaded");
                Ok(asset)
            }
            RetryOutcome::Exhausted { attempts } => {
                warn!(
                    camera = request.camera,
                    attempts,
                    "Direct download stayed empty, rebuilding from playlist"
                );
                self.fallback(request, token).await
            }
        }
    }

    async fn attempt_direct(
        &self,
        url: &Url,
        attempt: u32,
        token: &CancellationToken,
    ) -> Attempt<Bytes> {
        let fetched = tokio::select! {
            _ = token.cancelled() => return Attempt::Fail(MediaError::Cancelled),
            r = self.source.fetch(url) => r,
        };
        match fetched {
            Err(err) => Attempt::Fail(err),
            Ok(response) if !response.is_success() => Attempt::Fail(MediaError::Upstream {
                status: response.status,
                url: url.to_string(),
            }),
            Ok(response) if response.body.is_empty() => {
                debug!(url = %url, attempt, "Direct download returned an empty body");
                Attempt::Empty
            }
            Ok(response) => Attempt::Done(response.body),
        }
    }

    async fn fallback(&self, request: &ClipRequest, token: &CancellationToken) -> Result<ClipAsset> {
        match self.reconstructor.reconstruct(request, token).await {
            Ok(rebuilt) => Ok(ClipAsset::new(
                request,
                rebuilt.data,
                ClipOrigin::Reconstructed { segments: rebuilt.segments },
            )),
            Err(err) if err.is_fallback_error() || matches!(err, MediaError::EmptyClip { .. }) => {
                warn!(camera = request.camera, error = %err, "Playlist fallback failed");
                Err(request.empty_clip())
            }
            Err(err) => Err(err),
        }
    }
}
