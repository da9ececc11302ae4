// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! Pass-through proxy for the NVR's VOD tree of one clip.
//!
//! ```text
//! player ── GET /api/clips/hls?camera=..&file=master.m3u8 ──► proxy ──► {base}/vod/../master.m3u8
//!        ◄── playlist with every reference relinked to /api/clips/hls?..&file=<path>
//! ```
//!
//! Playlists are rewritten so the player never talks to the NVR directly.
//! Segments are returned byte for byte.

use std::sync::Arc;

use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use crate::clip::endpoints::NvrEndpoints;
use crate::clip::source::MediaSource;
use crate::clip::{ClipRequest, ContainerKind};
use crate::error::{MediaError, Result};
use crate::playlist;

/// Route the rewritten references point at.
pub const PROXY_ROUTE: &str = "/api/clips/hls";

pub const PLAYLIST_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";

/// One proxied VOD file.
#[derive(Debug, Clone)]
pub struct ProxiedFile {
    pub body: Bytes,
    pub content_type: &'static str,
    pub is_playlist: bool,
}

impl ProxiedFile {
    /// Playlists change with every rewrite, segments never do.
    pub fn cache_control(&self) -> &'static str {
        if self.is_playlist {
            "no-cache"
        } else {
            "public, max-age=3600"
        }
    }
}

pub struct VodProxy {
    source: Arc<dyn MediaSource>,
    endpoints: NvrEndpoints,
    route: String,
}

impl VodProxy {
    pub fn new(source: Arc<dyn MediaSource>, endpoints: NvrEndpoints) -> Self {
        Self::with_route(source, endpoints, PROXY_ROUTE)
    }

    pub fn with_route(
        source: Arc<dyn MediaSource>,
        endpoints: NvrEndpoints,
        route: impl Into<String>,
    ) -> Self {
        Self { source, endpoints, route: route.into() }
    }

    /// Public link to `file` of `request` through this proxy.
    pub fn link(&self, request: &ClipRequest, file: &str) -> String {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("camera", &request.camera)
            .append_pair("start", &request.start.to_string())
            .append_pair("end", &request.end.to_string())
            .append_pair("file", file)
            .finish();
        format!("{}?{}", self.route, query)
    }

    /// Upstream URL of `file`, which must stay inside the clip's VOD directory.
    pub fn upstream_url(&self, request: &ClipRequest, file: &str) -> Result<Url> {
        let root = self.endpoints.vod_root(request);
        let file = file.trim();
        if file.is_empty() || file.starts_with('/') || file.contains('\\') {
            return Err(MediaError::InvalidFile(file.to_string()));
        }
        let url = root
            .join(file)
            .map_err(|_| MediaError::InvalidFile(file.to_string()))?;
        if !url.as_str().starts_with(root.as_str()) {
            return Err(MediaError::InvalidFile(file.to_string()));
        }
        Ok(url)
    }

    pub async fn fetch(
        &self,
        request: &ClipRequest,
        file: &str,
        token: &CancellationToken,
    ) -> Result<ProxiedFile> {
        let url = self.upstream_url(request, file)?;
        let response = tokio::select! {
            _ = token.cancelled() => return Err(MediaError::Cancelled),
            r = self.source.fetch(&url) => r?,
        };
        if !response.is_success() {
            return Err(MediaError::Upstream {
                status: response.status,
                url: url.to_string(),
            });
        }

        if !playlist::has_playlist_suffix(url.path()) {
            let content_type = match ContainerKind::detect(&response.body) {
                ContainerKind::Unknown => "application/octet-stream",
                kind => kind.content_type(),
            };
            debug!(url = %url, bytes = response.body.len(), "VOD segment proxied");
            return Ok(ProxiedFile { body: response.body, content_type, is_playlist: false });
        }

        let text = std::str::from_utf8(&response.body)
            .map_err(|e| MediaError::Playlist(format!("Playlist {url} is not UTF-8: {e}")))?;
        let root = self.endpoints.vod_root(request);
        let rewritten = playlist::rewrite_references(text, &playlist::base_url_of(&url)?, |target| {
            match target.as_str().strip_prefix(root.as_str()) {
                Some(relative) => self.link(request, relative),
                None => target.to_string(),
            }
        })?;
        debug!(url = %url, bytes = rewritten.len(), "VOD playlist rewritten");

        Ok(ProxiedFile {
            body: Bytes::from(rewritten),
            content_type: PLAYLIST_CONTENT_TYPE,
            is_playlist: true,
        })
    }
}
