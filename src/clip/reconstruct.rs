// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! Clip reconstruction from the VOD playlist.
//!
//! ```text
//! master.m3u8 ──► variant.m3u8 ──► [init] seg0 seg1 … segN
//!                                     │    fetched concurrently
//!                                     ▼
//!                        concatenated in playlist order
//! ```
//!
//! Segments may finish in any order; the output is always
//! `init ++ seg0 ++ … ++ segN`. One failed fetch fails the whole
//! reconstruction, so a partial clip is never produced.

use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use futures::stream::{self, StreamExt, TryStreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use url::Url;

use crate::clip::endpoints::NvrEndpoints;
use crate::clip::source::MediaSource;
use crate::clip::ClipRequest;
use crate::error::{MediaError, Result};
use crate::playlist::{self, VariantPlaylist};

/// Fetches the parts of a variant playlist and joins them.
pub struct SegmentFetcher {
    source: Arc<dyn MediaSource>,
    concurrency: usize,
}

impl SegmentFetcher {
    pub fn new(source: Arc<dyn MediaSource>, concurrency: usize) -> Self {
        Self { source, concurrency: concurrency.max(1) }
    }

    /// Download every part of `playlist` and concatenate them, init segment
    /// first, then media segments in playlist order.
    pub async fn fetch_all(
        &self,
        playlist: &VariantPlaylist,
        token: &CancellationToken,
    ) -> Result<Bytes> {
        // `buffered` yields in input order whatever the completion order.
        let parts: Vec<Bytes> = stream::iter(playlist.fetch_order().cloned())
            .map(|url| self.fetch_one(url, token))
            .buffered(self.concurrency)
            .try_collect()
            .await?;

        let total = parts.iter().map(Bytes::len).sum();
        let mut out = BytesMut::with_capacity(total);
        for part in &parts {
            out.extend_from_slice(part);
        }
        Ok(out.freeze())
    }

    async fn fetch_one(&self, url: Url, token: &CancellationToken) -> Result<Bytes> {
        let response = tokio::select! {
            _ = token.cancelled() => return Err(MediaError::Cancelled),
            r = self.source.fetch(&url) => r.map_err(|e| match e {
                MediaError::Cancelled => e,
                other => MediaError::segment_fetch(url.as_str(), other.to_string()),
            })?,
        };
        if !response.is_success() {
            return Err(MediaError::segment_fetch(
                url.as_str(),
                format!("HTTP {}", response.status),
            ));
        }
        debug!(url = %url, bytes = response.body.len(), "Segment fetched");
        Ok(response.body)
    }
}

/// Bytes rebuilt from a playlist.
#[derive(Debug, Clone)]
pub struct Reconstruction {
    pub data: Bytes,
    /// Media segments joined, init segment excluded.
    pub segments: usize,
}

/// Walks master → variant → segments for one clip request.
pub struct PlaylistReconstructor {
    source: Arc<dyn MediaSource>,
    endpoints: NvrEndpoints,
    fetcher: SegmentFetcher,
}

impl PlaylistReconstructor {
    pub fn new(source: Arc<dyn MediaSource>, endpoints: NvrEndpoints, concurrency: usize) -> Self {
        let fetcher = SegmentFetcher::new(source.clone(), concurrency);
        Self { source, endpoints, fetcher }
    }

    pub async fn reconstruct(
        &self,
        request: &ClipRequest,
        token: &CancellationToken,
    ) -> Result<Reconstruction> {
        let master_url = self.endpoints.vod_master_url(request);
        let master = self.fetch_text(&master_url, token).await?;
        let variant_url = playlist::parse_master(&master, &playlist::base_url_of(&master_url)?)?;

        let variant_text = self.fetch_text(&variant_url, token).await?;
        let variant = playlist::parse_variant(&variant_text, &playlist::base_url_of(&variant_url)?)?;
        debug!(
            camera = request.camera,
            variant = %variant_url,
            segments = variant.segment_urls.len(),
            init = variant.init_segment_url.is_some(),
            "Variant playlist parsed"
        );

        let data = self.fetcher.fetch_all(&variant, token).await?;
        if data.is_empty() {
            return Err(request.empty_clip());
        }

        info!(
            camera = request.camera,
            segments = variant.segment_urls.len(),
            bytes = data.len(),
            "Clip rebuilt from playlist"
        );
        Ok(Reconstruction { data, segments: variant.segment_urls.len() })
    }

    async fn fetch_text(&self, url: &Url, token: &CancellationToken) -> Result<String> {
        let response = tokio::select! {
            _ = token.cancelled() => return Err(MediaError::Cancelled),
            r = self.source.fetch(url) => r.map_err(|e| match e {
                MediaError::Cancelled => e,
                other => MediaError::playlist_fetch(url.as_str(), other.to_string()),
            })?,
        };
        if !response.is_success() {
            return Err(MediaError::playlist_fetch(
                url.as_str(),
                format!("HTTP {}", response.status),
            ));
        }
        String::from_utf8(response.body.to_vec())
            .map_err(|e| MediaError::Playlist(format!("Playlist {url} is not UTF-8: {e}")))
    }
}
