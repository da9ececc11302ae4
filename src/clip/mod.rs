// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! Clip retrieval: one playable asset for `(camera, start, end)`.
//!
//! The direct export endpoint is tried first, with a few retries when the
//! NVR answers with an empty body. When every attempt comes back empty the
//! clip is rebuilt from the VOD playlist instead.

pub mod endpoints;
pub mod proxy;
pub mod reconstruct;
pub mod retriever;
pub mod source;

use bytes::Bytes;
use chrono::DateTime;

use crate::error::{MediaError, Result};

pub use endpoints::NvrEndpoints;
pub use proxy::{ProxiedFile, VodProxy};
pub use reconstruct::{PlaylistReconstructor, Reconstruction, SegmentFetcher};
pub use retriever::ClipRetriever;
pub use source::{FetchResponse, HttpSource, MediaSource};

/// A validated clip time range, in seconds since the Unix epoch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipRequest {
    pub camera: String,
    pub start: i64,
    pub end: i64,
}

impl ClipRequest {
    pub fn new(camera: impl Into<String>, start: i64, end: i64) -> Result<Self> {
        let camera = camera.into();
        if end <= start || camera.trim().is_empty() {
            return Err(MediaError::InvalidRange { camera, start, end });
        }
        Ok(Self { camera, start, end })
    }

    pub fn duration_secs(&self) -> i64 {
        self.end - self.start
    }

    /// `front_2026-02-19T14-00-00_to_2026-02-19T14-05-00`
    pub fn file_stem(&self) -> String {
        format!(
            "{}_{}_to_{}",
            self.camera,
            file_timestamp(self.start),
            file_timestamp(self.end)
        )
    }

    pub fn empty_clip(&self) -> MediaError {
        MediaError::EmptyClip {
            camera: self.camera.clone(),
            start: self.start,
            end: self.end,
        }
    }
}

fn file_timestamp(secs: i64) -> String {
    DateTime::from_timestamp(secs, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H-%M-%S").to_string())
        .unwrap_or_else(|| secs.to_string())
}

/// Container detected from the first bytes of a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    /// ISO BMFF with an `ftyp` box at offset 4.
    Mp4,
    /// MPEG-TS sync byte at offset 0.
    MpegTs,
    Unknown,
}

impl ContainerKind {
    pub fn detect(data: &[u8]) -> Self {
        if data.get(4..8) == Some(b"ftyp".as_slice()) {
            ContainerKind::Mp4
        } else if data.first() == Some(&0x47) {
            ContainerKind::MpegTs
        } else {
            ContainerKind::Unknown
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ContainerKind::MpegTs => "video/mp2t",
            ContainerKind::Mp4 | ContainerKind::Unknown => "video/mp4",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ContainerKind::MpegTs => "ts",
            ContainerKind::Mp4 | ContainerKind::Unknown => "mp4",
        }
    }
}

/// How a clip was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipOrigin {
    /// Direct export, on the given attempt.
    Direct { attempts: u32 },
    /// Rebuilt from the VOD playlist.
    Reconstructed { segments: usize },
}

/// A finished clip, ready to hand to a player or a download response.
#[derive(Debug, Clone)]
pub struct ClipAsset {
    pub data: Bytes,
    pub origin: ClipOrigin,
    pub container: ContainerKind,
    pub file_name: String,
}

impl ClipAsset {
    pub fn new(request: &ClipRequest, data: Bytes, origin: ClipOrigin) -> Self {
        let container = ContainerKind::detect(&data);
        let file_name = format!("{}.{}", request.file_stem(), container.extension());
        Self { data, origin, container, file_name }
    }

    pub fn content_type(&self) -> &'static str {
        self.container.content_type()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_inverted_and_empty_ranges() {
        assert!(matches!(
            ClipRequest::new("camX", 100, 50),
            Err(MediaError::InvalidRange { start: 100, end: 50, .. })
        ));
        assert!(ClipRequest::new("camX", 100, 100).is_err());
        assert!(ClipRequest::new("  ", 100, 200).is_err());
        assert_eq!(ClipRequest::new("camX", 100, 160).unwrap().duration_secs(), 60);
    }

    #[test]
    fn file_stem_uses_utc_timestamps() {
        let req = ClipRequest::new("front", 1_771_509_600, 1_771_509_900).unwrap();
        assert_eq!(req.file_stem(), "front_2026-02-19T14-00-00_to_2026-02-19T14-05-00");
    }

    #[test]
    fn detects_containers() {
        let mp4 = [0, 0, 0, 0x18, b'f', b't', b'y', b'p', b'i', b's', b'o', b'm'];
        assert_eq!(ContainerKind::detect(&mp4), ContainerKind::Mp4);
        assert_eq!(ContainerKind::detect(&[0x47, 0x40, 0x00]), ContainerKind::MpegTs);
        assert_eq!(ContainerKind::detect(b"<html>"), ContainerKind::Unknown);
        assert_eq!(ContainerKind::detect(&[]), ContainerKind::Unknown);
    }

    #[test]
    fn asset_name_follows_container() {
        let req = ClipRequest::new("gate", 0, 10).unwrap();
        let asset = ClipAsset::new(&req, Bytes::from_static(&[0x47, 1, 2]), ClipOrigin::Reconstructed { segments: 1 });
        assert_eq!(asset.content_type(), "video/mp2t");
        assert!(asset.file_name.ends_with(".ts"));
    }
}
