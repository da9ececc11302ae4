// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid clip range for camera '{camera}': start {start}, end {end}")]
    InvalidRange { camera: String, start: i64, end: i64 },

    #[error("Invalid VOD file '{0}'")]
    InvalidFile(String),

    #[error("Upstream returned HTTP {status} for {url}")]
    Upstream { status: StatusCode, url: String },

    #[error("HTTP request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("No clip data for camera '{camera}' between {start} and {end}")]
    EmptyClip { camera: String, start: i64, end: i64 },

    #[error("Master playlist references no variant")]
    NoVariant,

    #[error("Variant playlist lists no segments")]
    NoSegments,

    #[error("Playlist error: {0}")]
    Playlist(String),

    #[error("Failed to fetch playlist {url}: {reason}")]
    PlaylistFetch { url: String, reason: String },

    #[error("Segment fetch failed for {url}: {reason}")]
    SegmentFetch { url: String, reason: String },

    #[error("Clip retrieval cancelled")]
    Cancelled,

    #[error("Clip retrieval timed out after {0:?}")]
    Timeout(std::time::Duration),
}

impl MediaError {
    pub fn segment_fetch(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SegmentFetch {
            url: url.into(),
            reason: reason.into(),
        }
    }

    pub fn playlist_fetch(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PlaylistFetch {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Errors produced only while rebuilding a clip from its playlist.
    pub fn is_fallback_error(&self) -> bool {
        matches!(
            self,
            Self::NoVariant
                | Self::NoSegments
                | Self::Playlist(_)
                | Self::PlaylistFetch { .. }
                | Self::SegmentFetch { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, MediaError>;
