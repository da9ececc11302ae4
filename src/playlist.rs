// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! HLS playlist handling for clip reconstruction and the VOD proxy.
//!
//! Only the subset the NVR's VOD endpoint emits matters:
//!
//! ```text
//! master.m3u8                 v1.m3u8
//! #EXTM3U                     #EXTM3U
//! #EXT-X-STREAM-INF:...       #EXT-X-MAP:URI="init.mp4"
//! v1.m3u8          ───────►   #EXTINF:10.0,
//!                             seg0.m4s
//!                             #EXTINF:10.0,
//!                             seg1.m4s
//!                             #EXT-X-ENDLIST
//! ```
//!
//! References are resolved against the directory of the playlist they came
//! from, and segment order is exactly the line order of the input.

use m3u8_rs::{MediaPlaylist, Playlist};
use tracing::debug;
use url::Url;

use crate::error::{MediaError, Result};

const PLAYLIST_SUFFIX: &str = ".m3u8";
const STREAM_INF_TAG: &str = "#EXT-X-STREAM-INF";

/// Segments of one variant, in playback order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantPlaylist {
    /// Initialization segment that must precede every media segment.
    pub init_segment_url: Option<Url>,
    pub segment_urls: Vec<Url>,
}

impl VariantPlaylist {
    /// Every URL to fetch, init segment first.
    pub fn fetch_order(&self) -> impl Iterator<Item = &Url> {
        self.init_segment_url.iter().chain(self.segment_urls.iter())
    }

    pub fn len(&self) -> usize {
        self.segment_urls.len() + usize::from(self.init_segment_url.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Directory of `playlist_url`, used as the base for its relative references.
pub fn base_url_of(playlist_url: &Url) -> Result<Url> {
    playlist_url
        .join(".")
        .map_err(|e| MediaError::Playlist(format!("Failed to determine base URL of {playlist_url}: {e}")))
}

/// Pick the variant playlist out of a master playlist.
///
/// The first `#EXT-X-STREAM-INF` variant whose path ends in `.m3u8` wins.
/// A bare master without stream info lines falls back to the first
/// non-comment line ending in `.m3u8`.
pub fn parse_master(text: &str, base_url: &Url) -> Result<Url> {
    match m3u8_rs::parse_master_playlist_res(text.as_bytes()) {
        Ok(master) => {
            let variant = master
                .variants
                .iter()
                .map(|v| v.uri.trim())
                .find(|uri| !uri.is_empty() && has_playlist_suffix(uri));
            if let Some(uri) = variant {
                return resolve(base_url, uri);
            }
        }
        Err(e) => debug!(error = %e, "Master playlist did not parse"),
    }

    if text.contains(STREAM_INF_TAG) {
        return Err(MediaError::NoVariant);
    }
    let variant = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .find(|line| has_playlist_suffix(line))
        .ok_or(MediaError::NoVariant)?;
    resolve(base_url, variant)
}

/// Collect the init segment and media segments of a variant playlist.
pub fn parse_variant(text: &str, base_url: &Url) -> Result<VariantPlaylist> {
    let playlist = m3u8_rs::parse_media_playlist_res(text.as_bytes())
        .map_err(|e| MediaError::Playlist(format!("Failed to parse variant playlist: {e}")))?;

    let init_segment_url = match playlist.segments.iter().find_map(|s| s.map.as_ref()) {
        Some(map) => Some(resolve(base_url, map.uri.trim())?),
        None => match playlist_level_map(&playlist) {
            Some(uri) => Some(resolve(base_url, uri)?),
            None => None,
        },
    };

    let segment_urls = playlist
        .segments
        .iter()
        .map(|s| s.uri.trim())
        .filter(|uri| !uri.is_empty())
        .map(|uri| resolve(base_url, uri))
        .collect::<Result<Vec<_>>>()?;

    if segment_urls.is_empty() {
        return Err(MediaError::NoSegments);
    }
    Ok(VariantPlaylist { init_segment_url, segment_urls })
}

/// Re-emit a playlist with every reference replaced by `link(resolved)`,
/// where `resolved` is the reference resolved against `base_url`.
///
/// Covers variant and rendition URIs of a master playlist, and segment,
/// `EXT-X-MAP` and key URIs of a media playlist.
pub fn rewrite_references<F>(text: &str, base_url: &Url, mut link: F) -> Result<String>
where
    F: FnMut(&Url) -> String,
{
    let playlist = m3u8_rs::parse_playlist_res(text.as_bytes())
        .map_err(|e| MediaError::Playlist(format!("Failed to parse playlist: {e}")))?;
    let mut relink = |uri: &str| -> Result<String> { Ok(link(&resolve(base_url, uri.trim())?)) };

    let mut out = Vec::with_capacity(text.len() * 2);
    match playlist {
        Playlist::MasterPlaylist(mut master) => {
            for variant in &mut master.variants {
                variant.uri = relink(&variant.uri)?;
            }
            for rendition in &mut master.alternatives {
                if let Some(uri) = rendition.uri.as_mut() {
                    *uri = relink(uri)?;
                }
            }
            master.write_to(&mut out)?;
        }
        Playlist::MediaPlaylist(mut media) => {
            for segment in &mut media.segments {
                if !segment.uri.trim().is_empty() {
                    segment.uri = relink(&segment.uri)?;
                }
                if let Some(map) = segment.map.as_mut() {
                    map.uri = relink(&map.uri)?;
                }
                if let Some(uri) = segment.key.as_mut().and_then(|k| k.uri.as_mut()) {
                    *uri = relink(uri)?;
                }
            }
            for tag in media.unknown_tags.iter_mut().filter(|t| t.tag == "X-MAP") {
                let Some(rest) = tag.rest.as_mut() else {
                    continue;
                };
                if let Some(uri) = quoted_uri(rest).map(str::to_string) {
                    let linked = relink(&uri)?;
                    *rest = rest.replacen(&format!("URI=\"{uri}\""), &format!("URI=\"{linked}\""), 1);
                }
            }
            media.write_to(&mut out)?;
        }
    }

    String::from_utf8(out).map_err(|e| MediaError::Playlist(format!("Rewritten playlist is not UTF-8: {e}")))
}

/// `true` when the path of `reference` (query and fragment ignored) names a playlist.
pub fn has_playlist_suffix(reference: &str) -> bool {
    let path = reference.split(['?', '#']).next().unwrap_or(reference);
    path.ends_with(PLAYLIST_SUFFIX)
}

fn resolve(base_url: &Url, reference: &str) -> Result<Url> {
    base_url
        .join(reference)
        .map_err(|e| MediaError::Playlist(format!("Invalid reference '{reference}': {e}")))
}

/// `EXT-X-MAP` placed before the first segment, which m3u8-rs may keep as
/// an unknown `X-MAP` tag instead of attaching it to a segment.
fn playlist_level_map(playlist: &MediaPlaylist) -> Option<&str> {
    let tag = playlist.unknown_tags.iter().rev().find(|t| t.tag == "X-MAP")?;
    quoted_uri(tag.rest.as_deref()?)
}

/// Value of the quoted `URI` attribute in a tag's attribute list.
fn quoted_uri(attrs: &str) -> Option<&str> {
    let start = attrs
        .match_indices("URI=\"")
        .find(|(at, _)| *at == 0 || attrs[..*at].ends_with(','))
        .map(|(at, m)| at + m.len())?;
    let len = attrs[start..].find('"')?;
    Some(&attrs[start..start + len])
}
