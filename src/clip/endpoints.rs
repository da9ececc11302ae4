// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! NVR endpoint URLs for one clip request.
//!
//!   GET {base}/api/{camera}/start/{start}/end/{end}/clip.mp4   → whole clip
//!   GET {base}/vod/{camera}/start/{start}/end/{end}/master.m3u8 → VOD master playlist
//!   GET {base}/vod/{camera}/start/{start}/end/{end}/{file}        → any other VOD file

use url::Url;

use crate::clip::ClipRequest;
use crate::error::{MediaError, Result};

#[derive(Debug, Clone)]
pub struct NvrEndpoints {
    base: Url,
}

impl NvrEndpoints {
    pub fn new(base_url: &str) -> Result<Self> {
        let base = Url::parse(base_url)
            .map_err(|e| MediaError::Config(format!("Invalid NVR base URL '{base_url}': {e}")))?;
        if base.cannot_be_a_base() {
            return Err(MediaError::Config(format!("NVR base URL '{base_url}' cannot carry a path")));
        }
        Ok(Self { base })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    pub fn clip_url(&self, request: &ClipRequest) -> Url {
        self.build("api", request, "clip.mp4")
    }

    pub fn vod_master_url(&self, request: &ClipRequest) -> Url {
        self.build("vod", request, "master.m3u8")
    }

    /// Directory holding every VOD file of `request`, with a trailing slash.
    pub fn vod_root(&self, request: &ClipRequest) -> Url {
        self.build("vod", request, "")
    }

    fn build(&self, root: &str, request: &ClipRequest, file: &str) -> Url {
        let start = request.start.to_string();
        let end = request.end.to_string();
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend([
                root,
                request.camera.as_str(),
                "start",
                start.as_str(),
                "end",
                end.as_str(),
                file,
            ]);
        }
        url
    }
}
