// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! Scripted in-memory NVR used by the clip tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::StatusCode;
use tokio::time::Instant;
use url::Url;

use nvr_media::clip::{ClipRetriever, FetchResponse, MediaSource, NvrEndpoints};
use nvr_media::config::ClipConfig;
use nvr_media::error::{MediaError, Result};

pub const BASE: &str = "http://nvr.test";

#[derive(Debug, Clone)]
pub enum Reply {
    Body(Vec<u8>),
    Status(u16),
    /// Transport failure, as if the connection dropped.
    Broken,
}

struct Route {
    /// Replies served in order; the last one repeats.
    script: Vec<Reply>,
    delay: Duration,
}

/// Answers GETs from a per-URL script and records every call.
#[derive(Default)]
pub struct StubNvr {
    routes: Mutex<HashMap<String, Route>>,
    calls: Mutex<Vec<(String, Instant)>>,
}

impl StubNvr {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn route(&self, url: &str, script: Vec<Reply>) {
        self.route_delayed(url, script, Duration::ZERO);
    }

    pub fn route_delayed(&self, url: &str, script: Vec<Reply>, delay: Duration) {
        self.routes.lock().insert(url.to_string(), Route { script, delay });
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().iter().map(|(url, _)| url.clone()).collect()
    }

    pub fn calls_to(&self, url: &str) -> Vec<Instant> {
        self.calls
            .lock()
            .iter()
            .filter(|(u, _)| u == url)
            .map(|(_, at)| *at)
            .collect()
    }
}

#[async_trait]
impl MediaSource for StubNvr {
    async fn fetch(&self, url: &Url) -> Result<FetchResponse> {
        let key = url.to_string();
        self.calls.lock().push((key.clone(), Instant::now()));

        let (reply, delay) = {
            let mut routes = self.routes.lock();
            match routes.get_mut(&key) {
                Some(route) => {
                    let reply = if route.script.len() > 1 {
                        route.script.remove(0)
                    } else {
                        route.script.first().cloned().unwrap_or(Reply::Status(404))
                    };
                    (reply, route.delay)
                }
                None => (Reply::Status(404), Duration::ZERO),
            }
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match reply {
            Reply::Body(body) => Ok(FetchResponse::ok(body)),
            Reply::Status(code) => Ok(FetchResponse::status(
                StatusCode::from_u16(code).expect("valid status code"),
            )),
            Reply::Broken => Err(MediaError::Io(std::io::Error::other("connection reset"))),
        }
    }
}

pub fn clip_url(camera: &str, start: i64, end: i64) -> String {
    format!("{BASE}/api/{camera}/start/{start}/end/{end}/clip.mp4")
}

pub fn vod_url(camera: &str, start: i64, end: i64, file: &str) -> String {
    format!("{BASE}/vod/{camera}/start/{start}/end/{end}/{file}")
}

pub fn clip_config(max_attempts: u32, retry_delay_ms: u64) -> ClipConfig {
    ClipConfig {
        max_attempts,
        retry_delay_ms,
        ..ClipConfig::default()
    }
}

pub fn retriever(nvr: &Arc<StubNvr>, config: &ClipConfig) -> ClipRetriever {
    let endpoints = NvrEndpoints::new(BASE).expect("valid base");
    ClipRetriever::new(nvr.clone(), endpoints, config)
}

/// Minimal fMP4 init segment header.
pub fn init_bytes() -> Vec<u8> {
    let mut data = vec![0x00, 0x00, 0x00, 0x18];
    data.extend_from_slice(b"ftypisom");
    data.extend_from_slice(&[0u8; 12]);
    data
}

/// Installs a master, a variant with an init map and two segments for `camera`.
pub fn install_vod(nvr: &StubNvr, camera: &str, start: i64, end: i64) {
    nvr.route(
        &vod_url(camera, start, end, "master.m3u8"),
        vec![Reply::Body(
            b"#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=2000000\nv1.m3u8\n".to_vec(),
        )],
    );
    nvr.route(
        &vod_url(camera, start, end, "v1.m3u8"),
        vec![Reply::Body(
            b"#EXTM3U\n#EXT-X-TARGETDURATION:10\n#EXT-X-MAP:URI=\"init.mp4\"\n#EXTINF:10.0,\nseg0.ts\n#EXTINF:10.0,\nseg1.ts\n#EXT-X-ENDLIST\n"
                .to_vec(),
        )],
    );
    nvr.route(&vod_url(camera, start, end, "init.mp4"), vec![Reply::Body(init_bytes())]);
    nvr.route(&vod_url(camera, start, end, "seg0.ts"), vec![Reply::Body(b"SEGMENT-0".to_vec())]);
    nvr.route(&vod_url(camera, start, end, "seg1.ts"), vec![Reply::Body(b"SEGMENT-1".to_vec())]);
}
