// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! Byte source seam between clip retrieval and the HTTP client.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, StatusCode};
use tracing::trace;
use url::Url;

use crate::config::ServerConfig;
use crate::error::Result;

/// Status and body of one GET.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

impl FetchResponse {
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self { status: StatusCode::OK, body: body.into() }
    }

    pub fn status(status: StatusCode) -> Self {
        Self { status, body: Bytes::new() }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Anything that can GET a URL and hand back the whole body.
///
/// Non-2xx answers are returned as responses, not errors; only transport
/// failures are errors.
#[async_trait]
pub trait MediaSource: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<FetchResponse>;
}

/// [`MediaSource`] backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: Client,
    api_key: Option<String>,
}

impl HttpSource {
    pub fn new(config: &ServerConfig) -> Result<Self> {
        let mut builder = Client::builder()
            .user_agent(config.user_agent.as_str())
            .connect_timeout(config.connect_timeout());
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            api_key: config.api_key.clone(),
        })
    }

    pub fn with_client(client: Client, api_key: Option<String>) -> Self {
        Self { client, api_key }
    }
}

#[async_trait]
impl MediaSource for HttpSource {
    async fn fetch(&self, url: &Url) -> Result<FetchResponse> {
        let mut request = self.client.get(url.clone());
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = if status.is_success() {
            response.bytes().await?
        } else {
            Bytes::new()
        };

        trace!(url = %url, status = %status, bytes = body.len(), "GET complete");
        Ok(FetchResponse { status, body })
    }
}
