use pagechat_core::{Error, FetchBackend, Result};
use std::time::Duration;

pub mod cache;
pub mod completion;
pub mod extract;
pub mod normalize;
pub mod scrape;

/// Hard cap on bytes read from any response body. Far above the extractor's
/// own content bound; this only stops a hostile endpoint from streaming
/// without end.
pub const DEFAULT_MAX_BODY_BYTES: usize = 20_000_000;

/// Plain HTTP fetcher: one GET per URL, redirects followed, body read as a
/// byte-capped stream. Non-success statuses are fetch failures, like every
/// other transport problem.
#[derive(Debug, Clone)]
pub struct LocalFetcher {
    client: reqwest::Client,
    max_body_bytes: usize,
}

impl LocalFetcher {
    pub fn new() -> Result<Self> {
        Self::with_max_body_bytes(DEFAULT_MAX_BODY_BYTES)
    }

    pub fn with_max_body_bytes(max_body_bytes: usize) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("pagechat/0.1")
            .redirect(reqwest::redirect::Policy::limited(10))
            // Safety defaults: avoid "hang forever" on DNS/TLS/body stalls.
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::Fetch(e.to_string()))?;
        Ok(Self {
            client,
            max_body_bytes,
        })
    }
}

#[async_trait::async_trait]
impl FetchBackend for LocalFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        let url = url::Url::parse(url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::Fetch(e.to_string()))?;

        let mut bytes: Vec<u8> = Vec::new();
        let mut stream = resp.bytes_stream();
        use futures_util::StreamExt;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| Error::Fetch(e.to_string()))?;
            if bytes.len().saturating_add(chunk.len()) > self.max_body_bytes {
                let can_take = self.max_body_bytes.saturating_sub(bytes.len());
                bytes.extend_from_slice(&chunk[..can_take]);
                break;
            }
            bytes.extend_from_slice(&chunk);
        }
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}
