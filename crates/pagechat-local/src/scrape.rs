//! The scrape pipeline: cache lookup, fetch, extraction, persistence.

use crate::cache::ScrapeCache;
use crate::extract::extract;
use pagechat_core::{FetchBackend, ScrapedContent};
use std::sync::Arc;
use tracing::{info, warn};

/// The one failure reason callers ever see in a scrape result.
pub const SCRAPE_FAILED: &str = "Failed to scrape URL";

/// Coordinates one scrape per call. Infallible by contract: every outcome is
/// a `ScrapedContent`, with failures carried in its `error` field.
#[derive(Clone)]
pub struct Scraper {
    fetcher: Arc<dyn FetchBackend>,
    cache: ScrapeCache,
}

impl Scraper {
    pub fn new(fetcher: Arc<dyn FetchBackend>, cache: ScrapeCache) -> Self {
        Self { fetcher, cache }
    }

    /// Cache check, then fetch + extract + persist. A cache hit returns the
    /// stored value as-is; a transport failure returns the uniform failure
    /// value and caches nothing. No retries at any step.
    pub async fn scrape(&self, url: &str) -> ScrapedContent {
        info!(%url, "scraping url");
        if let Some(cached) = self.cache.get(url).await {
            info!(%url, "using cached content");
            return cached;
        }
        info!(%url, "cache miss; proceeding with fresh scrape");

        let body = match self.fetcher.fetch(url).await {
            Ok(body) => body,
            Err(e) => {
                warn!(%url, error = %e, "scrape failed");
                return ScrapedContent::failed(url, SCRAPE_FAILED);
            }
        };

        let doc = extract(&body);
        let mut result = ScrapedContent {
            url: url.to_string(),
            title: doc.title,
            headings: doc.headings,
            meta_description: doc.meta_description,
            content: doc.content,
            error: None,
            cached_at: None,
        };

        // Persistence failures are absorbed inside the cache layer; the
        // assembled result is returned either way.
        self.cache.put(url, &mut result).await;
        result
    }
}
