use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("fetch failed: {0}")]
    Fetch(String),
    #[error("cache error: {0}")]
    Cache(String),
    #[error("llm failed: {0}")]
    Llm(String),
    #[error("not configured: {0}")]
    NotConfigured(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Per-level heading text. All six levels are always present; a level with no
/// headings is an empty string, never a missing field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Headings {
    pub h1: String,
    pub h2: String,
    pub h3: String,
    pub h4: String,
    pub h5: String,
    pub h6: String,
}

/// The scraped representation of one page, as returned to callers and as
/// persisted in the cache (camelCase on the wire).
///
/// Exactly one of two terminal shapes holds: `error` is `None` and extraction
/// succeeded (individual fields may still be empty), or `error` is `Some` and
/// every textual field is empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapedContent {
    pub url: String,
    pub title: String,
    pub headings: Headings,
    pub meta_description: String,
    pub content: String,
    /// None on success; a short human-readable reason on failure.
    #[serde(deserialize_with = "explicit_nullable")]
    pub error: Option<String>,
    /// Epoch milliseconds, stamped when the value is persisted to the cache.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached_at: Option<u64>,
}

// `Option` fields deserialize from a missing key by default; cached payloads
// must carry `error` explicitly (null or string), so require its presence.
fn explicit_nullable<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::deserialize(deserializer)
}

impl ScrapedContent {
    /// The terminal failure value: url set, everything else empty.
    pub fn failed(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: String::new(),
            headings: Headings::default(),
            meta_description: String::new(),
            content: String::new(),
            error: Some(reason.into()),
            cached_at: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Fetches one URL's raw markup. A single GET, no retries; any transport
/// problem (DNS, timeout, non-success status) is an `Error::Fetch`.
#[async_trait::async_trait]
pub trait FetchBackend: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;
}

/// Minimal string-keyed store with per-key expiry. Values are serialized
/// text; interpretation of the payload is the caller's concern.
#[async_trait::async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<()>;
}

/// One opaque conversational completion: role-tagged messages in, text out.
#[async_trait::async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ScrapedContent {
        ScrapedContent {
            url: "https://example.com/".to_string(),
            title: "T".to_string(),
            headings: Headings {
                h1: "Hi".to_string(),
                ..Headings::default()
            },
            meta_description: String::new(),
            content: "Hello world".to_string(),
            error: None,
            cached_at: None,
        }
    }

    #[test]
    fn wire_shape_is_camel_case() {
        let v = serde_json::to_value(sample()).unwrap();
        assert!(v.get("metaDescription").is_some());
        assert!(v.get("error").is_some(), "error serializes even when null");
        assert!(
            v.get("cachedAt").is_none(),
            "cachedAt is omitted until the value is persisted"
        );
    }

    #[test]
    fn round_trips_with_and_without_cached_at() {
        let mut c = sample();
        let back: ScrapedContent =
            serde_json::from_str(&serde_json::to_string(&c).unwrap()).unwrap();
        assert_eq!(back, c);

        c.cached_at = Some(1_700_000_000_000);
        let back: ScrapedContent =
            serde_json::from_str(&serde_json::to_string(&c).unwrap()).unwrap();
        assert_eq!(back, c);
    }

    #[test]
    fn missing_required_field_is_invalid() {
        let mut v = serde_json::to_value(sample()).unwrap();
        v.as_object_mut().unwrap().remove("content");
        assert!(serde_json::from_value::<ScrapedContent>(v).is_err());
    }

    #[test]
    fn partial_headings_are_invalid() {
        let mut v = serde_json::to_value(sample()).unwrap();
        v["headings"].as_object_mut().unwrap().remove("h4");
        assert!(serde_json::from_value::<ScrapedContent>(v).is_err());
    }

    #[test]
    fn error_must_be_null_or_string() {
        let mut v = serde_json::to_value(sample()).unwrap();
        v["error"] = serde_json::json!(42);
        assert!(serde_json::from_value::<ScrapedContent>(v.clone()).is_err());

        v["error"] = serde_json::json!("Failed to scrape URL");
        assert!(serde_json::from_value::<ScrapedContent>(v.clone()).is_ok());

        v.as_object_mut().unwrap().remove("error");
        assert!(
            serde_json::from_value::<ScrapedContent>(v).is_err(),
            "a payload without the error field is not a valid cached shape"
        );
    }

    #[test]
    fn unknown_fields_are_tolerated() {
        let mut v = serde_json::to_value(sample()).unwrap();
        v["extra"] = serde_json::json!({"future": true});
        assert!(serde_json::from_value::<ScrapedContent>(v).is_ok());
    }

    #[test]
    fn failed_value_is_all_empty() {
        let c = ScrapedContent::failed("https://example.com/x", "Failed to scrape URL");
        assert_eq!(c.url, "https://example.com/x");
        assert!(c.title.is_empty());
        assert!(c.meta_description.is_empty());
        assert!(c.content.is_empty());
        assert_eq!(c.headings, Headings::default());
        assert_eq!(c.error.as_deref(), Some("Failed to scrape URL"));
        assert!(c.cached_at.is_none());
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&ChatMessage::user("hi")).unwrap(),
            r#"{"role":"user","content":"hi"}"#
        );
    }
}
