//! OpenAI-compatible chat-completions client (Groq endpoint by default).

use pagechat_core::{ChatMessage, CompletionBackend, Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai";
const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";
const DEFAULT_MAX_TOKENS: u64 = 6000;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Grounding rules sent ahead of every conversation. Replaceable via
/// `with_system_prompt` when a deployment wants a different voice.
const DEFAULT_SYSTEM_PROMPT: &str = "You are an academic expert who always cites sources when \
appropriate, but you must strictly base your responses only on the context provided. Do not \
fabricate or include any external sources unless explicitly stated in the provided context. \
Think carefully before answering.";

fn env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[derive(Debug, Clone)]
pub struct OpenAiCompatClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    system_prompt: String,
}

impl OpenAiCompatClient {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key,
            model: model.into(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }

    /// Reads `GROQ_API_KEY` (required) plus optional `PAGECHAT_LLM_BASE_URL`
    /// and `PAGECHAT_LLM_MODEL` overrides.
    pub fn from_env(client: reqwest::Client, model_override: Option<String>) -> Result<Self> {
        let api_key = env("GROQ_API_KEY")
            .ok_or_else(|| Error::NotConfigured("missing GROQ_API_KEY".to_string()))?;
        let base_url = env("PAGECHAT_LLM_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let model = model_override
            .or_else(|| env("PAGECHAT_LLM_MODEL"))
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        Ok(Self::new(client, base_url, Some(api_key), model))
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint_chat_completions(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.base_url.trim_end_matches('/')
        )
    }
}

#[async_trait::async_trait]
impl CompletionBackend for OpenAiCompatClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let mut all = Vec::with_capacity(messages.len() + 1);
        all.push(ChatMessage::system(self.system_prompt.clone()));
        all.extend(messages.iter().cloned());

        let req = ChatCompletionsRequest {
            model: self.model.clone(),
            messages: all,
            max_tokens: Some(DEFAULT_MAX_TOKENS),
            stream: Some(false),
        };

        let mut rb = self
            .client
            .post(self.endpoint_chat_completions())
            .timeout(DEFAULT_TIMEOUT)
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        if let Some(k) = &self.api_key {
            rb = rb.header(reqwest::header::AUTHORIZATION, format!("Bearer {k}"));
        }

        let resp = rb
            .json(&req)
            .send()
            .await
            .map_err(|e| Error::Llm(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Llm(format!("chat.completions HTTP {status}")));
        }

        let parsed: ChatCompletionsResponse =
            resp.json().await.map_err(|e| Error::Llm(e.to_string()))?;
        Ok(parsed
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .unwrap_or_default())
    }
}

#[derive(Debug, Clone, Serialize)]
struct ChatCompletionsRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatCompletionsResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct ChoiceMessage {
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::post, Json, Router};
    use std::net::SocketAddr;
    use std::sync::{Arc, Mutex};

    async fn serve(app: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr: SocketAddr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    #[tokio::test]
    async fn sends_system_prompt_first_and_returns_first_choice() {
        let seen: Arc<Mutex<Option<serde_json::Value>>> = Arc::new(Mutex::new(None));
        let seen2 = seen.clone();
        let app = Router::new().route(
            "/v1/chat/completions",
            post(move |Json(body): Json<serde_json::Value>| {
                let seen = seen2.clone();
                async move {
                    *seen.lock().unwrap() = Some(body);
                    Json(serde_json::json!({
                        "choices": [{"message": {"role": "assistant", "content": "answer"}}]
                    }))
                }
            }),
        );
        let addr = serve(app).await;

        let client = OpenAiCompatClient::new(
            reqwest::Client::new(),
            format!("http://{addr}"),
            Some("test-key".to_string()),
            "test-model",
        );
        let out = client
            .complete(&[ChatMessage::user("what is this page about?")])
            .await
            .unwrap();
        assert_eq!(out, "answer");

        let body = seen.lock().unwrap().clone().unwrap();
        assert_eq!(body["model"], "test-model");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["messages"][1]["content"], "what is this page about?");
        assert_eq!(body["max_tokens"], 6000);
    }

    #[tokio::test]
    async fn http_error_maps_to_llm_error() {
        let app = Router::new().route(
            "/v1/chat/completions",
            post(|| async { (axum::http::StatusCode::TOO_MANY_REQUESTS, "slow down") }),
        );
        let addr = serve(app).await;

        let client = OpenAiCompatClient::new(
            reqwest::Client::new(),
            format!("http://{addr}"),
            None,
            "test-model",
        );
        let err = client.complete(&[ChatMessage::user("q")]).await.unwrap_err();
        assert!(matches!(err, Error::Llm(_)));
    }

    #[tokio::test]
    async fn empty_choices_yield_empty_answer() {
        let app = Router::new().route(
            "/v1/chat/completions",
            post(|| async { Json(serde_json::json!({"choices": []})) }),
        );
        let addr = serve(app).await;

        let client = OpenAiCompatClient::new(
            reqwest::Client::new(),
            format!("http://{addr}"),
            None,
            "test-model",
        );
        assert_eq!(client.complete(&[]).await.unwrap(), "");
    }

    #[test]
    fn endpoint_join_tolerates_trailing_slash() {
        let client = OpenAiCompatClient::new(
            reqwest::Client::new(),
            "https://api.groq.com/openai/",
            None,
            "m",
        );
        assert_eq!(
            client.endpoint_chat_completions(),
            "https://api.groq.com/openai/v1/chat/completions"
        );
    }
}
