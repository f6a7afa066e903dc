//! Chat API surface: locate a URL in the user's message, scrape it, and
//! answer the question with the page text as context.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use lazy_static::lazy_static;
use pagechat_core::{ChatMessage, CompletionBackend};
use pagechat_local::scrape::Scraper;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Scraped page text is re-bounded to this many characters before it is used
/// as prompt context (independent of the extractor's own bound).
pub const MAX_CONTEXT_CHARS: usize = 23_200;

/// The outermost safety net: whatever goes wrong, the chat endpoint answers
/// with this instead of an error.
pub const APOLOGY: &str = "Sorry, something went wrong while answering. Please try again.";

lazy_static! {
    /// Permissive HTTP(S) URL matcher for free-text messages.
    static ref URL_PATTERN: Regex = Regex::new(
        r"https?://(www\.)?[-a-zA-Z0-9@:%.+~#=]{1,256}\.[a-zA-Z0-9()]{1,6}\b([-a-zA-Z0-9()@:%+.~#?&/=]*)"
    )
    .expect("static url pattern");
}

/// First URL substring in a message, if any.
pub fn find_url(message: &str) -> Option<&str> {
    URL_PATTERN.find(message).map(|m| m.as_str())
}

pub struct AppState {
    pub scraper: Scraper,
    pub completion: Arc<dyn CompletionBackend>,
}

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/chat", post(chat))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    /// Prior turns, oldest first. Optional: a fresh conversation sends none.
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub message: String,
}

async fn chat(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Json<ChatResponse> {
    let message = match payload {
        Ok(Json(req)) => match answer(&state, req).await {
            Ok(answer) => answer,
            Err(e) => {
                error!(error = %e, "chat request failed");
                APOLOGY.to_string()
            }
        },
        Err(rejection) => {
            error!(error = %rejection, "malformed chat request");
            APOLOGY.to_string()
        }
    };
    Json(ChatResponse { message })
}

async fn answer(state: &AppState, req: ChatRequest) -> pagechat_core::Result<String> {
    let url = find_url(&req.message).map(str::to_string);

    let mut context = String::new();
    if let Some(url) = &url {
        info!(%url, "message references a url");
        let scraped = state.scraper.scrape(url).await;
        // A failed scrape yields empty context, never an error to the user.
        context = scraped.content;
        if context.chars().count() > MAX_CONTEXT_CHARS {
            warn!(chars = context.chars().count(), "scraped context too long; truncating");
            context = context.chars().take(MAX_CONTEXT_CHARS).collect();
        }
    }

    let question = match &url {
        Some(url) => req.message.replacen(url.as_str(), "", 1).trim().to_string(),
        None => req.message.trim().to_string(),
    };

    let mut messages = req.messages;
    messages.push(ChatMessage::user(build_prompt(&question, &context)));
    state.completion.complete(&messages).await
}

/// The question alone when there is no page context; otherwise the question
/// with the scraped text in a fenced content block.
fn build_prompt(question: &str, context: &str) -> String {
    if context.is_empty() {
        return question.to_string();
    }
    format!(
        "Answer my question: \"{question}\"\nBased on the following content:\n<content>\n{context}\n</content>"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_a_url_inside_prose() {
        let m = "summarize https://example.com/page for me";
        assert_eq!(find_url(m), Some("https://example.com/page"));
    }

    #[test]
    fn finds_www_and_query_urls() {
        assert_eq!(
            find_url("see http://www.example.org/a?b=c&d=e"),
            Some("http://www.example.org/a?b=c&d=e")
        );
    }

    #[test]
    fn plain_text_has_no_url() {
        assert_eq!(find_url("what is the capital of France?"), None);
        assert_eq!(find_url("ftp://example.com/file"), None);
    }

    #[test]
    fn prompt_without_context_is_the_bare_question() {
        assert_eq!(build_prompt("why?", ""), "why?");
    }

    #[test]
    fn prompt_with_context_wraps_it_in_a_content_block() {
        let p = build_prompt("what is this?", "page text");
        assert!(p.starts_with("Answer my question: \"what is this?\""));
        assert!(p.contains("<content>\npage text\n</content>"));
    }
}
