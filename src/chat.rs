//! `POST /api/chat/`: the site chatbot endpoint.
//!
//! # Request
//!
//! ```json
//! { "message": "What services do you offer?" }
//! ```
//!
//! # Responses
//!
//! | Status | Body |
//! |--------|------|
//! | 200 | `{"response": "...", "status": "success"}` |
//! | 400 | `{"error": "Invalid JSON" \| "Message is required" \| "Message too long (max 500 characters)", "status": "error"}` |
//! | 429 | `{"error": "Rate limit exceeded. Please try again later.", "status": "rate_limited"}` |
//! | 503 | `{"error": "Chatbot is temporarily unavailable", "status": "error"}` |
//! | 500 | `{"error": "Sorry, I encountered an error. Please try again.", "status": "error"}` |
//!
//! Checks run in that order: parse, validate, rate limit, credentials, model
//! call. A request that passes the rate limit is counted even when the
//! model is unavailable.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::RETRY_AFTER;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::ratelimit::{epoch_secs, RateDecision};
use crate::server::AppState;
use crate::session::SessionHandle;

const PROMPT_PREAMBLE: &str = "You are a helpful AI assistant for Techlynx Pro, a professional IT services company based in the United States.

Your role:
- Answer questions about Techlynx Pro's services, pricing, company information, and expertise
- Be professional, friendly, and conversion-focused
- Encourage users to contact the company for specific project quotes and detailed consultations
- Only provide information based on the context provided below
- If you don't have specific information, politely say so and suggest contacting the team directly

IMPORTANT GUIDELINES:
- Do NOT discuss competitors or make comparisons
- Do NOT provide exact pricing without context (mention ranges and encourage contact)
- Do NOT make promises on behalf of the company
- Keep responses concise (2-3 paragraphs maximum)
- Always maintain a helpful and professional tone
- Use bullet points for listing services or features for better readability";

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Invalid JSON")]
    InvalidJson,
    #[error("Message is required")]
    EmptyMessage,
    #[error("Message too long (max {0} characters)")]
    TooLong(usize),
    #[error("Rate limit exceeded. Please try again later.")]
    RateLimited { retry_after_secs: u64 },
    #[error("Chatbot is temporarily unavailable")]
    Unavailable,
    #[error("Sorry, I encountered an error. Please try again.")]
    Upstream(#[source] anyhow::Error),
}

impl ChatError {
    pub fn status(&self) -> StatusCode {
        match self {
            ChatError::InvalidJson | ChatError::EmptyMessage | ChatError::TooLong(_) => {
                StatusCode::BAD_REQUEST
            }
            ChatError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ChatError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            ChatError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn status_label(&self) -> &'static str {
        match self {
            ChatError::RateLimited { .. } => "rate_limited",
            _ => "error",
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatErrorBody {
    pub error: String,
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatReply {
    pub response: String,
    pub status: String,
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let body = ChatErrorBody {
            error: self.to_string(),
            status: self.status_label().to_string(),
        };
        let mut response = (self.status(), Json(body)).into_response();
        if let ChatError::RateLimited { retry_after_secs } = self {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(retry_after_secs));
        }
        response
    }
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    #[serde(default)]
    message: String,
}

/// Trims `raw` and checks it against the length limit (in characters).
pub fn validate_message(raw: &str, max_chars: usize) -> Result<&str, ChatError> {
    let message = raw.trim();
    if message.is_empty() {
        return Err(ChatError::EmptyMessage);
    }
    if message.chars().count() > max_chars {
        return Err(ChatError::TooLong(max_chars));
    }
    Ok(message)
}

pub fn build_prompt(context: &str, message: &str) -> String {
    format!(
        "{}\n\nCOMPANY CONTEXT:\n{}\n\nUser Question: {}\n\nProvide a helpful, accurate response based on the context above:",
        PROMPT_PREAMBLE, context, message
    )
}

async fn answer(state: &AppState, session: &SessionHandle, body: &[u8]) -> Result<String, ChatError> {
    let request: ChatRequest = serde_json::from_slice(body).map_err(|_| ChatError::InvalidJson)?;
    let message = validate_message(&request.message, state.config.chatbot.max_message_chars)?;

    let now = epoch_secs();
    let decision = state.sessions.with_session(&session.id, |data| {
        state.limiter.check_and_record(&mut data.chat_timestamps, now)
    });
    if let RateDecision::Limited { retry_after_secs } = decision {
        tracing::info!(session = %session.id, retry_after_secs, "chat rate limited");
        return Err(ChatError::RateLimited { retry_after_secs });
    }

    let Some(model) = state.model.as_ref() else {
        tracing::warn!("chat request rejected: no API key configured");
        return Err(ChatError::Unavailable);
    };

    let context = state.context.get();
    let prompt = build_prompt(&context, message);

    model.generate(&prompt).await.map_err(|e| {
        tracing::error!(model = model.name(), error = %e, "chatbot generation failed");
        ChatError::Upstream(e)
    })
}

pub async fn handle_chat(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let session = state.sessions.resolve(&headers);

    let mut response = match answer(&state, &session, &body).await {
        Ok(text) => Json(ChatReply {
            response: text,
            status: "success".to_string(),
        })
        .into_response(),
        Err(e) => e.into_response(),
    };

    state.sessions.attach(&session, response.headers_mut());
    response
}
