//! Generative text backends for the chatbot.
//!
//! [`ChatModel`] is the seam the chat handler depends on; [`GeminiModel`]
//! calls the Gemini `generateContent` REST endpoint.
//!
//! # Failure Policy
//!
//! Exactly one attempt per request. Any transport error, non-2xx status, or
//! response without candidate text is returned as an error for the caller
//! to turn into a generic apology.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::time::Duration;

use crate::config::ChatbotConfig;

/// A text-in, text-out language model.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Model identifier, for logs.
    fn name(&self) -> &str;

    async fn generate(&self, prompt: &str) -> Result<String>;
}

pub struct GeminiModel {
    client: reqwest::Client,
    api_base: String,
    model: String,
    api_key: String,
}

impl GeminiModel {
    pub fn new(config: &ChatbotConfig, api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.api_base, self.model)
    }
}

#[async_trait]
impl ChatModel for GeminiModel {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": prompt }],
            }],
        });

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("Gemini API error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        parse_gemini_response(&json)
    }
}

/// Concatenates the text parts of the first candidate.
pub fn parse_gemini_response(json: &serde_json::Value) -> Result<String> {
    let parts = json
        .pointer("/candidates/0/content/parts")
        .and_then(|p| p.as_array())
        .ok_or_else(|| {
            let reason = json
                .pointer("/promptFeedback/blockReason")
                .and_then(|r| r.as_str())
                .unwrap_or("no candidates");
            anyhow::anyhow!("Invalid Gemini response: {}", reason)
        })?;

    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect();

    if text.trim().is_empty() {
        bail!("Invalid Gemini response: empty text");
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn joins_candidate_parts() {
        let resp = json!({
            "candidates": [{
                "content": { "parts": [{ "text": "We offer " }, { "text": "AI Solutions." }] }
            }]
        });
        assert_eq!(parse_gemini_response(&resp).unwrap(), "We offer AI Solutions.");
    }

    #[test]
    fn blocked_prompt_is_an_error() {
        let resp = json!({ "promptFeedback": { "blockReason": "SAFETY" } });
        let err = parse_gemini_response(&resp).unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
    }

    #[test]
    fn endpoint_uses_configured_model() {
        let mut config = ChatbotConfig::default();
        config.api_base = "http://localhost:9/v1beta/".into();
        let model = GeminiModel::new(&config, "k".into()).unwrap();
        assert_eq!(
            model.endpoint(),
            "http://localhost:9/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }
}
