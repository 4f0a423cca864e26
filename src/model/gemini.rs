//! Gemini `generateContent` REST backend.
//!
//! Single-turn requests against
//! `{base}/models/{model}:generateContent`, authenticated with an
//! `x-goog-api-key` header. Only the first candidate's text parts are used.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Model, ModelError};
use crate::config::ModelConfig;
use crate::http::require_success;

/// One text part of a content block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Part {
    /// Part text; empty for non-text parts.
    #[serde(default)]
    pub text: String,
}

/// A content block: an ordered list of parts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    /// Parts making up the block.
    #[serde(default)]
    pub parts: Vec<Part>,
}

/// One generated candidate.
#[derive(Debug, Clone, Deserialize)]
pub struct Candidate {
    /// The candidate's content.
    #[serde(default)]
    pub content: Option<Content>,
}

/// Body for `:generateContent`.
#[derive(Debug, Clone, Serialize)]
pub struct GenerateContentRequest {
    /// Conversation turns; a single user turn here.
    pub contents: Vec<Content>,
}

/// Body returned by `:generateContent`.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateContentResponse {
    /// Generated candidates, best first.
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

/// Wrap a prompt as a single-turn request body.
pub fn build_request(prompt: &str) -> GenerateContentRequest {
    GenerateContentRequest {
        contents: vec![Content {
            parts: vec![Part {
                text: prompt.to_owned(),
            }],
        }],
    }
}

/// Extract the completion text: all text parts of the first candidate,
/// concatenated.
///
/// # Errors
///
/// Returns [`ModelError::EmptyCompletion`] when there is no candidate or
/// the candidate carries no text.
pub fn parse_response(response: GenerateContentResponse) -> Result<String, ModelError> {
    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .map(|part| part.text)
                .collect::<String>()
        })
        .unwrap_or_default();
    if text.is_empty() {
        return Err(ModelError::EmptyCompletion);
    }
    Ok(text)
}

/// HTTP client for the Gemini API.
pub struct GeminiModel {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiModel {
    /// Build a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Http`] if the underlying HTTP client cannot be
    /// constructed.
    pub fn new(config: &ModelConfig) -> Result<Self, ModelError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl Model for GeminiModel {
    async fn generate(&self, prompt: &str) -> Result<String, ModelError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let request = build_request(prompt);
        debug!(model = %self.model, prompt_chars = prompt.len(), "model request");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;
        let response = require_success(response)
            .await
            .map_err(|(status, body)| ModelError::Api { status, body })?;
        let body = response.text().await?;
        let parsed: GenerateContentResponse =
            serde_json::from_str(&body).map_err(|e| ModelError::Decode(e.to_string()))?;

        let completion = parse_response(parsed)?;
        debug!(completion_chars = completion.len(), "model response");
        Ok(completion)
    }
}
