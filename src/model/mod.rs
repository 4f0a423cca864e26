//! Language model abstraction.
//!
//! The pipeline needs exactly one capability from a model: prompt in, text
//! out. Classification and reply drafting both go through [`Model`], which
//! keeps the stages testable with scripted doubles and the vendor wiring in
//! one place. Prompts only ever contain placeholder-encoded text.

pub mod gemini;

use async_trait::async_trait;
use thiserror::Error;

/// Errors from a model backend.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Transport-level failure (connect, timeout, TLS).
    #[error("model request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Backend answered with a non-success status.
    #[error("model API returned {status}: {body}")]
    Api {
        /// HTTP status code.
        status: reqwest::StatusCode,
        /// Sanitized response body excerpt.
        body: String,
    },
    /// Response body was not the expected JSON shape.
    #[error("model response malformed: {0}")]
    Decode(String),
    /// Backend returned no usable text.
    #[error("model returned an empty completion")]
    EmptyCompletion,
}

/// A text completion backend.
#[async_trait]
pub trait Model: Send + Sync {
    /// Complete `prompt` and return the raw model text.
    async fn generate(&self, prompt: &str) -> Result<String, ModelError>;
}
