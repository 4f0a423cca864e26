//! Client for the external detect-encrypt service.
//!
//! The service owns every encryption key. This process only ever sees
//! plaintext on the way in (`/v1/detect-encrypt`) and on the way out
//! (`/v1/decrypt`); everything between carries placeholder tokens plus
//! opaque bundles. Request and response bodies are plain JSON, authenticated
//! with an `x-api-key` header.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::bundle::Bundle;
use crate::config::CryptorConfig;
use crate::http::require_success;

/// Detection confidence floor sent with every detect-encrypt call.
pub const DETECTION_THRESHOLD: f64 = 0.35;

/// Placeholder schema version the service is asked to emit.
pub const PLACEHOLDER_SCHEMA: &str = "v1";

const DETECT_ENCRYPT_PATH: &str = "/v1/detect-encrypt";
const DECRYPT_PATH: &str = "/v1/decrypt";

// ── Wire types ──────────────────────────────────────────────────

/// Body for `POST /v1/detect-encrypt`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectEncryptRequest {
    /// Tenant the detection runs under.
    pub tenant_id: String,
    /// Plaintext to scan.
    pub text: String,
    /// Detection confidence floor.
    pub threshold: f64,
    /// Placeholder schema version.
    pub schema: String,
}

/// Body returned by `POST /v1/detect-encrypt`.
///
/// All three fields are required; a body missing any of them is a decode
/// failure, not a silently empty redaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectEncryptResponse {
    /// Input text with every detected entity replaced by a placeholder.
    pub text_with_placeholders: String,
    /// One bundle per detected entity.
    pub bundles: Vec<Bundle>,
    /// Tenant the bundles were encrypted under; scopes later decrypts.
    pub tenant_id: String,
}

/// Body for `POST /v1/decrypt`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecryptRequest {
    /// Tenant the bundles belong to.
    pub tenant_id: String,
    /// Placeholder-bearing text to restore.
    pub text_with_placeholders: String,
    /// Bundles covering the placeholders in the text.
    pub bundles: Vec<Bundle>,
}

/// Body returned by `POST /v1/decrypt`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecryptResponse {
    /// Text with placeholders substituted back to plaintext.
    pub text: String,
}

/// Build a detect-encrypt request with the fixed threshold and schema.
pub fn build_detect_request(tenant_id: &str, text: &str) -> DetectEncryptRequest {
    DetectEncryptRequest {
        tenant_id: tenant_id.to_owned(),
        text: text.to_owned(),
        threshold: DETECTION_THRESHOLD,
        schema: PLACEHOLDER_SCHEMA.to_owned(),
    }
}

/// Build a decrypt request.
///
/// An empty bundle list is sent as-is; whether decryption is worth calling
/// at all is the caller's decision, not the client's.
pub fn build_decrypt_request(
    tenant_id: &str,
    text_with_placeholders: &str,
    bundles: &[Bundle],
) -> DecryptRequest {
    DecryptRequest {
        tenant_id: tenant_id.to_owned(),
        text_with_placeholders: text_with_placeholders.to_owned(),
        bundles: bundles.to_vec(),
    }
}

// ── Client ──────────────────────────────────────────────────────

/// Redaction output: placeholder text plus the bundles that can reverse it.
#[derive(Debug, Clone)]
pub struct Redaction {
    /// Text safe to hand to third parties.
    pub text_with_placeholders: String,
    /// Bundles for every placeholder in the text.
    pub bundles: Vec<Bundle>,
    /// Tenant scoping any decrypt of these bundles.
    pub tenant_id: String,
}

/// Errors from the detect-encrypt service.
#[derive(Debug, Error)]
pub enum CryptorError {
    /// Transport-level failure (connect, timeout, TLS).
    #[error("privacy service request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Service answered with a non-success status.
    #[error("privacy service returned {status}: {body}")]
    Api {
        /// HTTP status code.
        status: reqwest::StatusCode,
        /// Sanitized response body excerpt.
        body: String,
    },
    /// Response body was not the expected JSON shape.
    #[error("privacy service response malformed: {0}")]
    Decode(String),
}

/// Detect-encrypt service operations.
///
/// Both calls move plaintext across the process boundary, so they sit behind
/// a trait: production talks HTTP, tests substitute a scripted double.
#[async_trait]
pub trait Cryptor: Send + Sync {
    /// Detect entities in `text` and replace each with a placeholder.
    async fn detect_encrypt(&self, text: &str) -> Result<Redaction, CryptorError>;

    /// Substitute placeholders in `text_with_placeholders` back to plaintext.
    ///
    /// `tenant_id` must be the tenant the bundles were encrypted under, as
    /// reported by [`Cryptor::detect_encrypt`].
    async fn decrypt(
        &self,
        tenant_id: &str,
        text_with_placeholders: &str,
        bundles: &[Bundle],
    ) -> Result<String, CryptorError>;
}

/// HTTP client for the hosted detect-encrypt service.
pub struct HttpCryptor {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    tenant_id: String,
}

impl HttpCryptor {
    /// Build a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`CryptorError::Http`] if the underlying HTTP client cannot
    /// be constructed.
    pub fn new(config: &CryptorConfig) -> Result<Self, CryptorError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            api_key: config.api_key.clone(),
            tenant_id: config.tenant_id.clone(),
        })
    }

    async fn post_json<Req: Serialize, Resp: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        request: &Req,
    ) -> Result<Resp, CryptorError> {
        let url = format!("{}{path}", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .json(request)
            .send()
            .await?;
        let response = require_success(response)
            .await
            .map_err(|(status, body)| CryptorError::Api { status, body })?;
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| CryptorError::Decode(e.to_string()))
    }
}

#[async_trait]
impl Cryptor for HttpCryptor {
    async fn detect_encrypt(&self, text: &str) -> Result<Redaction, CryptorError> {
        let request = build_detect_request(&self.tenant_id, text);
        debug!(chars = text.len(), "detect-encrypt request");
        let response: DetectEncryptResponse =
            self.post_json(DETECT_ENCRYPT_PATH, &request).await?;
        debug!(
            bundles = response.bundles.len(),
            chars = response.text_with_placeholders.len(),
            "detect-encrypt response"
        );
        Ok(Redaction {
            text_with_placeholders: response.text_with_placeholders,
            bundles: response.bundles,
            tenant_id: response.tenant_id,
        })
    }

    async fn decrypt(
        &self,
        tenant_id: &str,
        text_with_placeholders: &str,
        bundles: &[Bundle],
    ) -> Result<String, CryptorError> {
        let request = build_decrypt_request(tenant_id, text_with_placeholders, bundles);
        debug!(
            bundles = bundles.len(),
            chars = text_with_placeholders.len(),
            "decrypt request"
        );
        let response: DecryptResponse = self.post_json(DECRYPT_PATH, &request).await?;
        Ok(response.text)
    }
}
