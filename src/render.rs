//! Reply rendering.
//!
//! Drafts a customer reply from the redacted request and the action result,
//! instructing the model to leave placeholder tokens untouched, then asks
//! the privacy service to substitute the real values back in. The draft
//! stays inside the trust boundary; only the decrypted text may reach the
//! customer, and a failed decrypt here fails the whole run rather than
//! leak a half-resolved message.

use serde_json::Value;
use thiserror::Error;
use tracing::{error, info};

use crate::bundle::Bundle;
use crate::cryptor::{Cryptor, CryptorError};
use crate::model::{Model, ModelError};

/// A drafted and decrypted reply.
#[derive(Debug, Clone)]
pub struct RenderedReply {
    /// Model output with placeholders intact. Operator diagnostics only.
    pub draft: String,
    /// Customer-facing text with plaintext restored.
    pub reply: String,
}

/// Rendering failures. Both fatal to the run.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The reply model call failed.
    #[error("reply drafting failed: {0}")]
    Model(#[from] ModelError),
    /// The final decrypt failed; no partially decrypted text is returned.
    #[error("final reply decrypt failed: {0}")]
    FinalDecrypt(#[from] CryptorError),
}

/// Prompt asking for a concise reply with placeholders preserved.
fn reply_prompt(redacted_input: &str, action_result: &Value) -> String {
    format!(
        r#"You are a friendly customer support agent for a flower shop. Write a concise response using the tool output below.
Always keep PII placeholders (like [PERSON_X], [EMAIL_X]) exactly as provided.

Customer request: {redacted_input}
Operation result: {action_result}"#
    )
}

/// Draft the reply and resolve its placeholders.
///
/// # Errors
///
/// Returns [`RenderError`] when the model call or the final decrypt fails.
pub async fn render(
    model: &dyn Model,
    cryptor: &dyn Cryptor,
    tenant_id: &str,
    redacted_input: &str,
    action_result: &Value,
    bundles: &[Bundle],
) -> Result<RenderedReply, RenderError> {
    let prompt = reply_prompt(redacted_input, action_result);

    let draft_started = std::time::Instant::now();
    let draft = match model.generate(&prompt).await {
        Ok(draft) => draft,
        Err(e) => {
            error!(
                error = %e,
                elapsed_ms = draft_started.elapsed().as_millis(),
                "reply drafting failed"
            );
            return Err(e.into());
        }
    };
    info!(
        elapsed_ms = draft_started.elapsed().as_millis(),
        "reply drafted, placeholders intact"
    );

    let decrypt_started = std::time::Instant::now();
    let reply = match cryptor.decrypt(tenant_id, &draft, bundles).await {
        Ok(reply) => reply,
        Err(e) => {
            error!(
                error = %e,
                elapsed_ms = decrypt_started.elapsed().as_millis(),
                "final reply decrypt failed"
            );
            return Err(e.into());
        }
    };
    info!(
        bundles = bundles.len(),
        elapsed_ms = decrypt_started.elapsed().as_millis(),
        "final reply decrypted"
    );

    Ok(RenderedReply { draft, reply })
}
