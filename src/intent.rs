//! Intent classification.
//!
//! The model sees only placeholder-encoded text and must answer with a
//! single JSON object naming one of three operations. This module does no
//! reasoning of its own: it builds the constrained prompt, cuts the JSON
//! span out of whatever prose the model wraps around it, and parses that
//! span into [`Intent`]. Anything else is a classification failure, never a
//! silent default.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info};

use crate::model::{Model, ModelError};

/// The operation the customer asked for.
///
/// Placeholder fields are opaque tokens echoed back by the model; they are
/// stored and compared, never interpreted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Intent {
    /// Create a new order from placeholder-encoded contact fields.
    CreateOrder {
        /// Customer name placeholder.
        #[serde(default)]
        customer: String,
        /// Email placeholder.
        #[serde(default)]
        email: String,
        /// Phone placeholder.
        #[serde(default)]
        phone: String,
        /// Delivery address placeholder.
        #[serde(default)]
        address: String,
        /// Free-text item description.
        #[serde(default)]
        items: String,
    },
    /// Look one order up by identifier.
    GetOrder {
        /// Identifier like `ORD-001`.
        #[serde(default)]
        order_id: String,
    },
    /// List every stored order.
    GetAllOrders,
}

impl Intent {
    /// Wire-format tag, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateOrder { .. } => "create_order",
            Self::GetOrder { .. } => "get_order",
            Self::GetAllOrders => "get_all_orders",
        }
    }
}

/// Classification failures. All fatal to the run.
#[derive(Debug, Error)]
pub enum ClassifyError {
    /// The model call itself failed.
    #[error("intent model call failed: {0}")]
    Model(#[from] ModelError),
    /// The model output contains no `{...}` span.
    #[error("model output contains no JSON object")]
    MissingJson,
    /// The JSON span is not one of the three recognized intents.
    #[error("model output is not a recognized intent: {0}")]
    Unrecognized(serde_json::Error),
}

/// Cut the widest `{...}` span out of raw model output.
///
/// Models routinely wrap the object in prose or code fences; the first `{`
/// and the last `}` bound the payload.
pub fn extract_json(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }
    raw.get(start..=end)
}

/// Prompt constraining the model to emit exactly one intent object.
fn classify_prompt(redacted_input: &str) -> String {
    format!(
        r#"You are the backend action selector. Analyze the customer's request below (PII already replaced with placeholders) and decide which operation to run.
Request: {redacted_input}

Rules for create_order:
- Fields 'customer', 'email', 'phone', 'address' MUST contain the placeholders exactly as provided.
- Field 'items' must include the full text description of the products from the request. Always wrap the value of 'items' in double quotes.

Return ONLY a JSON object shaped as one of the following:
- Lookup by ID: {{"action": "get_order", "order_id": "ORD-XXX"}}
- List orders: {{"action": "get_all_orders"}}
- Create order: {{"action": "create_order", "customer": "[PERSON_X]", "email": "[EMAIL_X]", "phone": "[PHONE_X]", "address": "[LOCATION_X]", "items": "text description"}}
"#
    )
}

/// Ask the model which operation to run against the redacted request.
///
/// # Errors
///
/// Returns [`ClassifyError`] when the model call fails, when its output
/// carries no JSON object, or when the object is not a recognized intent.
pub async fn classify(model: &dyn Model, redacted_input: &str) -> Result<Intent, ClassifyError> {
    let started = std::time::Instant::now();
    match classify_inner(model, redacted_input).await {
        Ok(intent) => {
            info!(
                action = intent.name(),
                elapsed_ms = started.elapsed().as_millis(),
                "intent classified"
            );
            Ok(intent)
        }
        Err(e) => {
            error!(
                error = %e,
                elapsed_ms = started.elapsed().as_millis(),
                "intent classification failed"
            );
            Err(e)
        }
    }
}

async fn classify_inner(model: &dyn Model, redacted_input: &str) -> Result<Intent, ClassifyError> {
    let raw = model.generate(&classify_prompt(redacted_input)).await?;
    let span = extract_json(&raw).ok_or(ClassifyError::MissingJson)?;
    serde_json::from_str(span).map_err(ClassifyError::Unrecognized)
}
