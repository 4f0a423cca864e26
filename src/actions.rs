//! Business action execution.
//!
//! Dispatches a classified [`Intent`] against the order store and reports
//! the outcome as a JSON value for the reply prompt, together with any
//! stored bundles the action touched. Orders keep their placeholder-encoded
//! fields throughout; nothing here decrypts except the operator-facing
//! [`lookup_order_decrypted`], which never feeds the pipeline.

use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::bundle::Bundle;
use crate::cryptor::Cryptor;
use crate::intent::Intent;
use crate::store::{NewOrder, Order, OrderStore, StoreError};

/// Result message for a lookup that found nothing.
pub const NOT_FOUND_ERROR: &str = "Order not found";

/// Annotation for an order whose bundle set is missing.
pub const BUNDLES_MISSING_NOTE: &str = "Bundles not found for decryption";

/// What an executed action produced.
#[derive(Debug, Clone)]
pub struct ActionOutcome {
    /// JSON payload describing the result, consumed by the reply prompt.
    pub result: Value,
    /// Stored bundles the action touched, for the downstream merge.
    pub discovered_bundles: Vec<Bundle>,
}

/// Business-logic failures. Fatal to the run.
#[derive(Debug, Error)]
pub enum ExecuteError {
    /// The order store could not be read or written.
    #[error("order store failure: {0}")]
    Store(#[from] StoreError),
}

/// Run one classified action against the store.
///
/// `pipeline_bundles` is the pipeline's current bundle set; a create
/// persists it as the new order's bundle set, since those are exactly the
/// placeholders appearing in the fields being stored.
///
/// # Errors
///
/// Returns [`ExecuteError`] when the store cannot be read or written.
pub async fn execute(
    store: &RwLock<OrderStore>,
    intent: Intent,
    pipeline_bundles: &[Bundle],
) -> Result<ActionOutcome, ExecuteError> {
    match intent {
        Intent::GetOrder { order_id } => {
            info!(order_id = %order_id, "looking up order");
            let store = store.read().await;
            match store.get(&order_id) {
                Some(order) => Ok(ActionOutcome {
                    result: order_json(&order_id, order)?,
                    discovered_bundles: store.bundles_for(&order_id).to_vec(),
                }),
                None => {
                    warn!(order_id = %order_id, "order not found");
                    Ok(ActionOutcome {
                        result: json!({ "error": NOT_FOUND_ERROR }),
                        discovered_bundles: Vec::new(),
                    })
                }
            }
        }

        Intent::GetAllOrders => {
            let store = store.read().await;
            info!(total = store.len(), "listing all orders");
            let mut orders = Vec::new();
            let mut discovered_bundles = Vec::new();
            for (order_id, order) in store.iter() {
                orders.push(order_json(order_id, order)?);
                discovered_bundles.extend_from_slice(store.bundles_for(order_id));
            }
            let total = orders.len();
            Ok(ActionOutcome {
                result: json!({ "orders": orders, "total": total }),
                discovered_bundles,
            })
        }

        Intent::CreateOrder {
            customer,
            email,
            phone,
            address,
            items,
        } => {
            let fields = NewOrder {
                customer,
                email,
                phone,
                address,
                items,
            };
            let mut store = store.write().await;
            let order_id = store.create(fields, pipeline_bundles.to_vec())?;
            Ok(ActionOutcome {
                result: json!({ "order_id": order_id, "status": "created" }),
                discovered_bundles: Vec::new(),
            })
        }
    }
}

/// Fetch one order and resolve its fields to plaintext for the operator.
///
/// Degrades instead of failing: a missing order reports an error payload, a
/// missing bundle set returns the encrypted fields with a note and skips the
/// decrypt call entirely, and a failed decrypt returns the encrypted fields
/// annotated with the failure.
pub async fn lookup_order_decrypted(
    store: &RwLock<OrderStore>,
    cryptor: &dyn Cryptor,
    tenant_id: &str,
    order_id: &str,
) -> Value {
    info!(order_id = %order_id, "fetching order for decryption");
    let (order, bundles) = {
        let store = store.read().await;
        let Some(order) = store.get(order_id) else {
            return json!({ "error": NOT_FOUND_ERROR });
        };
        (order.clone(), store.bundles_for(order_id).to_vec())
    };

    let encrypted = match order_json(order_id, &order) {
        Ok(value) => value,
        Err(e) => return json!({ "error": e.to_string() }),
    };

    if bundles.is_empty() {
        warn!(order_id = %order_id, "stored bundles missing, returning encrypted fields");
        return annotated(encrypted, "note", BUNDLES_MISSING_NOTE);
    }

    let order_text = match serde_json::to_string(&order) {
        Ok(text) => text,
        Err(e) => return annotated(encrypted, "decrypt_error", &e.to_string()),
    };

    let started = std::time::Instant::now();
    match cryptor.decrypt(tenant_id, &order_text, &bundles).await {
        Ok(decrypted_text) => match serde_json::from_str::<Value>(&decrypted_text) {
            Ok(Value::Object(mut map)) => {
                info!(
                    order_id = %order_id,
                    elapsed_ms = started.elapsed().as_millis(),
                    "order decrypted"
                );
                map.insert("order_id".to_owned(), Value::String(order_id.to_owned()));
                Value::Object(map)
            }
            Ok(_) | Err(_) => {
                error!(order_id = %order_id, "decrypted order is not a JSON object");
                annotated(
                    encrypted,
                    "decrypt_error",
                    "privacy service returned a malformed order",
                )
            }
        },
        Err(e) => {
            error!(
                order_id = %order_id,
                error = %e,
                elapsed_ms = started.elapsed().as_millis(),
                "order decrypt failed"
            );
            annotated(encrypted, "decrypt_error", &e.to_string())
        }
    }
}

/// Order record as a JSON object with its identifier folded in.
fn order_json(order_id: &str, order: &Order) -> Result<Value, ExecuteError> {
    let mut value = serde_json::to_value(order).map_err(StoreError::Encode)?;
    if let Value::Object(map) = &mut value {
        map.insert("order_id".to_owned(), Value::String(order_id.to_owned()));
    }
    Ok(value)
}

fn annotated(mut base: Value, key: &str, message: &str) -> Value {
    if let Value::Object(map) = &mut base {
        map.insert(key.to_owned(), Value::String(message.to_owned()));
    }
    base
}
