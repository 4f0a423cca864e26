//! Flat-file order store.
//!
//! Two JSON files, loaded once at startup and rewritten in full on every
//! create: the orders file (`{"orders": {...}, "counter": N}`) and the
//! bundles file (order id → bundle list). An order's PII fields hold
//! placeholder tokens, never plaintext; the matching bundle set is what
//! makes the order decryptable later.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::bundle::Bundle;

/// Status every order carries at creation.
pub const STATUS_PROCESSING: &str = "processing";

/// One stored order. PII fields are placeholder-encoded at rest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Customer name placeholder.
    pub customer: String,
    /// Email placeholder.
    pub email: String,
    /// Phone placeholder.
    pub phone: String,
    /// Delivery address placeholder.
    pub address: String,
    /// Free-text item description (not PII, stored verbatim).
    pub items: String,
    /// Fulfilment status.
    pub status: String,
    /// Creation timestamp, `%Y-%m-%d %H:%M` UTC.
    pub created_at: String,
}

/// Field set for an order about to be created.
#[derive(Debug, Clone)]
pub struct NewOrder {
    /// Customer name placeholder.
    pub customer: String,
    /// Email placeholder.
    pub email: String,
    /// Phone placeholder.
    pub phone: String,
    /// Delivery address placeholder.
    pub address: String,
    /// Free-text item description.
    pub items: String,
}

/// Store persistence errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// File write or rename failed.
    #[error("failed to write {path}: {source}")]
    Write {
        /// Path being written.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Store contents could not be encoded as JSON.
    #[error("failed to encode store file: {0}")]
    Encode(#[from] serde_json::Error),
}

/// On-disk shape of the orders file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct OrdersFile {
    #[serde(default)]
    orders: BTreeMap<String, Order>,
    #[serde(default = "first_order_number")]
    counter: u64,
}

fn first_order_number() -> u64 {
    1
}

/// Orders, their bundle sets, and the identifier counter.
///
/// Constructed once at process start and shared behind a lock; identifier
/// allocation and insertion happen inside [`OrderStore::create`] as one
/// operation.
#[derive(Debug)]
pub struct OrderStore {
    orders: BTreeMap<String, Order>,
    counter: u64,
    bundles: HashMap<String, Vec<Bundle>>,
    orders_path: PathBuf,
    bundles_path: PathBuf,
}

impl OrderStore {
    /// Load the store from disk, or start empty.
    ///
    /// A missing file is a fresh store; an unreadable or unparseable file is
    /// logged and treated as empty rather than refusing to start.
    pub fn load(orders_path: &Path, bundles_path: &Path) -> Self {
        let OrdersFile { orders, counter } = match std::fs::read_to_string(orders_path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(file) => file,
                Err(e) => {
                    error!(path = %orders_path.display(), error = %e, "orders file unreadable, starting empty");
                    OrdersFile::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %orders_path.display(), "orders file not found, starting empty");
                OrdersFile::default()
            }
            Err(e) => {
                error!(path = %orders_path.display(), error = %e, "failed to read orders file, starting empty");
                OrdersFile::default()
            }
        };

        let bundles: HashMap<String, Vec<Bundle>> = match std::fs::read_to_string(bundles_path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(map) => map,
                Err(e) => {
                    error!(path = %bundles_path.display(), error = %e, "bundles file unreadable, starting empty");
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %bundles_path.display(), "bundles file not found, starting empty");
                HashMap::new()
            }
            Err(e) => {
                error!(path = %bundles_path.display(), error = %e, "failed to read bundles file, starting empty");
                HashMap::new()
            }
        };

        let counter = if counter == 0 { first_order_number() } else { counter };
        info!(
            orders = orders.len(),
            bundle_sets = bundles.len(),
            "order store initialized"
        );

        Self {
            orders,
            counter,
            bundles,
            orders_path: orders_path.to_path_buf(),
            bundles_path: bundles_path.to_path_buf(),
        }
    }

    /// Allocate the next identifier, insert the order with its bundle set,
    /// and persist both files.
    ///
    /// The identifier sequence is `ORD-001`, `ORD-002`, … with no gaps or
    /// reuse within a process lifetime.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if either file cannot be written.
    pub fn create(&mut self, fields: NewOrder, bundles: Vec<Bundle>) -> Result<String, StoreError> {
        let order_id = format!("ORD-{:03}", self.counter);
        self.counter = self.counter.saturating_add(1);

        let order = Order {
            customer: fields.customer,
            email: fields.email,
            phone: fields.phone,
            address: fields.address,
            items: fields.items,
            status: STATUS_PROCESSING.to_owned(),
            created_at: Utc::now().format("%Y-%m-%d %H:%M").to_string(),
        };

        info!(order_id = %order_id, "creating order (encrypted fields)");
        self.orders.insert(order_id.clone(), order);
        self.bundles.insert(order_id.clone(), bundles);

        self.persist_orders()?;
        self.persist_bundles()?;
        info!(order_id = %order_id, "order created");
        Ok(order_id)
    }

    /// Look up one order by identifier.
    pub fn get(&self, order_id: &str) -> Option<&Order> {
        self.orders.get(order_id)
    }

    /// Iterate every stored order with its identifier.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Order)> {
        self.orders.iter().map(|(id, order)| (id.as_str(), order))
    }

    /// Number of stored orders.
    pub fn len(&self) -> usize {
        self.orders.len()
    }

    /// Whether the store holds no orders.
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// The bundle set persisted for an order; empty when none was saved.
    pub fn bundles_for(&self, order_id: &str) -> &[Bundle] {
        let bundles = self
            .bundles
            .get(order_id)
            .map(Vec::as_slice)
            .unwrap_or_default();
        debug!(order_id, count = bundles.len(), "fetched stored bundles");
        bundles
    }

    /// Raw in-memory view of the orders file, for the operator `/db` dump.
    pub fn orders_snapshot(&self) -> serde_json::Value {
        json!({ "orders": self.orders, "counter": self.counter })
    }

    /// Raw in-memory view of the bundles file, for the operator `/db` dump.
    pub fn bundles_snapshot(&self) -> serde_json::Value {
        json!(self.bundles)
    }

    fn persist_orders(&self) -> Result<(), StoreError> {
        let file = json!({ "orders": self.orders, "counter": self.counter });
        let contents = serde_json::to_string_pretty(&file)?;
        write_atomic(&self.orders_path, &contents)?;
        debug!(path = %self.orders_path.display(), "order store saved");
        Ok(())
    }

    fn persist_bundles(&self) -> Result<(), StoreError> {
        let contents = serde_json::to_string_pretty(&self.bundles)?;
        write_atomic(&self.bundles_path, &contents)?;
        debug!(path = %self.bundles_path.display(), "bundle store saved");
        Ok(())
    }
}

/// Write to a sibling temp file, then rename over the target to avoid
/// partial reads.
fn write_atomic(path: &Path, contents: &str) -> Result<(), StoreError> {
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, contents).map_err(|source| StoreError::Write {
        path: tmp.clone(),
        source,
    })?;
    std::fs::rename(&tmp, path).map_err(|source| StoreError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}
