//! PII bundle records and the merge/dedup fold.
//!
//! A bundle describes one detected or stored piece of PII. Bundles from the
//! Cryptor's detect-encrypt call carry a `placeholder` token; bundles loaded
//! from an order's stored set carry only an `id`. Both travel through the
//! pipeline untouched and are handed back verbatim to the decrypt call, so
//! the wire JSON must round-trip byte-for-byte in content.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

/// A bundle produced by the Cryptor's detect-encrypt operation.
///
/// Identity key: `placeholder`. All remaining fields are the opaque payload
/// the decrypt call needs and are preserved as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveBundle {
    /// Placeholder token appearing in redacted text (e.g. `[PERSON_1]`).
    pub placeholder: String,
    /// Remaining bundle fields, passed through untouched.
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

/// A bundle loaded from an order's persisted bundle set.
///
/// Identity key: `id`. All remaining fields are preserved as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredBundle {
    /// Stable identifier assigned when the bundle was persisted.
    pub id: String,
    /// Remaining bundle fields, passed through untouched.
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

/// One PII occurrence, addressable for decryption by exactly one key.
///
/// A record carrying both fields is treated as live: `placeholder` wins.
/// A record carrying neither (or only non-string keys) is [`Bundle::Opaque`]:
/// it cannot be addressed during decryption and is dropped at merge time
/// rather than failing the response that carried it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Bundle {
    /// Detected by the Cryptor in this run; keyed by placeholder token.
    Live(LiveBundle),
    /// Persisted with a previously created order; keyed by stored id.
    Stored(StoredBundle),
    /// No usable identity key; unaddressable.
    Opaque(Value),
}

impl Bundle {
    /// The identity key bundles are deduplicated by.
    ///
    /// `placeholder` for live bundles, `id` for stored ones. An empty string
    /// counts as missing.
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::Live(b) if !b.placeholder.is_empty() => Some(&b.placeholder),
            Self::Stored(b) if !b.id.is_empty() => Some(&b.id),
            _ => None,
        }
    }
}

/// Fold two bundle collections into one canonical, duplicate-free set.
///
/// Traverses `upstream` then `discovered` in encounter order. For each key,
/// the output keeps the position of its first occurrence and the value of
/// its last: merging a set with itself is a no-op, while conflicting
/// same-key bundles resolve last-write-wins. Keyless bundles are skipped.
pub fn merge_bundles(upstream: Vec<Bundle>, discovered: Vec<Bundle>) -> Vec<Bundle> {
    let mut merged: Vec<(String, Bundle)> = Vec::new();

    for bundle in upstream.into_iter().chain(discovered) {
        let Some(key) = bundle.key().map(str::to_owned) else {
            debug!("dropping bundle with no identity key");
            continue;
        };
        match merged.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, slot)) => *slot = bundle,
            None => merged.push((key, bundle)),
        }
    }

    merged.into_iter().map(|(_, bundle)| bundle).collect()
}
