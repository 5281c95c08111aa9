//! The `DocumentStore` contract
//!
//! Any flat key-value store can sit beneath the ODM as long as it offers:
//! - `get(key)`: the document or `None`
//! - `get_multi(keys)`: a map holding only the keys that exist
//! - `set(key, value)`: upsert, returning a fresh CAS token
//! - `remove(key)`: delete, no-op when absent
//!
//! Each operation is atomic for its own key only.

use std::collections::HashMap;

use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{StoreError, StoreResult};

/// Opaque compare-and-swap token issued on every successful write.
///
/// The ODM does not require CAS for correctness; it is surfaced so callers
/// can layer optimistic concurrency on top.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cas(pub u64);

impl std::fmt::Display for Cas {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// A document as read back from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub value: Value,
    pub cas: Cas,
}

/// Result of one key within a batched write.
#[derive(Debug, Clone)]
pub struct WriteOutcome {
    pub key: String,
    pub result: StoreResult<Cas>,
}

impl WriteOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Flat key-value document store.
///
/// Guarantees:
/// - Absence is `Ok(None)` / a missing map entry, never an error.
/// - `set` has upsert semantics.
/// - `set_multi` reports one outcome per input key, in input order. There is
///   no rollback: keys written before a failure stay written.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read one document.
    async fn get(&self, key: &str) -> StoreResult<Option<StoredDocument>>;

    /// Read several documents in one round trip.
    ///
    /// The default implementation issues the reads concurrently. Backends
    /// with a native multi-get should override it.
    async fn get_multi(&self, keys: &[String]) -> StoreResult<HashMap<String, StoredDocument>> {
        let reads = join_all(keys.iter().map(|key| self.get(key))).await;
        let mut found = HashMap::with_capacity(keys.len());
        for (key, read) in keys.iter().zip(reads) {
            if let Some(doc) = read? {
                found.insert(key.clone(), doc);
            }
        }
        Ok(found)
    }

    /// Upsert one document.
    async fn set(&self, key: &str, value: &Value) -> StoreResult<Cas>;

    /// Upsert several independent documents.
    ///
    /// The default implementation issues every write concurrently and
    /// collects the outcomes.
    async fn set_multi(&self, documents: &[(String, Value)]) -> Vec<WriteOutcome> {
        let writes = join_all(documents.iter().map(|(key, value)| self.set(key, value))).await;
        documents
            .iter()
            .zip(writes)
            .map(|((key, _), result)| WriteOutcome {
                key: key.clone(),
                result,
            })
            .collect()
    }

    /// Delete one document. No-op if absent.
    async fn remove(&self, key: &str) -> StoreResult<()>;
}

pub(crate) fn check_key(key: &str) -> StoreResult<()> {
    if key.trim().is_empty() {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}
