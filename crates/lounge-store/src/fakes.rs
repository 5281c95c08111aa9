//! In-memory fakes for the store contract (testing only)
//!
//! `MemoryDocumentStore` satisfies [`DocumentStore`] without any external
//! dependencies and adds two test seams:
//! - failure injection per key (`fail_writes_on`, `fail_reads_on`)
//! - operation counters (`counts`) to assert round-trip batching

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{StoreError, StoreResult};
use crate::store::{check_key, Cas, DocumentStore, StoredDocument, WriteOutcome};

/// Number of calls made against a [`MemoryDocumentStore`], per operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpCounts {
    pub get: usize,
    pub get_multi: usize,
    pub set: usize,
    pub set_multi: usize,
    pub remove: usize,
}

impl OpCounts {
    /// Total store round trips.
    pub fn round_trips(&self) -> usize {
        self.get + self.get_multi + self.set + self.set_multi + self.remove
    }
}

// ---------------------------------------------------------------------------
// MemoryDocumentStore
// ---------------------------------------------------------------------------

/// In-memory document store backed by a `HashMap<key, (body, cas)>`.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    docs: Mutex<HashMap<String, StoredDocument>>,
    next_cas: AtomicU64,
    failing_writes: Mutex<HashSet<String>>,
    failing_reads: Mutex<HashSet<String>>,
    counts: Mutex<OpCounts>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every future write to `key` fail with a backend error.
    pub fn fail_writes_on(&self, key: impl Into<String>) {
        self.failing_writes.lock().unwrap().insert(key.into());
    }

    /// Make every future read of `key` fail with a backend error.
    pub fn fail_reads_on(&self, key: impl Into<String>) {
        self.failing_reads.lock().unwrap().insert(key.into());
    }

    /// Clear all injected failures.
    pub fn heal(&self) {
        self.failing_writes.lock().unwrap().clear();
        self.failing_reads.lock().unwrap().clear();
    }

    /// Snapshot of the operation counters.
    pub fn counts(&self) -> OpCounts {
        *self.counts.lock().unwrap()
    }

    pub fn reset_counts(&self) {
        *self.counts.lock().unwrap() = OpCounts::default();
    }

    /// Raw body stored under `key`, bypassing counters and injected failures.
    pub fn raw(&self, key: &str) -> Option<Value> {
        self.docs.lock().unwrap().get(key).map(|d| d.value.clone())
    }

    /// All stored keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.docs.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.docs.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn injected(set: &Mutex<HashSet<String>>, key: &str, op: &str) -> StoreResult<()> {
        if set.lock().unwrap().contains(key) {
            return Err(StoreError::Backend {
                key: key.to_string(),
                message: format!("injected {op} failure"),
            });
        }
        Ok(())
    }

    fn read(&self, key: &str) -> StoreResult<Option<StoredDocument>> {
        check_key(key)?;
        Self::injected(&self.failing_reads, key, "read")?;
        Ok(self.docs.lock().unwrap().get(key).cloned())
    }

    fn write(&self, key: &str, value: &Value) -> StoreResult<Cas> {
        check_key(key)?;
        Self::injected(&self.failing_writes, key, "write")?;
        let cas = Cas(self.next_cas.fetch_add(1, Ordering::SeqCst) + 1);
        self.docs.lock().unwrap().insert(
            key.to_string(),
            StoredDocument {
                value: value.clone(),
                cas,
            },
        );
        Ok(cas)
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, key: &str) -> StoreResult<Option<StoredDocument>> {
        self.counts.lock().unwrap().get += 1;
        self.read(key)
    }

    async fn get_multi(&self, keys: &[String]) -> StoreResult<HashMap<String, StoredDocument>> {
        self.counts.lock().unwrap().get_multi += 1;
        let mut found = HashMap::with_capacity(keys.len());
        for key in keys {
            if let Some(doc) = self.read(key)? {
                found.insert(key.clone(), doc);
            }
        }
        Ok(found)
    }

    async fn set(&self, key: &str, value: &Value) -> StoreResult<Cas> {
        self.counts.lock().unwrap().set += 1;
        self.write(key, value)
    }

    async fn set_multi(&self, documents: &[(String, Value)]) -> Vec<WriteOutcome> {
        self.counts.lock().unwrap().set_multi += 1;
        documents
            .iter()
            .map(|(key, value)| WriteOutcome {
                key: key.clone(),
                result: self.write(key, value),
            })
            .collect()
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        self.counts.lock().unwrap().remove += 1;
        check_key(key)?;
        Self::injected(&self.failing_writes, key, "remove")?;
        self.docs.lock().unwrap().remove(key);
        Ok(())
    }
}
