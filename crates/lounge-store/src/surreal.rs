//! SurrealDB-backed `DocumentStore`
//!
//! Every document is one row of the `documents` table, addressed by record
//! id `documents:⟨key⟩`. The body is kept as JSON text so that field order
//! and number representation survive the round trip untouched.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use surrealdb::engine::any::Any;
use surrealdb::opt::auth::{Database, Root};
use surrealdb::Surreal;
use tracing::{debug, info, instrument};

use crate::config::{AuthLevel, StoreConfig};
use crate::error::{StoreError, StoreResult};
use crate::store::{check_key, Cas, DocumentStore, StoredDocument};

const SCHEMA: &str = r#"
    DEFINE TABLE IF NOT EXISTS documents SCHEMAFULL;
    DEFINE FIELD IF NOT EXISTS key ON documents TYPE string;
    DEFINE FIELD IF NOT EXISTS body ON documents TYPE string;
    DEFINE FIELD IF NOT EXISTS cas ON documents TYPE int;
    DEFINE INDEX IF NOT EXISTS idx_document_key ON documents FIELDS key UNIQUE;
"#;

#[derive(Debug, Deserialize)]
struct DocumentRow {
    key: String,
    body: String,
    cas: i64,
}

impl DocumentRow {
    fn into_stored(self) -> StoreResult<(String, StoredDocument)> {
        let value = serde_json::from_str(&self.body).map_err(|e| StoreError::Serialization {
            key: self.key.clone(),
            message: e.to_string(),
        })?;
        Ok((
            self.key,
            StoredDocument {
                value,
                cas: Cas(self.cas as u64),
            },
        ))
    }
}

fn backend(key: &str) -> impl Fn(surrealdb::Error) -> StoreError + '_ {
    move |e| StoreError::Backend {
        key: key.to_string(),
        message: e.to_string(),
    }
}

/// SurrealDB-backed implementation of [`DocumentStore`].
pub struct SurrealDocumentStore {
    db: Surreal<Any>,
    last_cas: AtomicU64,
}

impl SurrealDocumentStore {
    /// Create an in-memory instance for testing.
    ///
    /// Connects to `mem://`, selects `lounge/main`, and defines the table.
    pub async fn in_memory() -> StoreResult<Self> {
        Self::open(&StoreConfig::in_memory()).await
    }

    /// Connect to any SurrealDB URL (`mem://`, `surrealkv://path`, `ws://...`)
    /// anonymously, using the default namespace and database.
    pub async fn connect(url: &str) -> StoreResult<Self> {
        Self::open(&StoreConfig::new(url)).await
    }

    /// Connect with settings read by [`StoreConfig::from_env`].
    pub async fn from_env() -> StoreResult<Self> {
        Self::open(&StoreConfig::from_env()?).await
    }

    /// Open the store described by `config`.
    ///
    /// A local `surrealkv://` directory is created first. With credentials the
    /// handle signs in at the configured level before selecting the namespace.
    #[instrument(skip(config), fields(url = %config.url, namespace = %config.namespace, database = %config.database))]
    pub async fn open(config: &StoreConfig) -> StoreResult<Self> {
        if let Some(path) = config.local_path() {
            std::fs::create_dir_all(path).map_err(|e| {
                StoreError::Connection(format!("Failed to create database directory {path}: {e}"))
            })?;
        }

        let db = surrealdb::engine::any::connect(config.url.as_str())
            .await
            .map_err(|e| StoreError::Connection(format!("Failed to connect to {}: {e}", config.url)))?;

        if let Some(credentials) = &config.credentials {
            let signin = match credentials.level {
                AuthLevel::Root => {
                    db.signin(Root {
                        username: &credentials.username,
                        password: &credentials.password,
                    })
                    .await
                    .map(|_| ())
                }
                AuthLevel::Database => {
                    db.signin(Database {
                        namespace: &config.namespace,
                        database: &config.database,
                        username: &credentials.username,
                        password: &credentials.password,
                    })
                    .await
                    .map(|_| ())
                }
            };
            signin.map_err(|e| {
                StoreError::Connection(format!(
                    "Sign-in as {} ({:?}) failed: {e}",
                    credentials.username, credentials.level
                ))
            })?;
        }

        db.use_ns(&config.namespace)
            .use_db(&config.database)
            .await
            .map_err(|e| {
                StoreError::Connection(format!("Failed to select namespace/database: {e}"))
            })?;

        let store = Self::from_db(db).await?;
        info!("SurrealDocumentStore connected ({})", config.url);
        Ok(store)
    }

    async fn from_db(db: Surreal<Any>) -> StoreResult<Self> {
        debug!("Defining documents table");
        db.query(SCHEMA)
            .await
            .and_then(|response| response.check())
            .map_err(|e| StoreError::Connection(format!("Schema setup failed: {e}")))?;

        Ok(Self {
            db,
            last_cas: AtomicU64::new(0),
        })
    }

    /// Tokens are strictly increasing per handle and seeded from wall-clock time.
    fn next_cas(&self) -> Cas {
        let now = Utc::now().timestamp_micros().max(0) as u64;
        let previous = self
            .last_cas
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or_else(|last| last);
        Cas(now.max(previous + 1))
    }
}

#[async_trait]
impl DocumentStore for SurrealDocumentStore {
    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> StoreResult<Option<StoredDocument>> {
        check_key(key)?;
        let mut res = self
            .db
            .query("SELECT key, body, cas FROM type::thing('documents', $key)")
            .bind(("key", key.to_string()))
            .await
            .map_err(backend(key))?;

        let rows: Vec<DocumentRow> = res.take(0).map_err(backend(key))?;
        rows.into_iter()
            .next()
            .map(|row| row.into_stored().map(|(_, doc)| doc))
            .transpose()
    }

    #[instrument(skip(self), fields(count = keys.len()))]
    async fn get_multi(&self, keys: &[String]) -> StoreResult<HashMap<String, StoredDocument>> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }
        for key in keys {
            check_key(key)?;
        }

        let mut res = self
            .db
            .query("SELECT key, body, cas FROM documents WHERE key IN $keys")
            .bind(("keys", keys.to_vec()))
            .await
            .map_err(|e| StoreError::Request(e.to_string()))?;

        let rows: Vec<DocumentRow> = res
            .take(0)
            .map_err(|e| StoreError::Request(e.to_string()))?;
        rows.into_iter().map(DocumentRow::into_stored).collect()
    }

    #[instrument(skip(self, value))]
    async fn set(&self, key: &str, value: &Value) -> StoreResult<Cas> {
        check_key(key)?;
        let body = serde_json::to_string(value).map_err(|e| StoreError::Serialization {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        let cas = self.next_cas();

        self.db
            .query(
                "UPSERT type::thing('documents', $key) \
                 CONTENT { key: $key, body: $body, cas: $cas } RETURN NONE",
            )
            .bind(("key", key.to_string()))
            .bind(("body", body))
            .bind(("cas", cas.0 as i64))
            .await
            .and_then(|response| response.check())
            .map_err(backend(key))?;

        debug!(%cas, "document written");
        Ok(cas)
    }

    #[instrument(skip(self))]
    async fn remove(&self, key: &str) -> StoreResult<()> {
        check_key(key)?;
        self.db
            .query("DELETE type::thing('documents', $key)")
            .bind(("key", key.to_string()))
            .await
            .and_then(|response| response.check())
            .map_err(backend(key))?;
        Ok(())
    }
}
