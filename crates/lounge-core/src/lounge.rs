//! The engine facade: one registry, one store, one configuration.

use std::sync::Arc;

use lounge_store::DocumentStore;
use tracing::{debug, info, instrument, warn};

use crate::config::LoungeConfig;
use crate::document::Document;
use crate::error::Result;
use crate::hydrate::Hydrator;
use crate::persist;
use crate::registry::{ModelType, Registry};
use crate::value::FieldValue;

/// How far references are followed when loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Population {
    /// Use the configured default depth.
    #[default]
    Eager,
    /// Leave every reference as a placeholder.
    Lazy,
    /// Follow at most this many reference hops.
    Depth(usize),
    /// Follow references until the graph is exhausted.
    Unbounded,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FetchOptions {
    pub population: Population,
}

impl FetchOptions {
    pub fn eager() -> Self {
        Self::default()
    }

    pub fn lazy() -> Self {
        Self {
            population: Population::Lazy,
        }
    }

    pub fn depth(depth: usize) -> Self {
        Self {
            population: Population::Depth(depth),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PopulateOptions {
    /// Only this top-level field; every reference field when `None`.
    pub field: Option<String>,
    pub population: Population,
}

impl PopulateOptions {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn field(name: impl Into<String>) -> Self {
        Self {
            field: Some(name.into()),
            population: Population::Eager,
        }
    }

    pub fn with_depth(mut self, depth: usize) -> Self {
        self.population = Population::Depth(depth);
        self
    }
}

/// Saves, fetches and removes document graphs.
#[derive(Clone)]
pub struct Lounge {
    registry: Arc<Registry>,
    store: Arc<dyn DocumentStore>,
    config: LoungeConfig,
}

impl std::fmt::Debug for Lounge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lounge")
            .field("models", &self.registry.names().collect::<Vec<_>>())
            .field("config", &self.config)
            .finish()
    }
}

impl Lounge {
    pub fn new(registry: Arc<Registry>, store: Arc<dyn DocumentStore>) -> Self {
        Self::with_config(registry, store, LoungeConfig::default())
    }

    /// Keys are fixed when the registry is built, so the registry's delimiter
    /// replaces a differing `config.key_delimiter`.
    pub fn with_config(
        registry: Arc<Registry>,
        store: Arc<dyn DocumentStore>,
        mut config: LoungeConfig,
    ) -> Self {
        if config.key_delimiter != registry.key_delimiter() {
            warn!(
                configured = %config.key_delimiter,
                registry = %registry.key_delimiter(),
                "key delimiter differs from the registry's; keeping the registry's"
            );
            config.key_delimiter = registry.key_delimiter().to_string();
        }
        Self {
            registry,
            store,
            config,
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn config(&self) -> &LoungeConfig {
        &self.config
    }

    pub fn model(&self, name: &str) -> Result<Arc<ModelType>> {
        self.registry.model(name)
    }

    /// New unsaved instance of `model` built from `data`.
    pub fn create<I, K, V>(&self, model: &str, data: I) -> Result<Document>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<FieldValue>,
    {
        Ok(Document::from_data(&self.model(model)?, data))
    }

    /// Persist `doc` and every document reachable from it.
    ///
    /// Validation runs on the whole graph before the first write. On success
    /// every written instance is clean and the same handle is returned.
    #[instrument(skip(self, doc), fields(model = doc.model_name(), key = %doc.key()))]
    pub async fn save(&self, doc: &Document) -> Result<Document> {
        persist::save(self.store.as_ref(), doc, self.config.write_batch_size).await?;
        Ok(doc.clone())
    }

    /// Merge `data` into `doc`, then save.
    pub async fn save_with<I, K, V>(&self, doc: &Document, data: I) -> Result<Document>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<FieldValue>,
    {
        doc.assign(data);
        self.save(doc).await
    }

    /// Load the document stored under `key` as an instance of `model`.
    #[instrument(skip(self, options), fields(population = ?options.population))]
    pub async fn fetch(
        &self,
        model: &str,
        key: &str,
        options: FetchOptions,
    ) -> Result<Option<Document>> {
        let model = self.model(model)?;
        let depth = self.depth(options.population);
        let doc = Hydrator::new(&self.registry, self.store.as_ref())
            .fetch(&model, key, depth)
            .await?;
        if doc.is_some() {
            debug!("document fetched");
        }
        Ok(doc)
    }

    /// Fetch by document id rather than store key.
    pub async fn find_by_id(
        &self,
        model: &str,
        id: &str,
        options: FetchOptions,
    ) -> Result<Option<Document>> {
        let key = self.model(model)?.document_key(id);
        self.fetch(model, &key, options).await
    }

    /// Resolve placeholders left on `doc` by a lazy or depth-limited load.
    #[instrument(skip(self, doc, options), fields(key = %doc.key(), field = ?options.field))]
    pub async fn populate(&self, doc: &Document, options: PopulateOptions) -> Result<Document> {
        let depth = self.depth(options.population);
        Hydrator::new(&self.registry, self.store.as_ref())
            .populate(doc.clone(), options.field.as_deref(), depth)
            .await?;
        Ok(doc.clone())
    }

    /// Delete `doc` from the store. Referenced documents are left in place.
    #[instrument(skip(self, doc), fields(model = doc.model_name(), key = %doc.key()))]
    pub async fn remove(&self, doc: &Document) -> Result<()> {
        self.store.remove(&doc.key()).await?;
        info!("document removed");
        Ok(())
    }

    fn depth(&self, population: Population) -> Option<usize> {
        match population {
            Population::Eager => self.config.populate_depth,
            Population::Lazy => Some(0),
            Population::Depth(depth) => Some(depth),
            Population::Unbounded => None,
        }
    }
}
