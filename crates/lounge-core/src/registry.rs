//! Explicit model registry.
//!
//! Built once at startup with [`RegistryBuilder`], then frozen behind an
//! `Arc` and shared read-only by every save and fetch. Reference targets are
//! resolved at build time, so models may reference each other in any order.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::error::{OdmError, SchemaError};
use crate::keys::{KeyBuilder, KeyFormat, KeyGenerator, KeyStrategy, UuidKeyGenerator};
use crate::schema::AttributeTree;
use crate::validate::Validator;

/// Field reserved for the document key in every stored body.
pub const KEY_FIELD: &str = "id";

/// Per-model registration options.
#[derive(Clone, Default)]
pub struct ModelOptions {
    key_strategy: KeyStrategy,
    validators: Vec<Arc<dyn Validator>>,
}

impl ModelOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store keys become `<prefix><id><suffix>`.
    pub fn with_key_affix(mut self, prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        self.key_strategy = KeyStrategy::Affix {
            prefix: prefix.into(),
            suffix: suffix.into(),
        };
        self
    }

    pub fn with_key_builder(mut self, builder: impl KeyBuilder + 'static) -> Self {
        self.key_strategy = KeyStrategy::Custom(Arc::new(builder));
        self
    }

    pub fn with_validator(mut self, validator: impl Validator + 'static) -> Self {
        self.validators.push(Arc::new(validator));
        self
    }
}

/// A registered, named model: its attribute tree plus identity rules.
pub struct ModelType {
    name: String,
    tree: AttributeTree,
    keys: KeyFormat,
    validators: Vec<Arc<dyn Validator>>,
    generator: Arc<dyn KeyGenerator>,
}

impl fmt::Debug for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelType")
            .field("name", &self.name)
            .field("fields", &self.tree.field_names().collect::<Vec<_>>())
            .field("keys", &self.keys)
            .field("validators", &self.validators.len())
            .finish()
    }
}

impl ModelType {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tree(&self) -> &AttributeTree {
        &self.tree
    }

    /// Store key for a document id.
    pub fn document_key(&self, id: &str) -> String {
        self.keys.build(&self.name, id)
    }

    /// Document id for a store key.
    pub fn id_from_key(&self, key: &str) -> String {
        self.keys.parse(&self.name, key)
    }

    pub(crate) fn generate_key(&self) -> String {
        self.document_key(&self.generator.generate())
    }

    pub(crate) fn validators(&self) -> &[Arc<dyn Validator>] {
        &self.validators
    }
}

/// Frozen set of models.
#[derive(Debug)]
pub struct Registry {
    models: HashMap<String, Arc<ModelType>>,
    order: Vec<String>,
    delimiter: String,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Build a registry from `{ "<Model>": <shape>, ... }` with default options.
    pub fn from_declaration(declaration: &Value) -> Result<Arc<Self>, SchemaError> {
        RegistryBuilder::new().declare(declaration).build()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<ModelType>> {
        self.models.get(name)
    }

    pub fn model(&self, name: &str) -> Result<Arc<ModelType>, OdmError> {
        self.get(name)
            .cloned()
            .ok_or_else(|| OdmError::UnknownModel(name.to_string()))
    }

    /// Model names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Delimiter the default model-prefix keys were built with.
    pub fn key_delimiter(&self) -> &str {
        &self.delimiter
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Collects model declarations and validates them as a whole.
pub struct RegistryBuilder {
    models: Vec<(String, AttributeTree, ModelOptions)>,
    delimiter: String,
    generator: Arc<dyn KeyGenerator>,
    error: Option<SchemaError>,
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self {
            models: Vec::new(),
            delimiter: "::".to_string(),
            generator: Arc::new(UuidKeyGenerator),
            error: None,
        }
    }

    /// Delimiter between model name and id for default keys.
    pub fn key_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = delimiter.into();
        self
    }

    pub fn key_generator(mut self, generator: impl KeyGenerator + 'static) -> Self {
        self.generator = Arc::new(generator);
        self
    }

    pub fn model(self, name: impl Into<String>, tree: AttributeTree) -> Self {
        self.model_with(name, tree, ModelOptions::default())
    }

    pub fn model_with(
        mut self,
        name: impl Into<String>,
        tree: AttributeTree,
        options: ModelOptions,
    ) -> Self {
        self.models.push((name.into(), tree, options));
        self
    }

    /// Register every model of a `{ "<Model>": <shape> }` declaration.
    pub fn declare(mut self, declaration: &Value) -> Self {
        if self.error.is_some() {
            return self;
        }
        let Some(models) = declaration.as_object() else {
            self.error = Some(SchemaError::InvalidDeclaration {
                field: String::new(),
                reason: "model declaration must be an object of shapes".to_string(),
            });
            return self;
        };
        for (name, shape) in models {
            match AttributeTree::from_declaration(shape) {
                Ok(tree) => self = self.model(name.as_str(), tree),
                Err(err) => {
                    self.error = Some(err);
                    break;
                }
            }
        }
        self
    }

    pub fn build(self) -> Result<Arc<Registry>, SchemaError> {
        if let Some(err) = self.error {
            return Err(err);
        }

        let mut order = Vec::with_capacity(self.models.len());
        for (name, tree, _) in &self.models {
            if name.is_empty() {
                return Err(SchemaError::InvalidDeclaration {
                    field: String::new(),
                    reason: "model name must not be empty".to_string(),
                });
            }
            if order.contains(name) {
                return Err(SchemaError::DuplicateModel(name.clone()));
            }
            if tree.contains(KEY_FIELD) {
                return Err(SchemaError::ReservedField {
                    field: KEY_FIELD.to_string(),
                });
            }
            order.push(name.clone());
        }

        for (name, tree, _) in &self.models {
            if let Some(target) = tree
                .referenced_models()
                .into_iter()
                .find(|target| !order.iter().any(|n| n == target))
            {
                return Err(SchemaError::UnknownModel {
                    model: name.clone(),
                    target: target.to_string(),
                });
            }
        }

        let models = self
            .models
            .into_iter()
            .map(|(name, tree, options)| {
                let model = ModelType {
                    keys: options.key_strategy.resolve(&name, &self.delimiter),
                    validators: options.validators,
                    generator: Arc::clone(&self.generator),
                    tree,
                    name: name.clone(),
                };
                (name, Arc::new(model))
            })
            .collect();

        debug!(models = order.len(), "registry built");
        Ok(Arc::new(Registry {
            models,
            order,
            delimiter: self.delimiter,
        }))
    }
}
