//! Model instances.
//!
//! A [`Document`] is a cheap, cloneable handle: clones share the same field
//! state, so one instance can be referenced from several places of a graph
//! (including cycles). Identity is the store key, frozen the first time it is
//! read.

use std::fmt;
use std::sync::{Arc, OnceLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::trace;

use crate::registry::{ModelType, KEY_FIELD};
use crate::schema::AttributeDescriptor;
use crate::serializer;
use crate::value::{coerce, zero_fields, FieldValue, Fields, Reference};

#[derive(Debug)]
struct DocumentState {
    fields: Fields,
    dirty: bool,
}

struct DocumentInner {
    model: Arc<ModelType>,
    key: OnceLock<String>,
    state: RwLock<DocumentState>,
}

/// A live instance of a registered model.
#[derive(Clone)]
pub struct Document {
    inner: Arc<DocumentInner>,
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("model", &self.inner.model.name())
            .field("key", &self.inner.key.get())
            .finish()
    }
}

impl Document {
    /// Empty instance: every field at its zero value, no key yet.
    pub fn new(model: &Arc<ModelType>) -> Self {
        Self::build(model, OnceLock::new(), zero_fields(model.tree()), true)
    }

    /// Empty instance with a caller-supplied id.
    pub fn with_id(model: &Arc<ModelType>, id: &str) -> Self {
        let doc = Self::new(model);
        doc.assign_id(id);
        doc
    }

    /// Instance built from a partial or full data mapping. Names the model
    /// does not declare are dropped; an `id` entry becomes the document id.
    pub fn from_data<I, K, V>(model: &Arc<ModelType>, data: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<FieldValue>,
    {
        let doc = Self::new(model);
        doc.assign(data);
        doc
    }

    /// Instance built from a JSON object. Non-objects yield an empty instance.
    pub fn from_json(model: &Arc<ModelType>, data: &Value) -> Self {
        let doc = Self::new(model);
        if let Some(map) = data.as_object() {
            doc.assign(map.iter().map(|(k, v)| (k, FieldValue::Mixed(v.clone()))));
        }
        doc
    }

    pub(crate) fn hydrated(model: &Arc<ModelType>, key: String, fields: Fields) -> Self {
        Self::build(model, OnceLock::from(key), fields, false)
    }

    fn build(model: &Arc<ModelType>, key: OnceLock<String>, fields: Fields, dirty: bool) -> Self {
        Document {
            inner: Arc::new(DocumentInner {
                model: Arc::clone(model),
                key,
                state: RwLock::new(DocumentState { fields, dirty }),
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, DocumentState> {
        self.inner.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, DocumentState> {
        self.inner
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    // ----- identity --------------------------------------------------------

    pub fn model(&self) -> &Arc<ModelType> {
        &self.inner.model
    }

    pub fn model_name(&self) -> &str {
        self.inner.model.name()
    }

    /// Store key. Generated on first access when none was supplied, then
    /// stable for the life of the instance.
    pub fn key(&self) -> String {
        self.inner
            .key
            .get_or_init(|| self.inner.model.generate_key())
            .clone()
    }

    /// Document id: the store key without the model's key affixes.
    pub fn id(&self) -> String {
        self.inner.model.id_from_key(&self.key())
    }

    /// Whether a key has been supplied or generated yet.
    pub fn has_key(&self) -> bool {
        self.inner.key.get().is_some()
    }

    /// Both handles point at the same instance.
    pub fn same_instance(&self, other: &Document) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn assign_id(&self, id: &str) -> bool {
        let key = self.inner.model.document_key(id);
        match self.inner.key.set(key) {
            Ok(()) => true,
            Err(key) => self.inner.key.get() == Some(&key),
        }
    }

    // ----- mutation --------------------------------------------------------

    /// Merge `data` into the instance. Fields absent from `data` keep their
    /// current values.
    pub fn assign<I, K, V>(&self, data: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<FieldValue>,
    {
        for (name, value) in data {
            self.set(name.as_ref(), value);
        }
    }

    /// Assign one field. Returns `false` when the model has no such field
    /// (the value is dropped) or when an `id` conflicts with a frozen key.
    pub fn set(&self, name: &str, value: impl Into<FieldValue>) -> bool {
        let value = value.into();
        if name == KEY_FIELD {
            return match value {
                FieldValue::String(id) | FieldValue::Mixed(Value::String(id)) => {
                    self.assign_id(&id)
                }
                _ => false,
            };
        }

        let Some(descriptor) = self.inner.model.tree().get(name) else {
            trace!(model = self.model_name(), field = name, "dropping unknown field");
            return false;
        };
        let value = coerce(descriptor, value);

        let mut state = self.write();
        state.fields.insert(name.to_string(), value);
        state.dirty = true;
        true
    }

    /// Reset one field to its zero value.
    pub fn unset(&self, name: &str) -> bool {
        match self.inner.model.tree().get(name) {
            Some(descriptor) => self.set(name, FieldValue::zero(descriptor)),
            None => false,
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.read().dirty
    }

    pub(crate) fn mark_clean(&self) {
        self.write().dirty = false;
    }

    /// Mutate fields without touching the dirty flag (population only).
    pub(crate) fn update_fields<R>(&self, f: impl FnOnce(&mut Fields) -> R) -> R {
        f(&mut self.write().fields)
    }

    // ----- access ----------------------------------------------------------

    /// Snapshot of every field.
    pub fn fields(&self) -> Fields {
        self.read().fields.clone()
    }

    /// Current value of a declared field; `None` for undeclared names.
    pub fn get(&self, name: &str) -> Option<FieldValue> {
        self.read().fields.get(name).cloned()
    }

    pub fn get_str(&self, name: &str) -> Option<String> {
        self.get(name).and_then(|v| v.as_str().map(str::to_string))
    }

    pub fn get_number(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(|v| v.as_f64())
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(|v| v.as_i64())
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(|v| v.as_bool())
    }

    pub fn get_date(&self, name: &str) -> Option<DateTime<Utc>> {
        self.get(name).and_then(|v| v.as_date())
    }

    /// Loaded document behind a scalar reference field.
    pub fn get_ref(&self, name: &str) -> Option<Document> {
        match self.get(name)? {
            FieldValue::Ref(Reference::Loaded(doc)) => Some(doc),
            _ => None,
        }
    }

    /// Key behind a scalar reference field, loaded or not.
    pub fn ref_key(&self, name: &str) -> Option<String> {
        match self.get(name)? {
            FieldValue::Ref(reference) => Some(reference.key()),
            _ => None,
        }
    }

    /// Loaded documents of a reference array, in array order.
    pub fn get_refs(&self, name: &str) -> Vec<Document> {
        self.array_refs(name)
            .into_iter()
            .filter_map(|r| r.document().cloned())
            .collect()
    }

    /// Keys of a reference array, in array order.
    pub fn ref_keys(&self, name: &str) -> Vec<String> {
        self.array_refs(name).iter().map(Reference::key).collect()
    }

    fn array_refs(&self, name: &str) -> Vec<Reference> {
        match self.get(name) {
            Some(FieldValue::Array(items)) => items
                .into_iter()
                .filter_map(|item| match item {
                    FieldValue::Ref(reference) => Some(reference),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    /// `false` while the field still holds an unloaded reference placeholder
    /// anywhere inside it.
    pub fn is_populated(&self, name: &str) -> bool {
        let state = self.read();
        match (self.inner.model.tree().get(name), state.fields.get(name)) {
            (Some(descriptor), Some(value)) => !has_placeholder(descriptor, value),
            _ => true,
        }
    }

    /// JSON view of the in-memory graph: loaded references are rendered
    /// inline, a reference back to an ancestor is rendered as `{id}`.
    pub fn to_value(&self) -> Value {
        serializer::render(self)
    }
}

fn has_placeholder(descriptor: &AttributeDescriptor, value: &FieldValue) -> bool {
    match (descriptor, value) {
        (AttributeDescriptor::Reference(_), FieldValue::Ref(Reference::Unloaded(_))) => true,
        (AttributeDescriptor::Array(element), FieldValue::Array(items)) => {
            items.iter().any(|item| has_placeholder(element, item))
        }
        (AttributeDescriptor::Embedded(tree), FieldValue::Embedded(fields)) => {
            tree.iter().any(|attr| {
                fields
                    .get(&attr.name)
                    .is_some_and(|v| has_placeholder(&attr.descriptor, v))
            })
        }
        _ => false,
    }
}
