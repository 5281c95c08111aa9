//! Graph hydrator: stored bodies back into live documents.
//!
//! Population walks the graph one level at a time. Every unloaded reference
//! found at a level is fetched with a single `get_multi`, and each key is
//! materialized once per operation through an identity map, so shared and
//! cyclic references come back as shared instances.
//!
//! A referenced key that is missing or whose body does not decode resolves
//! to null in place. Only the root document's own decode failure is an error.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use lounge_store::DocumentStore;
use serde_json::Value;
use tracing::{debug, warn};

use crate::document::Document;
use crate::error::{OdmError, Result, ValidationError};
use crate::registry::{ModelType, Registry};
use crate::schema::{AttributeDescriptor, AttributeTree};
use crate::validate::check_fields;
use crate::value::{coerce_fields, FieldValue, Fields, Reference};

/// Decode one stored body into a clean document of `model`.
///
/// Unknown fields are dropped, missing fields take their zero value and
/// references come back as unloaded placeholders.
pub(crate) fn decode(model: &Arc<ModelType>, key: &str, body: Value) -> Result<Document> {
    let Value::Object(map) = body else {
        return Err(OdmError::Decode {
            key: key.to_string(),
            field: String::new(),
            reason: format!("stored body is {}, expected an object", json_kind(&body)),
        });
    };

    let raw: Fields = map
        .into_iter()
        .map(|(name, value)| (name, FieldValue::Mixed(value)))
        .collect();
    let fields = coerce_fields(model.tree(), raw);

    check_fields(model.name(), "", model.tree(), &fields).map_err(|err| match err {
        ValidationError::TypeMismatch {
            field,
            expected,
            found,
            ..
        } => OdmError::Decode {
            key: key.to_string(),
            field,
            reason: format!("expected {expected}, found {found}"),
        },
        ValidationError::Rule { field, message, .. } => OdmError::Decode {
            key: key.to_string(),
            field,
            reason: message,
        },
    })?;

    Ok(Document::hydrated(model, key.to_string(), fields))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// One population pass. Lives for a single fetch or populate call.
pub(crate) struct Hydrator<'a> {
    registry: &'a Registry,
    store: &'a dyn DocumentStore,
    identity: HashMap<String, Document>,
    expanded: HashSet<String>,
}

enum Slot {
    Unloaded { key: String, model: String },
    Loaded(Document),
}

impl<'a> Hydrator<'a> {
    pub(crate) fn new(registry: &'a Registry, store: &'a dyn DocumentStore) -> Self {
        Self {
            registry,
            store,
            identity: HashMap::new(),
            expanded: HashSet::new(),
        }
    }

    /// Load `key` as `model` and populate it to `depth`. `Ok(None)` when the
    /// store has no such key.
    pub(crate) async fn fetch(
        mut self,
        model: &Arc<ModelType>,
        key: &str,
        depth: Option<usize>,
    ) -> Result<Option<Document>> {
        let Some(stored) = self.store.get(key).await? else {
            debug!(key, "document not found");
            return Ok(None);
        };

        let root = decode(model, key, stored.value)?;
        self.populate(root.clone(), None, depth).await?;
        Ok(Some(root))
    }

    /// Replace unloaded references reachable from `root` with loaded
    /// documents. `field` restricts the first level to one top-level field.
    /// `depth` counts reference hops; `None` runs until no placeholder is
    /// left, `Some(0)` does nothing.
    pub(crate) async fn populate(
        &mut self,
        root: Document,
        field: Option<&str>,
        depth: Option<usize>,
    ) -> Result<()> {
        self.identity.insert(root.key(), root.clone());

        let mut frontier = vec![root];
        let mut field = field;
        let mut remaining = depth;
        let mut level = 0usize;

        while !frontier.is_empty() {
            if remaining == Some(0) {
                let pending = frontier
                    .iter()
                    .filter(|doc| !self.expanded.contains(&doc.key()))
                    .flat_map(|doc| slots(doc, field))
                    .filter(|slot| matches!(slot, Slot::Unloaded { .. }))
                    .count();
                if pending > 0 {
                    debug!(level, pending, "population depth reached, leaving placeholders");
                }
                break;
            }

            let mut wanted: Vec<(String, String)> = Vec::new();
            let mut next = Vec::new();
            for doc in &frontier {
                if !self.expanded.insert(doc.key()) {
                    continue;
                }
                for slot in slots(doc, field) {
                    match slot {
                        Slot::Unloaded { key, model } => {
                            if !self.identity.contains_key(&key)
                                && !wanted.iter().any(|(k, _)| *k == key)
                            {
                                wanted.push((key, model));
                            }
                        }
                        Slot::Loaded(child) => {
                            self.identity
                                .entry(child.key())
                                .or_insert_with(|| child.clone());
                            next.push(child);
                        }
                    }
                }
            }

            if !wanted.is_empty() {
                let keys: Vec<String> = wanted.iter().map(|(key, _)| key.clone()).collect();
                debug!(level, keys = keys.len(), "fetching referenced documents");
                let mut found = self.store.get_multi(&keys).await?;

                for (key, model_name) in wanted {
                    match found.remove(&key) {
                        Some(stored) => {
                            let model = self.registry.model(&model_name)?;
                            match decode(&model, &key, stored.value) {
                                Ok(doc) => {
                                    self.identity.insert(key, doc.clone());
                                    next.push(doc);
                                }
                                Err(err) => warn!(
                                    key = %key,
                                    model = %model_name,
                                    error = %err,
                                    "referenced document does not fit its model"
                                ),
                            }
                        }
                        None => warn!(key = %key, model = %model_name, "referenced document not found"),
                    }
                }
            }

            for doc in &frontier {
                resolve(doc, field, &self.identity);
            }

            frontier = next;
            field = None;
            remaining = remaining.map(|d| d - 1);
            level += 1;
        }

        Ok(())
    }
}

/// Reference slots of `doc`, restricted to `field` when given.
fn slots(doc: &Document, field: Option<&str>) -> Vec<Slot> {
    let fields = doc.fields();
    let mut out = Vec::new();
    for attr in doc.model().tree().iter() {
        if field.is_some_and(|f| f != attr.name) {
            continue;
        }
        if let Some(value) = fields.get(&attr.name) {
            collect(&attr.descriptor, value, &mut out);
        }
    }
    out
}

fn collect(descriptor: &AttributeDescriptor, value: &FieldValue, out: &mut Vec<Slot>) {
    match (descriptor, value) {
        (AttributeDescriptor::Reference(model), FieldValue::Ref(Reference::Unloaded(key))) => {
            out.push(Slot::Unloaded {
                key: key.clone(),
                model: model.clone(),
            })
        }
        (AttributeDescriptor::Reference(_), FieldValue::Ref(Reference::Loaded(doc))) => {
            out.push(Slot::Loaded(doc.clone()))
        }
        (AttributeDescriptor::Array(element), FieldValue::Array(items)) => {
            for item in items {
                collect(element, item, out);
            }
        }
        (AttributeDescriptor::Embedded(tree), FieldValue::Embedded(fields)) => {
            collect_fields(tree, fields, out)
        }
        _ => {}
    }
}

fn collect_fields(tree: &AttributeTree, fields: &Fields, out: &mut Vec<Slot>) {
    for attr in tree.iter() {
        if let Some(value) = fields.get(&attr.name) {
            collect(&attr.descriptor, value, out);
        }
    }
}

/// Swap placeholders in `doc` for identity-map documents. Keys with no
/// document become null in place.
fn resolve(doc: &Document, field: Option<&str>, identity: &HashMap<String, Document>) {
    let model = Arc::clone(doc.model());
    doc.update_fields(|fields| {
        for attr in model.tree().iter() {
            if field.is_some_and(|f| f != attr.name) {
                continue;
            }
            if let Some(value) = fields.get_mut(&attr.name) {
                resolve_value(&attr.descriptor, value, identity);
            }
        }
    });
}

fn resolve_value(
    descriptor: &AttributeDescriptor,
    value: &mut FieldValue,
    identity: &HashMap<String, Document>,
) {
    match descriptor {
        AttributeDescriptor::Reference(_) => {
            if let FieldValue::Ref(Reference::Unloaded(key)) = value {
                let replacement = match identity.get(key.as_str()) {
                    Some(doc) => FieldValue::Ref(Reference::Loaded(doc.clone())),
                    None => FieldValue::Null,
                };
                *value = replacement;
            }
        }
        AttributeDescriptor::Array(element) => {
            if let FieldValue::Array(items) = value {
                for item in items.iter_mut() {
                    resolve_value(element, item, identity);
                }
            }
        }
        AttributeDescriptor::Embedded(tree) => {
            if let FieldValue::Embedded(fields) = value {
                for attr in tree.iter() {
                    if let Some(inner) = fields.get_mut(&attr.name) {
                        resolve_value(&attr.descriptor, inner, identity);
                    }
                }
            }
        }
        AttributeDescriptor::Primitive(_) => {}
    }
}
