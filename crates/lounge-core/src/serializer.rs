//! Graph serializer: one document graph in, a flat set of keyed bodies out.
//!
//! Walks the attribute tree alongside each document's values:
//! - primitives are copied, dates written as ISO-8601 text
//! - embedded objects are written inline into the same body
//! - references become `{id: <key>}` and the referenced document is
//!   flattened into its own entry
//!
//! A document already flattened in this walk (same key) is never flattened
//! again, so cyclic and diamond-shaped graphs yield one entry per document.
//! Children are emitted before the document that first reached them.

use std::collections::HashSet;

use serde_json::{json, Map, Value};

use crate::document::Document;
use crate::registry::KEY_FIELD;
use crate::schema::{AttributeDescriptor, AttributeTree};
use crate::value::{format_date, FieldValue, Fields, Reference};

/// One document ready for the store.
#[derive(Debug, Clone)]
pub struct FlatEntry {
    pub key: String,
    pub body: Value,
    pub document: Document,
}

/// Every document reachable from a root, flattened.
#[derive(Debug, Clone)]
pub struct FlatGraph {
    root_key: String,
    entries: Vec<FlatEntry>,
}

impl FlatGraph {
    pub fn root_key(&self) -> &str {
        &self.root_key
    }

    pub fn root(&self) -> Option<&FlatEntry> {
        self.get(&self.root_key)
    }

    /// Entries in emission order (children before their first referrer).
    pub fn entries(&self) -> &[FlatEntry] {
        &self.entries
    }

    pub fn get(&self, key: &str) -> Option<&FlatEntry> {
        self.entries.iter().find(|entry| entry.key == key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.key.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `(key, body)` pairs for the store.
    pub fn writes(&self) -> Vec<(String, Value)> {
        self.entries
            .iter()
            .map(|entry| (entry.key.clone(), entry.body.clone()))
            .collect()
    }
}

/// Flatten the graph reachable from `root`.
pub fn flatten(root: &Document) -> FlatGraph {
    let mut flattener = Flattener::default();
    flattener.visit(root);
    FlatGraph {
        root_key: root.key(),
        entries: flattener.entries,
    }
}

#[derive(Default)]
struct Flattener {
    visited: HashSet<String>,
    entries: Vec<FlatEntry>,
}

impl Flattener {
    fn visit(&mut self, doc: &Document) {
        let key = doc.key();
        if !self.visited.insert(key.clone()) {
            return;
        }

        let fields = doc.fields();
        let mut body = Map::new();
        body.insert(KEY_FIELD.to_string(), Value::String(key.clone()));
        self.encode_fields(doc.model().tree(), &fields, &mut body);

        self.entries.push(FlatEntry {
            key,
            body: Value::Object(body),
            document: doc.clone(),
        });
    }

    fn encode_fields(&mut self, tree: &AttributeTree, fields: &Fields, body: &mut Map<String, Value>) {
        for attr in tree.iter() {
            if let Some(value) = fields.get(&attr.name) {
                if let Some(encoded) = self.encode(&attr.descriptor, value) {
                    body.insert(attr.name.clone(), encoded);
                }
            }
        }
    }

    /// `None` means "omit from the body".
    fn encode(&mut self, descriptor: &AttributeDescriptor, value: &FieldValue) -> Option<Value> {
        match value {
            FieldValue::Ref(Reference::Loaded(doc)) => {
                self.visit(doc);
                Some(json!({ KEY_FIELD: doc.key() }))
            }
            FieldValue::Ref(Reference::Unloaded(key)) => Some(json!({ KEY_FIELD: key })),
            FieldValue::Embedded(fields) => {
                let mut body = Map::new();
                match descriptor {
                    AttributeDescriptor::Embedded(tree) => {
                        self.encode_fields(tree, fields, &mut body)
                    }
                    _ => {
                        for (name, value) in fields {
                            if let Some(encoded) = self.encode(descriptor.element(), value) {
                                body.insert(name.clone(), encoded);
                            }
                        }
                    }
                }
                (!body.is_empty()).then_some(Value::Object(body))
            }
            FieldValue::Array(items) => Some(Value::Array(
                items
                    .iter()
                    .map(|item| {
                        self.encode(descriptor.element(), item)
                            .unwrap_or(Value::Null)
                    })
                    .collect(),
            )),
            scalar => encode_scalar(scalar),
        }
    }
}

fn encode_scalar(value: &FieldValue) -> Option<Value> {
    match value {
        FieldValue::Null => None,
        FieldValue::String(s) => Some(Value::String(s.clone())),
        FieldValue::Number(n) => Some(Value::Number(n.clone())),
        FieldValue::Bool(b) => Some(Value::Bool(*b)),
        FieldValue::Date(d) => Some(Value::String(format_date(d))),
        FieldValue::Mixed(Value::Null) => None,
        FieldValue::Mixed(v) => Some(v.clone()),
        FieldValue::Embedded(_) | FieldValue::Array(_) | FieldValue::Ref(_) => None,
    }
}

// ---------------------------------------------------------------------------
// Inline rendering
// ---------------------------------------------------------------------------

/// Render a document with its loaded references nested inline.
pub(crate) fn render(doc: &Document) -> Value {
    Renderer::default().document(doc)
}

#[derive(Default)]
struct Renderer {
    ancestors: Vec<String>,
}

impl Renderer {
    fn document(&mut self, doc: &Document) -> Value {
        let key = doc.key();
        if self.ancestors.contains(&key) {
            return json!({ KEY_FIELD: key });
        }
        self.ancestors.push(key.clone());

        let fields = doc.fields();
        let mut body = Map::new();
        body.insert(KEY_FIELD.to_string(), Value::String(key));
        self.fields(doc.model().tree(), &fields, &mut body);

        self.ancestors.pop();
        Value::Object(body)
    }

    fn fields(&mut self, tree: &AttributeTree, fields: &Fields, body: &mut Map<String, Value>) {
        for attr in tree.iter() {
            if let Some(value) = fields.get(&attr.name).and_then(|v| self.value(&attr.descriptor, v)) {
                body.insert(attr.name.clone(), value);
            }
        }
    }

    fn value(&mut self, descriptor: &AttributeDescriptor, value: &FieldValue) -> Option<Value> {
        match (descriptor, value) {
            (_, FieldValue::Ref(Reference::Loaded(doc))) => Some(self.document(doc)),
            (_, FieldValue::Ref(Reference::Unloaded(key))) => Some(json!({ KEY_FIELD: key })),
            (AttributeDescriptor::Embedded(tree), FieldValue::Embedded(fields)) => {
                let mut body = Map::new();
                self.fields(tree, fields, &mut body);
                (!body.is_empty()).then_some(Value::Object(body))
            }
            (_, FieldValue::Array(items)) => Some(Value::Array(
                items
                    .iter()
                    .map(|item| self.value(descriptor.element(), item).unwrap_or(Value::Null))
                    .collect(),
            )),
            (_, other) => other.to_plain_json().filter(|v| !v.is_null()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;

    fn registry() -> Arc<Registry> {
        Registry::from_declaration(&json!({
            "User": {"name": "String", "best": {"type": "User", "ref": "User"}},
            "Comment": {"content": "String", "author": {"type": "User", "ref": "User"}},
            "Post": {
                "title": "String",
                "date": "Date",
                "meta": {"views": "Number", "tags": ["String"]},
                "owner": {"type": "User", "ref": "User"},
                "comments": [{"type": "Comment", "ref": "Comment"}]
            }
        }))
        .unwrap()
    }

    #[test]
    fn references_flatten_to_id_objects() {
        let registry = registry();
        let user = Document::from_data(&registry.model("User").unwrap(), [("name", "Will")]);
        let post = Document::from_data(
            &registry.model("Post").unwrap(),
            [
                ("title", FieldValue::from("t")),
                ("owner", FieldValue::from(&user)),
            ],
        );

        let graph = flatten(&post);

        assert_eq!(graph.len(), 2);
        assert_eq!(graph.entries()[0].key, user.key());
        assert_eq!(graph.root_key(), post.key());
        assert_eq!(
            graph.root().unwrap().body,
            json!({
                "id": post.key(),
                "title": "t",
                "meta": {"tags": []},
                "owner": {"id": user.key()},
                "comments": []
            })
        );
        assert_eq!(
            graph.get(&user.key()).unwrap().body,
            json!({"id": user.key(), "name": "Will"})
        );
    }

    #[test]
    fn embedded_objects_stay_inline_in_tree_order() {
        let registry = registry();
        let date = Utc.with_ymd_and_hms(2015, 11, 9, 2, 0, 0).unwrap();
        let post = Document::from_json(
            &registry.model("Post").unwrap(),
            &json!({"meta": {"tags": ["a", "b"], "views": 3}, "title": "t"}),
        );
        post.set("date", date);

        let graph = flatten(&post);
        let body = &graph.root().unwrap().body;

        assert_eq!(graph.len(), 1);
        assert_eq!(body["date"], json!("2015-11-09T02:00:00.000Z"));
        assert_eq!(body["meta"], json!({"views": 3, "tags": ["a", "b"]}));
        let order: Vec<&String> = body.as_object().unwrap().keys().collect();
        assert_eq!(order, vec!["id", "title", "date", "meta", "comments"]);
        let meta_order: Vec<&String> = body["meta"].as_object().unwrap().keys().collect();
        assert_eq!(meta_order, vec!["views", "tags"]);
    }

    #[test]
    fn shared_document_is_flattened_once() {
        let registry = registry();
        let user = Document::from_data(&registry.model("User").unwrap(), [("name", "Sara")]);
        let comment_model = registry.model("Comment").unwrap();
        let c1 = Document::from_data(&comment_model, [("author", &user)]);
        let c2 = Document::from_data(&comment_model, [("author", &user)]);
        let post = Document::from_data(
            &registry.model("Post").unwrap(),
            [
                ("owner", FieldValue::from(&user)),
                ("comments", FieldValue::from(vec![c1.clone(), c2.clone()])),
            ],
        );

        let graph = flatten(&post);

        assert_eq!(graph.len(), 4);
        assert_eq!(
            graph.root().unwrap().body["comments"],
            json!([{"id": c1.key()}, {"id": c2.key()}])
        );
    }

    #[test]
    fn cycles_terminate_with_one_entry_each() {
        let registry = registry();
        let user_model = registry.model("User").unwrap();
        let a = Document::from_data(&user_model, [("name", "A")]);
        let b = Document::from_data(&user_model, [("name", "B")]);
        a.set("best", &b);
        b.set("best", &a);

        let graph = flatten(&a);

        assert_eq!(graph.len(), 2);
        assert_eq!(graph.get(&a.key()).unwrap().body["best"], json!({"id": b.key()}));
        assert_eq!(graph.get(&b.key()).unwrap().body["best"], json!({"id": a.key()}));

        let rendered = a.to_value();
        assert_eq!(rendered["best"]["name"], json!("B"));
        assert_eq!(rendered["best"]["best"], json!({"id": a.key()}));

        // break the cycle so both handles can drop
        a.unset("best");
    }

    #[test]
    fn flattening_is_deterministic() {
        let registry = registry();
        let user = Document::from_data(&registry.model("User").unwrap(), [("name", "Joe")]);
        let post = Document::from_data(
            &registry.model("Post").unwrap(),
            [("title", FieldValue::from("t")), ("owner", FieldValue::from(&user))],
        );

        assert_eq!(flatten(&post).writes(), flatten(&post).writes());
    }
}
