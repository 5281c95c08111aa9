//! Shared fixtures for engine integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use lounge_core::{
    AttributeTree, Document, FieldValue, Lounge, LoungeConfig, ModelOptions, Registry,
    ValidationError,
};
use lounge_store::fakes::MemoryDocumentStore;
use lounge_store::{Cas, DocumentStore, StoreResult, StoredDocument, WriteOutcome};
use serde_json::{json, Value};

pub fn registry() -> Arc<Registry> {
    let declaration = json!({
        "User": {
            "firstName": "String",
            "lastName": "String",
            "email": "String",
            "dateOfBirth": "Date"
        },
        "Comment": {
            "content": "String",
            "author": {"type": "User", "ref": "User"}
        },
        "Post": {
            "title": "String",
            "date": "Date",
            "meta": {"views": "Number", "tags": ["String"]},
            "owner": {"type": "User", "ref": "User"},
            "comments": [{"type": "Comment", "ref": "Comment"}]
        },
        "Friend": {
            "name": "String",
            "best": {"type": "Friend", "ref": "Friend"}
        }
    });
    Registry::builder().declare(&declaration).build().unwrap()
}

/// Registry whose `Account` model rejects emails without `@`.
pub fn strict_registry() -> Arc<Registry> {
    let account = AttributeTree::builder()
        .string("email")
        .reference("manager", "Account")
        .build()
        .unwrap();
    let options = ModelOptions::new().with_validator(|doc: &Document| {
        match doc.get_str("email") {
            Some(email) if !email.contains('@') => Err(ValidationError::rule(
                "Account",
                "email",
                format!("{email} is not an address"),
            )),
            _ => Ok(()),
        }
    });
    Registry::builder()
        .model_with("Account", account, options)
        .build()
        .unwrap()
}

pub fn lounge() -> (Lounge, Arc<MemoryDocumentStore>) {
    lounge_with(LoungeConfig::default())
}

pub fn lounge_with(config: LoungeConfig) -> (Lounge, Arc<MemoryDocumentStore>) {
    let store = Arc::new(MemoryDocumentStore::new());
    let lounge = Lounge::with_config(registry(), store.clone(), config);
    (lounge, store)
}

pub fn birthday() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(1990, 3, 3, 3, 30, 0).unwrap()
}

pub fn joe(lounge: &Lounge) -> Document {
    lounge
        .create(
            "User",
            [
                ("firstName", FieldValue::from("Joe")),
                ("lastName", FieldValue::from("Smith")),
                ("email", FieldValue::from("joe@gmail.com")),
                ("dateOfBirth", FieldValue::from(birthday())),
            ],
        )
        .unwrap()
}

pub fn comment(lounge: &Lounge, content: &str, author: Option<&Document>) -> Document {
    let doc = lounge.create("Comment", [("content", content)]).unwrap();
    if let Some(author) = author {
        doc.set("author", author);
    }
    doc
}

/// Post owned by `owner` with three comments, all written by `owner`.
pub fn post_with_comments(lounge: &Lounge, owner: &Document) -> (Document, Vec<Document>) {
    let comments: Vec<Document> = ["first", "second", "third"]
        .into_iter()
        .map(|content| comment(lounge, content, Some(owner)))
        .collect();
    let post = lounge
        .create(
            "Post",
            [
                ("title", FieldValue::from("Hello")),
                ("date", FieldValue::from(Utc.with_ymd_and_hms(2015, 11, 9, 2, 0, 0).unwrap())),
                ("meta", FieldValue::Mixed(json!({"views": 3, "tags": ["rust", "odm"]}))),
                ("owner", FieldValue::from(owner)),
                ("comments", FieldValue::from(comments.clone())),
            ],
        )
        .unwrap();
    (post, comments)
}

/// Store wrapper recording the key batch of every multi-get.
#[derive(Default)]
pub struct RecordingStore {
    pub inner: MemoryDocumentStore,
    batches: Mutex<Vec<Vec<String>>>,
}

impl RecordingStore {
    pub fn batches(&self) -> Vec<Vec<String>> {
        self.batches.lock().unwrap().clone()
    }
}

#[async_trait]
impl DocumentStore for RecordingStore {
    async fn get(&self, key: &str) -> StoreResult<Option<StoredDocument>> {
        self.inner.get(key).await
    }

    async fn get_multi(&self, keys: &[String]) -> StoreResult<HashMap<String, StoredDocument>> {
        self.batches.lock().unwrap().push(keys.to_vec());
        self.inner.get_multi(keys).await
    }

    async fn set(&self, key: &str, value: &Value) -> StoreResult<Cas> {
        self.inner.set(key, value).await
    }

    async fn set_multi(&self, documents: &[(String, Value)]) -> Vec<WriteOutcome> {
        self.inner.set_multi(documents).await
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        self.inner.remove(key).await
    }
}
