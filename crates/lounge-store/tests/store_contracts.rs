//! Contract tests for DocumentStore.
//!
//! Every backend must pass these. The in-memory fake runs them directly;
//! the SurrealDB store runs them against `mem://`.

use lounge_store::fakes::MemoryDocumentStore;
use lounge_store::{DocumentStore, StoreConfig, StoreError, SurrealDocumentStore};
use serde_json::json;

async fn get_returns_none_for_missing(store: &dyn DocumentStore) {
    assert!(store.get("User::missing").await.unwrap().is_none());
}

async fn set_then_get_round_trip(store: &dyn DocumentStore) {
    let body = json!({"id": "User::1", "firstName": "Joe", "favourites": ["a", "b"]});
    let cas = store.set("User::1", &body).await.unwrap();
    let stored = store.get("User::1").await.unwrap().unwrap();

    assert_eq!(stored.value, body);
    assert_eq!(stored.cas, cas);
}

async fn set_is_upsert_with_new_cas(store: &dyn DocumentStore) {
    let first = store.set("Post::1", &json!({"title": "a"})).await.unwrap();
    let second = store.set("Post::1", &json!({"title": "b"})).await.unwrap();
    let stored = store.get("Post::1").await.unwrap().unwrap();

    assert_ne!(first, second);
    assert_eq!(stored.value, json!({"title": "b"}));
}

async fn get_multi_skips_missing_keys(store: &dyn DocumentStore) {
    store.set("Comment::1", &json!({"content": "one"})).await.unwrap();
    store.set("Comment::3", &json!({"content": "three"})).await.unwrap();

    let keys = vec![
        "Comment::1".to_string(),
        "Comment::2".to_string(),
        "Comment::3".to_string(),
    ];
    let found = store.get_multi(&keys).await.unwrap();

    assert_eq!(found.len(), 2);
    assert_eq!(found["Comment::1"].value, json!({"content": "one"}));
    assert!(!found.contains_key("Comment::2"));
}

async fn remove_deletes_and_is_idempotent(store: &dyn DocumentStore) {
    store.set("User::gone", &json!({})).await.unwrap();
    store.remove("User::gone").await.unwrap();
    store.remove("User::gone").await.unwrap();

    assert!(store.get("User::gone").await.unwrap().is_none());
}

async fn set_multi_reports_in_input_order(store: &dyn DocumentStore) {
    let docs = vec![
        ("A::1".to_string(), json!({"n": 1})),
        ("A::2".to_string(), json!({"n": 2})),
    ];
    let outcomes = store.set_multi(&docs).await;

    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0].key, "A::1");
    assert_eq!(outcomes[1].key, "A::2");
    assert!(outcomes.iter().all(|o| o.is_ok()));
    assert_eq!(store.get("A::2").await.unwrap().unwrap().value, json!({"n": 2}));
}

async fn empty_key_is_rejected(store: &dyn DocumentStore) {
    let err = store.set("", &json!({})).await.unwrap_err();
    assert!(matches!(err, StoreError::InvalidKey(_)));
}

async fn run_contract(store: &dyn DocumentStore) {
    get_returns_none_for_missing(store).await;
    set_then_get_round_trip(store).await;
    set_is_upsert_with_new_cas(store).await;
    get_multi_skips_missing_keys(store).await;
    remove_deletes_and_is_idempotent(store).await;
    set_multi_reports_in_input_order(store).await;
    empty_key_is_rejected(store).await;
}

// ===========================================================================
// MemoryDocumentStore
// ===========================================================================

#[tokio::test]
async fn memory_store_satisfies_contract() {
    run_contract(&MemoryDocumentStore::new()).await;
}

#[tokio::test]
async fn memory_store_injected_write_failure_is_partial() {
    let store = MemoryDocumentStore::new();
    store.fail_writes_on("B::2");

    let docs = vec![
        ("B::1".to_string(), json!({"n": 1})),
        ("B::2".to_string(), json!({"n": 2})),
        ("B::3".to_string(), json!({"n": 3})),
    ];
    let outcomes = store.set_multi(&docs).await;

    assert!(outcomes[0].is_ok());
    assert!(matches!(
        &outcomes[1].result,
        Err(StoreError::Backend { key, .. }) if key == "B::2"
    ));
    assert!(outcomes[2].is_ok());
    assert_eq!(store.keys(), vec!["B::1".to_string(), "B::3".to_string()]);
}

#[tokio::test]
async fn memory_store_injected_read_failure_fails_multi_get() {
    let store = MemoryDocumentStore::new();
    store.set("C::1", &json!({})).await.unwrap();
    store.fail_reads_on("C::1");

    let err = store.get_multi(&["C::1".to_string()]).await.unwrap_err();
    assert_eq!(err.key(), Some("C::1"));

    store.heal();
    assert!(store.get("C::1").await.unwrap().is_some());
}

#[tokio::test]
async fn memory_store_counts_round_trips() {
    let store = MemoryDocumentStore::new();
    store.set("D::1", &json!({})).await.unwrap();
    store
        .get_multi(&["D::1".to_string(), "D::2".to_string()])
        .await
        .unwrap();

    let counts = store.counts();
    assert_eq!(counts.set, 1);
    assert_eq!(counts.get_multi, 1);
    assert_eq!(counts.get, 0);
    assert_eq!(counts.round_trips(), 2);
}

// ===========================================================================
// SurrealDocumentStore
// ===========================================================================

#[tokio::test]
async fn surreal_store_satisfies_contract() {
    let store = SurrealDocumentStore::in_memory().await.unwrap();
    run_contract(&store).await;
}

#[tokio::test]
async fn surreal_store_keeps_field_order() {
    let store = SurrealDocumentStore::in_memory().await.unwrap();
    let body = json!({"id": "User::o", "zeta": 1, "alpha": 2});
    store.set("User::o", &body).await.unwrap();

    let stored = store.get("User::o").await.unwrap().unwrap();
    let fields: Vec<&String> = stored.value.as_object().unwrap().keys().collect();
    assert_eq!(fields, vec!["id", "zeta", "alpha"]);
}

#[tokio::test]
async fn surreal_store_opens_configured_namespace() {
    let config = StoreConfig::in_memory()
        .with_namespace("tenant_a")
        .with_database("blog");
    let store = SurrealDocumentStore::open(&config).await.unwrap();
    run_contract(&store).await;
}

#[tokio::test]
async fn surreal_store_creates_local_directory() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("db");
    let config = StoreConfig::new(format!("surrealkv://{}", path.display()));

    let store = SurrealDocumentStore::open(&config).await.unwrap();
    store.set("User::1", &json!({"name": "kv"})).await.unwrap();

    assert!(path.is_dir());
    assert_eq!(
        store.get("User::1").await.unwrap().unwrap().value,
        json!({"name": "kv"})
    );
}
