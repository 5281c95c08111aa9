//! End-to-end save and fetch against an in-memory SurrealDB store.

mod common;

use std::sync::Arc;

use common::*;
use lounge_core::{FetchOptions, Lounge, PopulateOptions};
use lounge_store::{DocumentStore, SurrealDocumentStore};
use serde_json::json;

async fn surreal_lounge() -> (Lounge, Arc<SurrealDocumentStore>) {
    let store = Arc::new(SurrealDocumentStore::in_memory().await.unwrap());
    (Lounge::new(registry(), store.clone()), store)
}

#[tokio::test]
async fn graph_round_trips_through_surreal() {
    let (lounge, store) = surreal_lounge().await;
    let user = joe(&lounge);
    let (post, comments) = post_with_comments(&lounge, &user);

    lounge.save(&post).await.unwrap();

    let stored = store.get(&post.key()).await.unwrap().unwrap();
    assert_eq!(stored.value["owner"], json!({"id": user.key()}));
    assert_eq!(
        stored.value["comments"],
        json!(comments
            .iter()
            .map(|c| json!({"id": c.key()}))
            .collect::<Vec<_>>())
    );

    let fetched = lounge
        .fetch("Post", &post.key(), FetchOptions::eager())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fetched.to_value(), post.to_value());
}

#[tokio::test]
async fn lazy_fetch_then_populate_through_surreal() {
    let (lounge, _) = surreal_lounge().await;
    let user = joe(&lounge);
    let post = lounge.create("Post", [("owner", &user)]).unwrap();
    lounge.save(&post).await.unwrap();

    let fetched = lounge
        .fetch("Post", &post.key(), FetchOptions::lazy())
        .await
        .unwrap()
        .unwrap();
    assert!(!fetched.is_populated("owner"));

    lounge
        .populate(&fetched, PopulateOptions::all())
        .await
        .unwrap();
    assert_eq!(
        fetched.get_ref("owner").unwrap().get_date("dateOfBirth"),
        Some(birthday())
    );
}

#[tokio::test]
async fn remove_then_fetch_is_none() {
    let (lounge, _) = surreal_lounge().await;
    let user = joe(&lounge);
    lounge.save(&user).await.unwrap();

    lounge.remove(&user).await.unwrap();

    let found = lounge
        .fetch("User", &user.key(), FetchOptions::eager())
        .await
        .unwrap();
    assert!(found.is_none());
}
