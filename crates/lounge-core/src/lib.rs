//! Lounge: an object-document mapper over key-value document stores.
//!
//! Models are declared as attribute trees and frozen into a [`Registry`].
//! A [`Document`] graph is saved by flattening every referenced document into
//! its own stored body, with references written as `{id: <key>}`. Fetching
//! reverses that, following references eagerly, lazily or to a fixed depth.
//!
//! ```no_run
//! use std::sync::Arc;
//! use lounge_core::{FetchOptions, Lounge, Registry};
//! use lounge_store::SurrealDocumentStore;
//! use serde_json::json;
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let registry = Registry::from_declaration(&json!({
//!     "User": {"name": "String"},
//!     "Post": {"title": "String", "owner": {"type": "User", "ref": "User"}}
//! }))?;
//! let store = Arc::new(SurrealDocumentStore::in_memory().await?);
//! let lounge = Lounge::new(registry, store);
//!
//! let user = lounge.create("User", [("name", "Will")])?;
//! let post = lounge.create("Post", [("title", "Hello")])?;
//! post.set("owner", &user);
//! lounge.save(&post).await?;
//!
//! let loaded = lounge.fetch("Post", &post.key(), FetchOptions::eager()).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod document;
pub mod error;
mod hydrate;
pub mod keys;
pub mod lounge;
mod persist;
pub mod registry;
pub mod schema;
pub mod serializer;
pub mod telemetry;
pub mod validate;
pub mod value;

pub use config::LoungeConfig;
pub use document::Document;
pub use error::{OdmError, Result, SchemaError, ValidationError};
pub use keys::{KeyBuilder, KeyGenerator, KeyStrategy, UuidKeyGenerator};
pub use lounge::{FetchOptions, Lounge, PopulateOptions, Population};
pub use registry::{ModelOptions, ModelType, Registry, RegistryBuilder, KEY_FIELD};
pub use schema::{Attribute, AttributeDescriptor, AttributeTree, PrimitiveKind, SchemaBuilder};
pub use serializer::{flatten, FlatEntry, FlatGraph};
pub use telemetry::init_tracing;
pub use validate::{validate, Validator};
pub use value::{FieldValue, Fields, Reference};
