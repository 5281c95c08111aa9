//! Lounge-Store: the flat document store beneath the Lounge ODM
//!
//! The ODM engine never talks to a database directly. It speaks to a
//! [`DocumentStore`]: a key-value contract with per-key atomic `get`,
//! `get_multi`, `set` and `remove`, where every value is a JSON document.
//!
//! ## Backends
//!
//! - [`fakes::MemoryDocumentStore`]: `HashMap`-backed store with failure
//!   injection and operation counters, used by the test suites
//! - [`SurrealDocumentStore`]: SurrealDB-backed store (in-memory, local
//!   `surrealkv://`, or cloud over WebSocket)
//!
//! There is no multi-key transaction primitive. A batch write reports a
//! result per key and already-written keys stay written.

mod config;
mod error;
pub mod fakes;
pub mod store;
mod surreal;

pub use config::{AuthLevel, Credentials, StoreConfig, DEFAULT_STORE_URL};
pub use error::{StoreError, StoreResult};
pub use store::{Cas, DocumentStore, StoredDocument, WriteOutcome};
pub use surreal::SurrealDocumentStore;
