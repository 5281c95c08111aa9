//! Persistence coordinator: validate, flatten, write.
//!
//! Writes go out in batches of `write_batch_size` documents. A batch with
//! any failed key ends the save: later batches are never issued and earlier
//! writes are not rolled back. The first failure in batch order is returned.

use lounge_store::DocumentStore;
use tracing::{debug, info, warn};

use crate::document::Document;
use crate::error::{OdmError, Result};
use crate::serializer::{flatten, FlatGraph};
use crate::validate::validate;

pub(crate) async fn save(
    store: &dyn DocumentStore,
    root: &Document,
    batch_size: usize,
) -> Result<FlatGraph> {
    validate(root)?;
    let graph = flatten(root);
    for entry in graph.entries() {
        if !entry.document.same_instance(root) {
            validate(&entry.document)?;
        }
    }
    debug!(documents = graph.len(), "graph flattened");

    let writes = graph.writes();
    let mut written = 0usize;
    for batch in writes.chunks(batch_size.max(1)) {
        let mut first_failure = None;
        for outcome in store.set_multi(batch).await {
            match outcome.result {
                Ok(cas) => {
                    written += 1;
                    debug!(key = %outcome.key, %cas, "document written");
                }
                Err(err) => {
                    warn!(key = %outcome.key, error = %err, "document write failed");
                    first_failure.get_or_insert((outcome.key, err));
                }
            }
        }

        if let Some((key, source)) = first_failure {
            warn!(
                written,
                total = writes.len(),
                "save aborted, written documents are left in place"
            );
            return Err(OdmError::Store {
                key: Some(key),
                source,
            });
        }
    }

    for entry in graph.entries() {
        entry.document.mark_clean();
    }
    info!(documents = written, "graph saved");
    Ok(graph)
}
