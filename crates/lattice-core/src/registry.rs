//! Streaming schema reconciliation

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::model::{ChangeEvent, ChangeType, ModuleSchema};

/// A published snapshot: the net effect of all completed batches, sorted by
/// module name. Consumers hold read-only references.
pub type SchemaSnapshot = Arc<Vec<ModuleSchema>>;

/// Folds the incremental change-event stream into a module-name keyed map and
/// publishes an immutable sorted snapshot at each batch boundary.
///
/// Everything between batch start and the `more == false` event is invisible
/// to consumers; they only ever observe whole batches. There is no
/// timeout-based flush — if the source stalls mid-batch, the last published
/// snapshot stays visible indefinitely.
pub struct SchemaRegistry {
    pending: HashMap<String, ModuleSchema>,
    tx: watch::Sender<SchemaSnapshot>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SchemaSnapshot::default());
        SchemaRegistry {
            pending: HashMap::new(),
            tx,
        }
    }

    /// Apply one change event to the working map, publishing when the event
    /// closes its batch.
    ///
    /// Added and changed are both upserts; the distinction is informational.
    /// Removing an absent module is a no-op. Within a batch, the last write
    /// for a given name wins.
    pub fn apply(&mut self, event: ChangeEvent) {
        if event.module_name.is_empty() {
            warn!("change event without a module name; ignoring");
        } else {
            match event.change_type {
                ChangeType::Added | ChangeType::Changed => match event.schema {
                    Some(schema) => {
                        self.pending.insert(event.module_name, schema);
                    }
                    None => {
                        warn!(
                            module = %event.module_name,
                            "add/change event without a schema; ignoring"
                        );
                    }
                },
                ChangeType::Removed => {
                    self.pending.remove(&event.module_name);
                }
            }
        }

        // Batch boundary detection is purely the `more` flag on the current
        // event, even when the event itself was malformed.
        if !event.more {
            self.publish();
        }
    }

    fn publish(&self) {
        let mut modules: Vec<ModuleSchema> = self.pending.values().cloned().collect();
        modules.sort_by(|a, b| a.name.cmp(&b.name));
        debug!(modules = modules.len(), "publishing schema snapshot");
        self.tx.send_replace(Arc::new(modules));
    }

    /// The most recently published snapshot.
    pub fn snapshot(&self) -> SchemaSnapshot {
        self.tx.borrow().clone()
    }

    /// Subscribe to snapshot publications. The receiver immediately holds the
    /// current snapshot and is notified on every subsequent publish.
    pub fn subscribe(&self) -> watch::Receiver<SchemaSnapshot> {
        self.tx.subscribe()
    }

    /// Discard buffered-but-unpublished state. Called when a stream session
    /// ends so a later session accumulates into a fresh working map; the
    /// published snapshot stays visible until that session's first full batch.
    pub fn reset_pending(&mut self) {
        if !self.pending.is_empty() {
            debug!(
                discarded = self.pending.len(),
                "discarding unpublished working map"
            );
        }
        self.pending.clear();
    }

    /// Number of modules in the working map (published or not).
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}
