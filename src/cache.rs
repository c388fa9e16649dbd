//! The run-scoped cache mapping request identifiers to result cells.
//!
//! Mirrors the shape of `dyn-cache`'s `sync::SendCache`: a
//! `parking_lot::Mutex` around a `hashbrown::HashMap`, shared behind an
//! `Arc` so cells can be handed off to source handlers that may complete on
//! worker threads while the evaluator thread moves on to the next source's
//! batch.

use crate::cell::CellHandle;
use hashbrown::HashMap;
use parking_lot::Mutex;

/// `identifier -> result cell`, live for one `run`.
#[derive(Debug, Default)]
pub(crate) struct Cache {
    entries: Mutex<HashMap<String, CellHandle>>,
}

impl Cache {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn get(&self, id: &str) -> Option<CellHandle> {
        self.entries.lock().get(id).cloned()
    }

    /// Inserts or overwrites the cell for `id`. Used both for first-time
    /// insertion and by `invalidate`'s implicit re-insertion path.
    pub(crate) fn put(&self, id: String, cell: CellHandle) {
        self.entries.lock().insert(id, cell);
    }

    /// Removes any cached result for `id`, used by `invalidate`.
    pub(crate) fn remove(&self, id: &str) {
        self.entries.lock().remove(id);
    }
}
