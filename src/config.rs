//! Run configuration: the tracing toggle and the optional round counter
//! passed into `run`/`run_async`.

use std::sync::{atomic::AtomicU64, Arc};

/// Configures a single `run`/`run_async` call. Builder-style, growing its
/// configuration surface through setters rather than a constructor with a
/// long parameter list.
#[derive(Debug, Clone, Default)]
pub struct RunConfig {
    pub(crate) trace: bool,
    pub(crate) round_count: Option<Arc<AtomicU64>>,
}

impl RunConfig {
    /// A config with tracing off and no round counter attached.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables per-round tracing events: one event per cache hit, cache
    /// miss, duplicate-in-store, invalidation, round start, and completion.
    pub fn trace(mut self, enabled: bool) -> Self {
        self.trace = enabled;
        self
    }

    /// Attaches a counter the evaluator updates with the number of rounds
    /// the run took. Read it after `run`/`run_async` returns; it is not
    /// meaningful to poll mid-run from another thread.
    pub fn count_rounds(mut self, counter: Arc<AtomicU64>) -> Self {
        self.round_count = Some(counter);
        self
    }
}
