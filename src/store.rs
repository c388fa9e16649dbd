//! The request store: blocked requests grouped by source, drained once per
//! round.

use crate::source::{BlockedFetch, DataSource, ErasedSource, PerformFetch, SourceErased};
use hashbrown::HashMap;
use std::{any::TypeId, fmt::Debug, sync::Arc};

/// Groups distinct source *instances* with the same name separately —
/// `TypeId::of::<S::Request>()` stands in for "source identity" since two
/// source instances of the same concrete type
/// sharing a bucket is exactly the batching behavior we want, and a
/// `TypeId` is cheaper and exact compared to hashing a printed type name.
#[derive(PartialEq, Eq, Hash, Clone)]
struct SourceKey {
    name: String,
    request_type: TypeId,
}

struct SourceGroup {
    source: Arc<dyn ErasedSource>,
    batch: Vec<Box<dyn std::any::Any + Send>>,
}

/// Blocked requests not yet issued, grouped by source. Rebuilt empty at the
/// start of each round.
#[derive(Default)]
pub(crate) struct RequestStore {
    groups: HashMap<SourceKey, SourceGroup>,
}

impl RequestStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn source_count(&self) -> usize {
        self.groups.len()
    }

    pub(crate) fn request_count(&self) -> usize {
        self.groups.values().map(|g| g.batch.len()).sum()
    }

    /// Queues one blocked fetch under `source`, creating the group on first
    /// use. Batch order is unspecified; sources must not rely on it.
    pub(crate) fn add<S: DataSource>(&mut self, source: &Arc<S>, blocked: BlockedFetch<S::Request>) {
        let key = SourceKey { name: source.name().to_owned(), request_type: TypeId::of::<S::Request>() };
        let group = self.groups.entry(key).or_insert_with(|| SourceGroup {
            source: Arc::new(SourceErased(Arc::clone(source))),
            batch: Vec::new(),
        });
        group.batch.push(Box::new(blocked));
    }

    /// Invokes every group's batch handler, running sync tasks inline and
    /// gathering async tasks from every source into one parallel wait. After
    /// this returns, every cell reachable from this round's groups is
    /// terminal.
    pub(crate) async fn drain(&mut self) {
        let groups = std::mem::take(&mut self.groups);
        let mut sync_tasks = Vec::new();
        let mut async_tasks = Vec::new();
        for group in groups.into_values() {
            for task in group.source.drain(group.batch) {
                match task {
                    PerformFetch::Sync(thunk) => sync_tasks.push(thunk),
                    PerformFetch::Async(fut) => async_tasks.push(fut),
                }
            }
        }
        for thunk in sync_tasks {
            thunk();
        }
        futures::future::join_all(async_tasks).await;
    }
}

impl Debug for RequestStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestStore")
            .field("sources", &self.groups.len())
            .field("requests", &self.request_count())
            .finish()
    }
}
