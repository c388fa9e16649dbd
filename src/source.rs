//! External interfaces: the contract application code and data sources
//! implement to plug into the evaluator.

use crate::{cell::CellHandle, error::FetchError};
use futures::future::BoxFuture;
use std::{any::TypeId, fmt::Debug};

/// An opaque value identified by a stable string used for cache keying. It
/// is the implementor's responsibility to fold every input that affects the
/// result into `identifier()`.
pub trait Request: Debug + Send + Sync + 'static {
    /// The type produced when this request is resolved successfully.
    type Output: Clone + Debug + Send + 'static;

    /// The cache key. Two requests are "the same" iff their identifiers are
    /// equal.
    fn identifier(&self) -> String;
}

/// A named carrier of a batch handler for exactly one [`Request`] type.
pub trait DataSource: Debug + Send + Sync + 'static {
    /// The request type this source knows how to resolve.
    type Request: Request;

    /// The source's name, used (together with its request type) to key the
    /// request store so distinct source instances with the same name are
    /// kept separate.
    fn name(&self) -> &str;

    /// Turns a non-empty batch of blocked fetches into scheduled tasks. Every
    /// cell reachable from `batch` must be in a terminal state by the time
    /// the task(s) resolving it have completed.
    fn fetch(&self, batch: &[BlockedFetch<Self::Request>]) -> Vec<PerformFetch>;
}

/// One unit of work a source's batch handler hands back to the evaluator.
pub enum PerformFetch {
    /// Executed inline, in the order the evaluator receives it.
    Sync(Box<dyn FnOnce() + Send>),
    /// Awaited alongside every other `Async` task from this round, across
    /// every source, in a single parallel gather.
    Async(BoxFuture<'static, ()>),
}

/// A single blocked request as handed to its source's batch handler: the
/// request itself plus a write-once handle to its result cell.
pub struct BlockedFetch<R: Request> {
    request: R,
    cell: CellHandle,
}

impl<R: Request> BlockedFetch<R> {
    pub(crate) fn new(request: R, cell: CellHandle) -> Self {
        BlockedFetch { request, cell }
    }

    /// The request this batch entry is for.
    pub fn request(&self) -> &R {
        &self.request
    }

    /// Resolves this fetch successfully. May be called at most once.
    pub fn put_success(&self, value: R::Output) {
        self.cell.put_success(value);
    }

    /// Resolves this fetch with a failure. May be called at most once.
    pub fn put_failure(&self, error: impl std::error::Error + Send + Sync + 'static) {
        self.cell.put_error(FetchError::from(crate::error::SourceError::new(error)));
    }
}

impl<R: Request> Debug for BlockedFetch<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockedFetch").field("request", &self.request).finish()
    }
}

/// Type-erased view of a [`DataSource`] kept in the request store. The store
/// groups entries by source before ever constructing one of these, so the
/// downcast inside [`ErasedSource::drain`] always matches the type it was
/// built with.
pub(crate) trait ErasedSource: Debug + Send + Sync {
    fn request_type(&self) -> TypeId;
    fn drain(&self, batch: Vec<Box<dyn std::any::Any + Send>>) -> Vec<PerformFetch>;
}

#[derive(Debug)]
pub(crate) struct SourceErased<S: DataSource>(pub(crate) std::sync::Arc<S>);

impl<S: DataSource> ErasedSource for SourceErased<S> {
    fn request_type(&self) -> TypeId {
        TypeId::of::<S::Request>()
    }

    fn drain(&self, batch: Vec<Box<dyn std::any::Any + Send>>) -> Vec<PerformFetch> {
        let typed: Vec<BlockedFetch<S::Request>> = batch
            .into_iter()
            .map(|entry| {
                *entry.downcast::<BlockedFetch<S::Request>>().unwrap_or_else(|_| {
                    unreachable!("request store groups by source type; batch is always homogeneous")
                })
            })
            .collect();
        self.0.fetch(&typed)
    }
}
