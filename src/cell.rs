//! The result cell: single-assignment storage for one in-flight request.
//!
//! Cells are created `NotFetched`, mutated exactly once by the source that
//! owns the request (to `Success` or `Error`), and afterwards only ever read.
//! Storage is type-erased so the cache can hold cells for many different
//! request types at once; callers recover the concrete type through
//! [`Cell::read`], which is the only place an unsound downcast could hide —
//! it's sound here because a given identifier is only ever written by the
//! single source that created its cell.

use crate::error::FetchError;
use downcast_rs::{impl_downcast, Downcast};
use parking_lot::Mutex;
use std::{fmt::Debug, sync::Arc};

trait AnyValue: Downcast + Debug + Send {}
impl_downcast!(AnyValue);
impl<T: Debug + Send + 'static> AnyValue for T {}

#[derive(Debug)]
enum Status {
    NotFetched,
    Success(Box<dyn AnyValue>),
    Error(FetchError),
}

/// A shared handle to a result cell, as stored in the [`crate::cache::Cache`]
/// and handed to a source as part of a [`crate::source::BlockedFetch`].
pub(crate) type CellHandle = Arc<Cell>;

/// Storage for one request's eventual result.
#[derive(Debug)]
pub(crate) struct Cell {
    status: Mutex<Status>,
}

/// The outcome of reading a cell at a specific static type.
pub(crate) enum CellRead<T> {
    NotFetched,
    Success(T),
    Error(FetchError),
}

impl Cell {
    pub(crate) fn not_fetched() -> CellHandle {
        Arc::new(Cell { status: Mutex::new(Status::NotFetched) })
    }

    /// Transitions the cell to `Success`. Contract: called at most once, and
    /// only by the source that owns the request this cell belongs to.
    pub(crate) fn put_success<T: Debug + Send + 'static>(&self, value: T) {
        let mut status = self.status.lock();
        debug_assert!(
            matches!(&*status, Status::NotFetched),
            "cell written after it was already resolved"
        );
        *status = Status::Success(Box::new(value));
    }

    /// Transitions the cell to `Error`. Same single-writer contract as
    /// [`Cell::put_success`].
    pub(crate) fn put_error(&self, error: FetchError) {
        let mut status = self.status.lock();
        debug_assert!(
            matches!(&*status, Status::NotFetched),
            "cell written after it was already resolved"
        );
        *status = Status::Error(error);
    }

    pub(crate) fn is_terminal(&self) -> bool {
        !matches!(&*self.status.lock(), Status::NotFetched)
    }

    /// Reads the cell at type `T`, cloning the stored value or error out so
    /// the cell can still answer later reads (a request fetched once may be
    /// observed from several independent plan branches).
    pub(crate) fn read<T: Clone + Debug + Send + 'static>(&self) -> CellRead<T> {
        match &*self.status.lock() {
            Status::NotFetched => CellRead::NotFetched,
            Status::Error(e) => CellRead::Error(e.clone()),
            Status::Success(v) => match v.downcast_ref::<T>() {
                Some(v) => CellRead::Success(v.clone()),
                None => CellRead::Error(FetchError::invariant(format!(
                    "cell type mismatch: expected {}, stored {:?}",
                    std::any::type_name::<T>(),
                    v
                ))),
            },
        }
    }
}
