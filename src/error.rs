//! Error kinds surfaced by plan evaluation.

use std::{
    fmt::{self, Debug, Display, Formatter},
    sync::Arc,
};

/// An error produced by a data source, wrapped so it can be cloned out of a
/// result cell by every reader that shares it.
#[derive(Clone)]
pub struct SourceError(Arc<dyn std::error::Error + Send + Sync>);

impl SourceError {
    /// Wraps any error a source's batch handler produced.
    pub fn new(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        SourceError(Arc::new(error))
    }
}

impl Debug for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(&self.0, f)
    }
}

impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl std::error::Error for SourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

/// The error type threaded through a run: either a source's own failure,
/// re-raised with its original cause intact, or an evaluator-detected
/// invariant violation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    /// A source's batch handler stored `Error` in a cell.
    #[error("{source}")]
    Source {
        #[from]
        source: SourceError,
    },

    /// The evaluator observed state that should be unreachable if every
    /// source honored its contract (e.g. a cell still `NotFetched` after its
    /// round was drained).
    #[error("fetch invariant violation: {0}")]
    Invariant(String),
}

impl FetchError {
    pub(crate) fn invariant(message: impl Into<String>) -> Self {
        FetchError::Invariant(message.into())
    }
}
