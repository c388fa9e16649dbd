//! Thin wrappers around `tracing` events for the evaluator's observability
//! contract. Kept as free functions, gated on the environment's `trace` flag
//! at the call site, so the wording lives in one place.

pub(crate) fn cache_hit(enabled: bool, id: &str) {
    if enabled {
        tracing::trace!(id, "cache hit");
    }
}

pub(crate) fn cache_miss(enabled: bool, id: &str) {
    if enabled {
        tracing::trace!(id, "cache miss");
    }
}

pub(crate) fn duplicate_in_store(enabled: bool, id: &str) {
    if enabled {
        tracing::trace!(id, "duplicate request already queued this round");
    }
}

pub(crate) fn invalidated(enabled: bool, id: &str) {
    if enabled {
        tracing::trace!(id, "invalidated");
    }
}

pub(crate) fn round_start(enabled: bool, round: u64, sources: usize, requests: usize) {
    if enabled {
        tracing::debug!(round, sources, requests, "round start");
    }
}

pub(crate) fn run_complete(enabled: bool, rounds: u64) {
    if enabled {
        tracing::debug!(rounds, "run complete");
    }
}
