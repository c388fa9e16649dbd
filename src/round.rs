//! The round evaluator: repeatedly evaluate the plan, drain the request
//! store whenever it blocks, and loop with the resulting continuation until
//! it resolves.

use crate::{
    cache::Cache, config::RunConfig, error::FetchError, expr::PlanResult, plan::Fetch,
    store::RequestStore, trace,
};
use std::sync::atomic::Ordering;

/// The state threaded through one run: the cache lives for the whole run,
/// the store is rebuilt every round, and `trace` is fixed for the run.
pub(crate) struct Environment {
    pub(crate) cache: Cache,
    pub(crate) store: RequestStore,
    pub(crate) trace: bool,
}

impl Environment {
    fn new(trace: bool) -> Self {
        Environment { cache: Cache::new(), store: RequestStore::new(), trace }
    }
}

/// Evaluates `plan` to completion, draining the request store between
/// rounds, and returns its value or the failure that ended the run.
///
/// This is the async entry point; [`run`] is a blocking convenience wrapper
/// around it for callers not already inside an executor.
pub async fn run_async<T: 'static>(plan: Fetch<T>, config: RunConfig) -> Result<T, FetchError> {
    let mut env = Environment::new(config.trace);
    let mut current = plan;
    // Counts drains: a round is one evaluation of the plan followed by one
    // drain of the request store, so the final evaluation that resolves to
    // `Done`/`Failed` doesn't open a new round, it concludes the last one.
    let mut round: u64 = 0;

    loop {
        match current.unfetch(&mut env) {
            PlanResult::Done(value) => {
                trace::run_complete(env.trace, round);
                return Ok(value);
            }
            PlanResult::Failed(e) => return Err(e),
            PlanResult::Blocked(_pending, cont) => {
                round += 1;
                if let Some(counter) = &config.round_count {
                    counter.store(round, Ordering::Relaxed);
                }
                let span = tracing::debug_span!("round", n = round);
                let _enter = span.enter();
                trace::round_start(env.trace, round, env.store.source_count(), env.store.request_count());
                env.store.drain().await;
                current = cont.into_fetch();
            }
        }
    }
}

/// Blocking convenience over [`run_async`], for callers not already inside
/// an async executor. Uses `futures::executor::block_on`.
pub fn run<T: 'static>(plan: Fetch<T>, config: RunConfig) -> Result<T, FetchError> {
    futures::executor::block_on(run_async(plan, config))
}
