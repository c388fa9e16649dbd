//! Confirms a run with tracing enabled doesn't require a subscriber to be
//! installed, and produces no different result than a traceless run.

use fetch_plan::{
    ops::{data_fetch, zip2},
    run,
    source::{BlockedFetch, DataSource, PerformFetch, Request},
    RunConfig,
};
use std::sync::Arc;

#[derive(Debug)]
struct GetThing(u32);

impl Request for GetThing {
    type Output = u32;
    fn identifier(&self) -> String {
        format!("thing:{}", self.0)
    }
}

#[derive(Debug)]
struct Things;

impl DataSource for Things {
    type Request = GetThing;
    fn name(&self) -> &str {
        "Things"
    }
    fn fetch(&self, batch: &[BlockedFetch<GetThing>]) -> Vec<PerformFetch> {
        batch
            .iter()
            .map(|f| {
                f.put_success(f.request().0);
                PerformFetch::Sync(Box::new(|| {}))
            })
            .collect()
    }
}

#[test]
fn tracing_enabled_run_matches_a_traceless_run() {
    let subscriber = tracing_subscriber::fmt().with_test_writer().finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let things = Arc::new(Things);
    let plan = zip2(data_fetch(things.clone(), GetThing(1)), data_fetch(things, GetThing(2)));
    let result = run(plan, RunConfig::new().trace(true)).unwrap();
    assert_eq!(result, (1, 2));
}
