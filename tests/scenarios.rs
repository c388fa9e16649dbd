//! End-to-end batching/caching scenarios, run against the public API only.

use fetch_plan::{
    ops::*,
    run_async,
    source::{BlockedFetch, DataSource, PerformFetch, Request},
    RunConfig,
};
use futures::executor::block_on;
use std::{
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
};

#[derive(Debug)]
struct GetUser(u64);

impl Request for GetUser {
    type Output = String;
    fn identifier(&self) -> String {
        format!("user:{}", self.0)
    }
}

#[derive(Debug, Default)]
struct Users {
    calls: Mutex<Vec<Vec<u64>>>,
}

impl DataSource for Users {
    type Request = GetUser;
    fn name(&self) -> &str {
        "Users"
    }
    fn fetch(&self, batch: &[BlockedFetch<GetUser>]) -> Vec<PerformFetch> {
        let ids: Vec<u64> = batch.iter().map(|f| f.request().0).collect();
        self.calls.lock().unwrap().push(ids);
        batch
            .iter()
            .map(|f| {
                let id = f.request().0;
                f.put_success(format!("user-{id}"));
                PerformFetch::Sync(Box::new(|| {}))
            })
            .collect()
    }
}

#[derive(Debug)]
struct GetPost(u64);

impl Request for GetPost {
    type Output = String;
    fn identifier(&self) -> String {
        format!("post:{}", self.0)
    }
}

#[derive(Debug, Default)]
struct Posts {
    calls: Mutex<Vec<Vec<u64>>>,
}

impl DataSource for Posts {
    type Request = GetPost;
    fn name(&self) -> &str {
        "Posts"
    }
    fn fetch(&self, batch: &[BlockedFetch<GetPost>]) -> Vec<PerformFetch> {
        let ids: Vec<u64> = batch.iter().map(|f| f.request().0).collect();
        self.calls.lock().unwrap().push(ids);
        batch
            .iter()
            .map(|f| {
                let id = f.request().0;
                f.put_success(format!("post-{id}"));
                PerformFetch::Sync(Box::new(|| {}))
            })
            .collect()
    }
}

/// A user's post ids, keyed by user id — distinct from [`GetPost`] so
/// scenario 2's `bind` genuinely crosses a source boundary.
#[derive(Debug)]
struct GetPostIdsForUser(u64);

impl Request for GetPostIdsForUser {
    type Output = Vec<u64>;
    fn identifier(&self) -> String {
        format!("posts-by-user:{}", self.0)
    }
}

#[derive(Debug, Default)]
struct PostsByUser {
    calls: Mutex<Vec<Vec<u64>>>,
}

impl DataSource for PostsByUser {
    type Request = GetPostIdsForUser;
    fn name(&self) -> &str {
        "PostsByUser"
    }
    fn fetch(&self, batch: &[BlockedFetch<GetPostIdsForUser>]) -> Vec<PerformFetch> {
        let ids: Vec<u64> = batch.iter().map(|f| f.request().0).collect();
        self.calls.lock().unwrap().push(ids);
        batch
            .iter()
            .map(|f| {
                let user_id = f.request().0;
                f.put_success(vec![user_id * 100 + 1, user_id * 100 + 2]);
                PerformFetch::Sync(Box::new(|| {}))
            })
            .collect()
    }
}

#[derive(Debug)]
struct Boom(String);

impl fmt::Display for Boom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for Boom {}

#[derive(Debug)]
struct FailingRequest(String);

impl Request for FailingRequest {
    type Output = ();
    fn identifier(&self) -> String {
        format!("failing:{}", self.0)
    }
}

#[derive(Debug, Default)]
struct AlwaysFails {
    calls: Mutex<u64>,
}

impl DataSource for AlwaysFails {
    type Request = FailingRequest;
    fn name(&self) -> &str {
        "AlwaysFails"
    }
    fn fetch(&self, batch: &[BlockedFetch<FailingRequest>]) -> Vec<PerformFetch> {
        *self.calls.lock().unwrap() += batch.len() as u64;
        batch
            .iter()
            .map(|f| {
                let message = f.request().0.clone();
                f.put_failure(Boom(message));
                PerformFetch::Sync(Box::new(|| {}))
            })
            .collect()
    }
}

/// `zip3(getUser 1, getUser 2, getPost 1)` across two sources resolves in
/// one round; each source sees exactly one batch with both its ids.
#[test]
fn zip3_across_two_sources_batches_in_one_round() {
    let users = Arc::new(Users::default());
    let posts = Arc::new(Posts::default());
    let rounds = Arc::new(AtomicU64::new(0));

    let plan = zip3(
        data_fetch(users.clone(), GetUser(1)),
        data_fetch(users.clone(), GetUser(2)),
        data_fetch(posts.clone(), GetPost(1)),
    );
    let (u1, u2, p1) =
        block_on(run_async(plan, RunConfig::new().count_rounds(rounds.clone()))).unwrap();

    assert_eq!((u1, u2, p1), ("user-1".to_string(), "user-2".to_string(), "post-1".to_string()));
    assert_eq!(rounds.load(Ordering::Relaxed), 1);

    let user_calls = users.calls.lock().unwrap();
    assert_eq!(user_calls.len(), 1);
    let mut ids = user_calls[0].clone();
    ids.sort_unstable();
    assert_eq!(ids, vec![1, 2]);

    let post_calls = posts.calls.lock().unwrap();
    assert_eq!(post_calls.len(), 1);
    assert_eq!(post_calls[0], vec![1]);
}

/// `bind(getUser 1, |u| getPostIdsForUser u.id)` cannot batch across the
/// bind boundary: each source gets its own round trip, one after the other,
/// rather than sharing one batch the way `zip`'s branches do.
#[test]
fn bind_across_sources_does_not_batch() {
    let users = Arc::new(Users::default());
    let posts_by_user = Arc::new(PostsByUser::default());
    let rounds = Arc::new(AtomicU64::new(0));

    let plan = bind(data_fetch(users.clone(), GetUser(1)), {
        let posts_by_user = posts_by_user.clone();
        move |_user| data_fetch(posts_by_user, GetPostIdsForUser(1))
    });

    let result = block_on(run_async(plan, RunConfig::new().count_rounds(rounds.clone()))).unwrap();
    assert_eq!(result, vec![101, 102]);
    assert_eq!(rounds.load(Ordering::Relaxed), 2, "one round trip per source");
    assert_eq!(users.calls.lock().unwrap().len(), 1);
    assert_eq!(posts_by_user.calls.lock().unwrap().len(), 1);
}

/// `zip2(getUser 1, getUser 1)` fetches the duplicate once and resolves
/// both branches to the same value from the one cell.
#[test]
fn duplicate_requests_in_one_run_are_fetched_once() {
    let users = Arc::new(Users::default());
    let rounds = Arc::new(AtomicU64::new(0));

    let plan = zip2(data_fetch(users.clone(), GetUser(1)), data_fetch(users.clone(), GetUser(1)));
    let (a, b) = block_on(run_async(plan, RunConfig::new().count_rounds(rounds.clone()))).unwrap();

    assert_eq!((a.as_str(), b.as_str()), ("user-1", "user-1"));
    assert_eq!(rounds.load(Ordering::Relaxed), 1);

    let calls = users.calls.lock().unwrap();
    let total: usize = calls.iter().map(|c| c.len()).sum();
    assert_eq!(total, 1, "GetUser(1) must reach the source exactly once");
}

/// `zip2(getUser 1, failingFetch e)` still issues the `getUser` request —
/// both branches batch together — but the run as a whole fails with `e`.
#[test]
fn a_failing_branch_fails_the_whole_zip() {
    let users = Arc::new(Users::default());
    let fails = Arc::new(AlwaysFails::default());

    let plan = zip2(
        data_fetch(users.clone(), GetUser(1)),
        data_fetch(fails.clone(), FailingRequest("boom".to_string())),
    );
    let result = block_on(run_async(plan, RunConfig::new()));

    assert!(result.is_err());
    assert_eq!(*fails.calls.lock().unwrap(), 1);
    assert_eq!(users.calls.lock().unwrap().len(), 1, "the healthy branch still reaches its source");
}

/// `sequence([getUser 1, getUser 2, getUser 3])` batches every element into
/// one round and preserves input order in the result.
#[test]
fn sequence_batches_and_preserves_order() {
    let users = Arc::new(Users::default());
    let rounds = Arc::new(AtomicU64::new(0));

    let plan = sequence(vec![
        data_fetch(users.clone(), GetUser(1)),
        data_fetch(users.clone(), GetUser(2)),
        data_fetch(users.clone(), GetUser(3)),
    ]);
    let result = block_on(run_async(plan, RunConfig::new().count_rounds(rounds.clone()))).unwrap();

    assert_eq!(result, vec!["user-1", "user-2", "user-3"]);
    assert_eq!(rounds.load(Ordering::Relaxed), 1);

    let calls = users.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    let mut ids = calls[0].clone();
    ids.sort_unstable();
    assert_eq!(ids, vec![1, 2, 3]);
}

/// `bind(getUser 1, |_| invalidate(r, getUser 1))` forces a second round
/// trip to the source for the same id: the bind's continuation invalidates
/// the cache entry the first fetch just installed before refetching it.
#[test]
fn invalidate_then_refetch_hits_the_source_twice() {
    let users = Arc::new(Users::default());
    let rounds = Arc::new(AtomicU64::new(0));

    let plan = bind(data_fetch(users.clone(), GetUser(1)), {
        let users = users.clone();
        move |first| {
            assert_eq!(first, "user-1");
            invalidate(&GetUser(1), data_fetch(users, GetUser(1)))
        }
    });
    let result = block_on(run_async(plan, RunConfig::new().count_rounds(rounds.clone()))).unwrap();

    assert_eq!(result, "user-1");
    assert_eq!(rounds.load(Ordering::Relaxed), 2, "two drains, each fetching Users[1]");

    let calls = users.calls.lock().unwrap();
    assert_eq!(calls.len(), 2, "invalidate must force the second getUser to reach the source again");
    assert_eq!(calls[0], vec![1]);
    assert_eq!(calls[1], vec![1]);
}

/// `bind(invalidate(r, getUser 1), |_| getUser 1)` — here `invalidate`
/// wraps the *first*, still-blocked fetch rather than an already-cached
/// one. The cache has nothing to remove yet, so the removal only pays off
/// once the bind's continuation runs a round later: `invalidate` must
/// reapply itself right before that round's drain writes `Users[1]` into
/// the cache, or the second `getUser 1` would find it already cached and
/// never reach the source a second time.
#[test]
fn invalidate_wrapping_the_still_blocked_fetch_forces_a_second_round() {
    let users = Arc::new(Users::default());
    let rounds = Arc::new(AtomicU64::new(0));

    let plan = bind(invalidate(&GetUser(1), data_fetch(users.clone(), GetUser(1))), {
        let users = users.clone();
        move |first| {
            assert_eq!(first, "user-1");
            data_fetch(users, GetUser(1))
        }
    });
    let result = block_on(run_async(plan, RunConfig::new().count_rounds(rounds.clone()))).unwrap();

    assert_eq!(result, "user-1");
    assert_eq!(rounds.load(Ordering::Relaxed), 2, "two drains, each fetching Users[1]");

    let calls = users.calls.lock().unwrap();
    assert_eq!(calls.len(), 2, "both getUser(1) calls must reach the source");
    assert_eq!(calls[0], vec![1]);
    assert_eq!(calls[1], vec![1]);
}
