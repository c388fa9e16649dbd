#![deny(clippy::all)]

//! A data-fetch coordinator: application code describes composite data
//! requirements as pure, composable [`Fetch`] values, and [`run`] evaluates
//! them so that independent requests batch to their sources, identical
//! requests within a run are deduplicated through a cache, and a batch's
//! asynchronous work runs concurrently.
//!
//! # The algebra
//!
//! [`Fetch<T>`] is an applicative functor and a monad. [`ops::map`] and
//! [`ops::ap`] satisfy the usual functor and applicative laws; [`ops::bind`]
//! and [`ops::lift`] satisfy the monad laws. The one law worth calling out
//! specifically, because it's the entire reason this crate exists instead of
//! a plain `async fn`: [`ops::ap`] evaluates both of its branches against the
//! same environment before looking at either result, so independent
//! branches expose their blocked requests together, in one batch, rather
//! than one-at-a-time. [`ops::bind`], by contrast, cannot do this — the
//! continuation's own requests aren't known until its predecessor resolves,
//! so a `bind` chain always costs at least as many rounds as it has links.
//!
//! # Building and running a plan
//!
//! ```
//! use fetch_plan::{ops::*, source::*, config::RunConfig, run};
//! use std::sync::Arc;
//!
//! #[derive(Debug)]
//! struct GetUser(u64);
//!
//! impl Request for GetUser {
//!     type Output = String;
//!     fn identifier(&self) -> String {
//!         format!("user:{}", self.0)
//!     }
//! }
//!
//! #[derive(Debug)]
//! struct Users;
//!
//! impl DataSource for Users {
//!     type Request = GetUser;
//!     fn name(&self) -> &str {
//!         "Users"
//!     }
//!     fn fetch(&self, batch: &[BlockedFetch<GetUser>]) -> Vec<PerformFetch> {
//!         batch
//!             .iter()
//!             .map(|f| {
//!                 let id = f.request().0;
//!                 f.put_success(format!("user-{id}"));
//!                 PerformFetch::Sync(Box::new(|| {}))
//!             })
//!             .collect()
//!     }
//! }
//!
//! let users = Arc::new(Users);
//! let plan = zip2(
//!     data_fetch(users.clone(), GetUser(1)),
//!     data_fetch(users, GetUser(2)),
//! );
//! let (a, b) = run(plan, RunConfig::new()).unwrap();
//! assert_eq!((a, b), ("user-1".to_string(), "user-2".to_string()));
//! ```

mod cache;
mod cell;
pub mod config;
mod error;
mod expr;
pub mod ops;
mod plan;
mod round;
pub mod source;
mod trace;
mod store;

pub use crate::{
    config::RunConfig,
    error::{FetchError, SourceError},
    plan::Fetch,
    round::{run, run_async},
};
