//! `Fetch<T>`: a suspended computation that, given an [`Environment`],
//! produces a [`PlanResult`].

use crate::{expr::PlanResult, round::Environment};

/// A value representing work that may need one or more rounds of batching
/// before it resolves to a `T`. Plans are built with the combinators in
/// [`crate::ops`] and consumed exactly once, by [`crate::round::run`] or by
/// whichever combinator is composing them.
pub struct Fetch<T: 'static> {
    unfetch: Box<dyn FnOnce(&mut Environment) -> PlanResult<T> + Send>,
}

impl<T: 'static> Fetch<T> {
    pub(crate) fn new(f: impl FnOnce(&mut Environment) -> PlanResult<T> + Send + 'static) -> Self {
        Fetch { unfetch: Box::new(f) }
    }

    pub(crate) fn unfetch(self, env: &mut Environment) -> PlanResult<T> {
        (self.unfetch)(env)
    }
}
