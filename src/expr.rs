//! The plan expression tree: what a [`crate::plan::Fetch`] turns into once
//! it blocks, so the evaluator has something to re-run next round.
//!
//! Rust has no existential types to spell "some `U`, plus an `Expr<U>`"
//! directly as a field of `Expr<T>`. `Map` and `Bind` resolve this by
//! keeping the sub-expression and the function as two genuinely separate
//! fields — `sub: Box<dyn ErasedFetch>` erases `U` behind a trait object,
//! and the function closes over `U` only at its call boundary, downcasting
//! a type-erased [`AnyValue`] back to the concrete type it was boxed from.
//!
//! This is what makes fusion a real structural transform rather than an
//! accident of closures: `Expr::fuse_map`/`Expr::fuse_bind` pattern-match
//! the sub-expression they're given, and when it is already a `Map`/`Bind`
//! node, fold the new function into its existing one and keep its original
//! `sub` untouched — composing `.map()` (or `.bind()`) any number of times
//! over a still-blocked plan always leaves exactly one `Map` (or `Bind`)
//! node wrapping the one sub-expression that is genuinely still pending.

use crate::{error::FetchError, plan::Fetch, round::Environment};
use std::any::Any;

/// What one evaluation of a [`Fetch<T>`] produced.
pub(crate) enum PlanResult<T: 'static> {
    /// The plan is complete.
    Done(T),
    /// The plan needs at least one more source drain. `pending` is the
    /// number of *newly* blocked requests this evaluation discovered — it is
    /// informational (used for tracing/round-size reporting) only; the
    /// authoritative work for the round lives in the evaluator's
    /// [`crate::store::RequestStore`].
    Blocked(usize, Expr<T>),
    /// The plan failed.
    Failed(FetchError),
}

pub(crate) type ContinuationFn<T> = Box<dyn FnOnce(&mut Environment) -> PlanResult<T> + Send>;

/// A value produced by a sub-expression, boxed so `Map`/`Bind` can hold one
/// without naming its concrete type. Downcast back to the type it was built
/// from at the one place that knows what that type was.
pub(crate) type AnyValue = Box<dyn Any>;

/// What evaluating an [`ErasedFetch`] produced, mirroring [`PlanResult`]
/// with the value type erased to [`AnyValue`].
enum ErasedResult {
    Done(AnyValue),
    Blocked(usize, Box<dyn ErasedFetch>),
    Failed(FetchError),
}

/// A [`Fetch<U>`] for some `U` this module doesn't need to name, wrapped so
/// `Map`/`Bind` nodes can hold "the thing to resolve next" regardless of
/// what it eventually produces.
pub(crate) trait ErasedFetch: Send {
    fn eval_erased(self: Box<Self>, env: &mut Environment) -> ErasedResult;
}

struct ErasedFetchImpl<U: 'static>(Fetch<U>);

impl<U: 'static> ErasedFetch for ErasedFetchImpl<U> {
    fn eval_erased(self: Box<Self>, env: &mut Environment) -> ErasedResult {
        match self.0.unfetch(env) {
            PlanResult::Done(v) => ErasedResult::Done(Box::new(v)),
            PlanResult::Failed(e) => ErasedResult::Failed(e),
            PlanResult::Blocked(n, cont) => {
                ErasedResult::Blocked(n, Box::new(ErasedFetchImpl(cont.into_fetch())))
            }
        }
    }
}

fn erase<U: 'static>(fetch: Fetch<U>) -> Box<dyn ErasedFetch> {
    Box::new(ErasedFetchImpl(fetch))
}

fn downcast<U: 'static>(value: AnyValue) -> U {
    *value.downcast::<U>().unwrap_or_else(|_| {
        unreachable!("a Map/Bind node is only ever fed the value its own sub-expression produced")
    })
}

/// A reified continuation, kept around only long enough to be re-optimized
/// and re-run on the next round.
pub(crate) enum Expr<T: 'static> {
    /// Wraps an already-complete plan unchanged.
    Const(Fetch<T>),
    /// The continuation of one or more fused `map` calls: resolve `sub`,
    /// then apply the composed function to its result.
    Map(Box<dyn ErasedFetch>, Box<dyn FnOnce(AnyValue) -> T + Send>),
    /// The continuation of an `ap`. Not fused, by design — each side keeps
    /// re-evaluating independently so the two branches keep batching
    /// together every round.
    Apply(ContinuationFn<T>),
    /// The continuation of one or more fused `bind` calls: resolve `sub`,
    /// then run the composed continuation, which may itself block further.
    Bind(Box<dyn ErasedFetch>, Box<dyn FnOnce(AnyValue, &mut Environment) -> PlanResult<T> + Send>),
}

impl<T: 'static> Expr<T> {
    pub(crate) fn continuation(f: impl FnOnce(&mut Environment) -> PlanResult<T> + Send + 'static) -> ContinuationFn<T> {
        Box::new(f)
    }

    /// `toFetch`: turns a continuation back into something `run` can
    /// evaluate again.
    pub(crate) fn into_fetch(self) -> Fetch<T> {
        match self {
            Expr::Const(fetch) => fetch,
            Expr::Apply(cont) => Fetch::new(cont),
            Expr::Map(sub, f) => Fetch::new(move |env: &mut Environment| match sub.eval_erased(env) {
                ErasedResult::Done(v) => PlanResult::Done(f(v)),
                ErasedResult::Failed(e) => PlanResult::Failed(e),
                ErasedResult::Blocked(n, sub) => PlanResult::Blocked(n, Expr::Map(sub, f)),
            }),
            Expr::Bind(sub, k) => Fetch::new(move |env: &mut Environment| match sub.eval_erased(env) {
                ErasedResult::Done(v) => k(v, env),
                ErasedResult::Failed(e) => PlanResult::Failed(e),
                ErasedResult::Blocked(n, sub) => PlanResult::Blocked(n, Expr::Bind(sub, k)),
            }),
        }
    }

    /// Builds the `Map` node for a still-blocked `p`. If `cont` is itself a
    /// `Map` node, folds `f` onto its existing function and keeps its
    /// original sub-expression — map-map fusion, so chaining `.map()` any
    /// number of times over one blocked plan never nests one `Map` inside
    /// another.
    pub(crate) fn fuse_map<U: 'static>(cont: Expr<U>, f: Box<dyn FnOnce(U) -> T + Send>) -> Expr<T> {
        match cont {
            Expr::Map(sub, f0) => Expr::Map(sub, Box::new(move |v: AnyValue| f(f0(v)))),
            other => Expr::Map(erase(other.into_fetch()), Box::new(move |v: AnyValue| f(downcast(v)))),
        }
    }

    /// Builds the `Bind` node for a still-blocked `p`. If `cont` is itself a
    /// `Bind` node, folds `f` onto its existing continuation instead of
    /// wrapping another `Bind` around it — bind-bind fusion, the Rust-level
    /// expression of monad associativity: `bind(bind(x, f1), f2)` collapses
    /// to one node over `x` whose continuation runs `f1` then `f2`.
    pub(crate) fn fuse_bind<U: 'static>(cont: Expr<U>, f: Box<dyn FnOnce(U) -> Fetch<T> + Send>) -> Expr<T> {
        match cont {
            Expr::Bind(sub, k0) => Expr::Bind(
                sub,
                Box::new(move |v: AnyValue, env: &mut Environment| match k0(v, env) {
                    PlanResult::Done(u) => f(u).unfetch(env),
                    PlanResult::Failed(e) => PlanResult::Failed(e),
                    PlanResult::Blocked(n, cont) => PlanResult::Blocked(n, Expr::fuse_bind(cont, f)),
                }),
            ),
            other => Expr::Bind(
                erase(other.into_fetch()),
                Box::new(move |v: AnyValue, env: &mut Environment| f(downcast(v)).unfetch(env)),
            ),
        }
    }
}
