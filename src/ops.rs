//! Primitive plan operations: the algebra's constructors and the
//! source-facing fetch entry points built on top of them.

use crate::{
    cell::{Cell, CellRead},
    error::FetchError,
    expr::{Expr, PlanResult},
    plan::Fetch,
    round::Environment,
    source::{BlockedFetch, DataSource, Request},
    trace,
};
use std::{collections::VecDeque, fmt::Debug, sync::Arc};

/// A boxed function value, used as the left-hand side of [`ap`] so the
/// applicative's "function in a plan" can be an arbitrary `'static` closure
/// rather than a named type.
pub type BoxedFn<U, T> = Box<dyn FnOnce(U) -> T + Send>;

/// `lift(v)`: `Done(v)` in every environment.
pub fn lift<T: 'static + Send>(value: T) -> Fetch<T> {
    Fetch::new(move |_env: &mut Environment| PlanResult::Done(value))
}

/// `fail(e)`: `Failed(e)` in every environment.
pub fn fail<T: 'static>(error: FetchError) -> Fetch<T> {
    Fetch::new(move |_env: &mut Environment| PlanResult::Failed(error))
}

/// `map(f, p)`: applies `f` to the eventual value of `p`. A still-blocked
/// `p` yields a single, flat `Map` continuation regardless of how many
/// `map` calls preceded this one (map-map fusion).
pub fn map<U: 'static, T: 'static>(p: Fetch<U>, f: impl FnOnce(U) -> T + Send + 'static) -> Fetch<T> {
    Fetch::new(move |env: &mut Environment| match p.unfetch(env) {
        PlanResult::Done(u) => PlanResult::Done(f(u)),
        PlanResult::Failed(e) => PlanResult::Failed(e),
        PlanResult::Blocked(n, cont) => PlanResult::Blocked(n, Expr::fuse_map(cont, Box::new(f))),
    })
}

/// `bind(f, p)`: runs `p`; if `Done(v)`, evaluates `f(v)` in the same round.
/// A still-blocked `p` yields a flat `Bind` continuation (bind-bind fusion)
/// — the continuation's own requests are only discovered once
/// `p` itself resolves, in a later round.
pub fn bind<U: 'static, T: 'static>(p: Fetch<U>, f: impl FnOnce(U) -> Fetch<T> + Send + 'static) -> Fetch<T> {
    Fetch::new(move |env: &mut Environment| match p.unfetch(env) {
        PlanResult::Done(u) => f(u).unfetch(env),
        PlanResult::Failed(e) => PlanResult::Failed(e),
        PlanResult::Blocked(n, cont) => PlanResult::Blocked(n, Expr::fuse_bind(cont, Box::new(f))),
    })
}

/// `ap(pf, px)`: the applicative. Both branches are evaluated against the
/// same environment in the same round — this is what lets independent
/// branches batch instead of serializing. Must never be implemented in
/// terms of `bind`.
pub fn ap<U: 'static + Send, T: 'static>(pf: Fetch<BoxedFn<U, T>>, px: Fetch<U>) -> Fetch<T> {
    Fetch::new(move |env: &mut Environment| {
        let rf = pf.unfetch(env);
        let rx = px.unfetch(env);
        combine_ap(rf, rx)
    })
}

fn combine_ap<U: 'static + Send, T: 'static>(
    rf: PlanResult<BoxedFn<U, T>>,
    rx: PlanResult<U>,
) -> PlanResult<T> {
    match (rf, rx) {
        // Function-branch failure wins when both branches fail.
        (PlanResult::Failed(ef), _) => PlanResult::Failed(ef),
        (_, PlanResult::Failed(ex)) => PlanResult::Failed(ex),
        (PlanResult::Done(f), PlanResult::Done(x)) => PlanResult::Done(f(x)),
        (PlanResult::Done(f), PlanResult::Blocked(n, cont_x)) => {
            PlanResult::Blocked(n, Expr::Apply(Expr::continuation(move |env: &mut Environment| {
                combine_ap(PlanResult::Done(f), cont_x.into_fetch().unfetch(env))
            })))
        }
        (PlanResult::Blocked(n, cont_f), PlanResult::Done(x)) => {
            PlanResult::Blocked(n, Expr::Apply(Expr::continuation(move |env: &mut Environment| {
                combine_ap(cont_f.into_fetch().unfetch(env), PlanResult::Done(x))
            })))
        }
        (PlanResult::Blocked(nf, cont_f), PlanResult::Blocked(nx, cont_x)) => {
            PlanResult::Blocked(nf + nx, Expr::Apply(Expr::continuation(move |env: &mut Environment| {
                let rf = cont_f.into_fetch().unfetch(env);
                let rx = cont_x.into_fetch().unfetch(env);
                combine_ap(rf, rx)
            })))
        }
    }
}

/// `zip2`: derived from `ap`; guarantees both arms share one batching round.
pub fn zip2<A: 'static + Send, B: 'static + Send>(a: Fetch<A>, b: Fetch<B>) -> Fetch<(A, B)> {
    let pf: Fetch<BoxedFn<B, (A, B)>> = map(a, |a: A| -> BoxedFn<B, (A, B)> { Box::new(move |b: B| (a, b)) });
    ap(pf, b)
}

/// `zip3`: derived from `zip2` + `ap`, same one-round guarantee.
pub fn zip3<A: 'static + Send, B: 'static + Send, C: 'static + Send>(a: Fetch<A>, b: Fetch<B>, c: Fetch<C>) -> Fetch<(A, B, C)> {
    map(zip2(zip2(a, b), c), |((a, b), c)| (a, b, c))
}

/// `zip4`: derived from `zip2` + `ap`, same one-round guarantee.
pub fn zip4<A: 'static + Send, B: 'static + Send, C: 'static + Send, D: 'static + Send>(
    a: Fetch<A>,
    b: Fetch<B>,
    c: Fetch<C>,
    d: Fetch<D>,
) -> Fetch<(A, B, C, D)> {
    map(zip2(zip2(a, b), zip2(c, d)), |((a, b), (c, d))| (a, b, c, d))
}

/// `sequence`: right-fold over `ap` so every element's blocked requests
/// merge into one round, in original order.
pub fn sequence<T: 'static + Send>(fetches: impl IntoIterator<Item = Fetch<T>>) -> Fetch<Vec<T>> {
    sequence_deque(fetches.into_iter().collect())
}

fn sequence_deque<T: 'static + Send>(mut items: VecDeque<Fetch<T>>) -> Fetch<Vec<T>> {
    match items.pop_front() {
        None => lift(Vec::new()),
        Some(head) => {
            let rest = sequence_deque(items);
            let pf: Fetch<BoxedFn<Vec<T>, Vec<T>>> = map(head, |value: T| -> BoxedFn<Vec<T>, Vec<T>> {
                Box::new(move |mut tail: Vec<T>| {
                    tail.insert(0, value);
                    tail
                })
            });
            ap(pf, rest)
        }
    }
}

/// `mapSeq`: maps each element to a plan, then `sequence`s the results.
pub fn map_seq<A, T: 'static + Send>(items: impl IntoIterator<Item = A>, f: impl Fn(A) -> Fetch<T>) -> Fetch<Vec<T>> {
    sequence(items.into_iter().map(f))
}

/// Reads a cell after the round that was supposed to fill it; `NotFetched`
/// here means a source neglected to resolve a cell it was handed.
fn readback<T: Clone + Debug + Send + 'static>(cell: Arc<Cell>) -> Fetch<T> {
    Fetch::new(move |_env: &mut Environment| match cell.read::<T>() {
        CellRead::Success(v) => PlanResult::Done(v),
        CellRead::Error(e) => PlanResult::Failed(e),
        CellRead::NotFetched => {
            PlanResult::Failed(FetchError::invariant("expected complete fetch after drain"))
        }
    })
}

/// `dataFetch(source, request)`: cached, deduplicated fetch.
pub fn data_fetch<S: DataSource>(
    source: Arc<S>,
    request: S::Request,
) -> Fetch<<S::Request as Request>::Output> {
    Fetch::new(move |env: &mut Environment| {
        let id = request.identifier();
        if let Some(cell) = env.cache.get(&id) {
            match cell.read::<<S::Request as Request>::Output>() {
                CellRead::Success(v) => {
                    trace::cache_hit(env.trace, &id);
                    PlanResult::Done(v)
                }
                CellRead::Error(e) => {
                    trace::cache_hit(env.trace, &id);
                    PlanResult::Failed(e)
                }
                CellRead::NotFetched => {
                    trace::duplicate_in_store(env.trace, &id);
                    PlanResult::Blocked(0, Expr::Const(readback(cell)))
                }
            }
        } else {
            trace::cache_miss(env.trace, &id);
            let cell = Cell::not_fetched();
            env.cache.put(id, cell.clone());
            env.store.add(&source, BlockedFetch::new(request, cell.clone()));
            PlanResult::Blocked(1, Expr::Const(readback(cell)))
        }
    })
}

/// `uncachedFetch(source, request)`: always issues a fresh
/// request; the cache is never consulted or written.
pub fn uncached_fetch<S: DataSource>(
    source: Arc<S>,
    request: S::Request,
) -> Fetch<<S::Request as Request>::Output> {
    Fetch::new(move |env: &mut Environment| {
        let cell = Cell::not_fetched();
        env.store.add(&source, BlockedFetch::new(request, cell.clone()));
        PlanResult::Blocked(1, Expr::Const(readback(cell)))
    })
}

/// `invalidate(r, p)`: removes `r`'s cached result before
/// evaluating `p`, so a subsequent `dataFetch` for the same request within
/// `p` re-queries its source. Reapplies the removal on every round `p`
/// blocks through, not just the first: if it only ran once, a round
/// boundary inside `p` would let that round's drain repopulate the cache
/// before the request `p` was built to re-fetch actually ran, silently
/// undoing the invalidation.
pub fn invalidate<R: Request, T: 'static>(request: &R, plan: Fetch<T>) -> Fetch<T> {
    invalidate_id(request.identifier(), plan)
}

fn invalidate_id<T: 'static>(id: String, plan: Fetch<T>) -> Fetch<T> {
    Fetch::new(move |env: &mut Environment| {
        env.cache.remove(&id);
        trace::invalidated(env.trace, &id);
        match plan.unfetch(env) {
            PlanResult::Blocked(n, cont) => {
                PlanResult::Blocked(n, Expr::Const(invalidate_id(id, cont.into_fetch())))
            }
            other => other,
        }
    })
}
