use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use super::Container;
use crate::error::Error;
use crate::future::{Future, FutureWatcher};
use crate::job::Job;

struct FanOutState<Item, OutOther> {
    queue: VecDeque<Item>,
    in_flight: usize,
    remaining: usize,
    collected: Vec<Item>,
    first_error: Option<Error>,
    /// Strong handles on every outstanding watcher; cleared once the last
    /// one fires. Each watcher's own callback also holds a clone of this
    /// `Arc`, which makes the clear() the only thing that breaks the cycle —
    /// acceptable since it always runs exactly once per `each` call.
    watchers: Vec<FutureWatcher<OutOther>>,
}

impl<Out, In> Job<Out, In>
where
    Out: Container,
    In: Clone + Send + Sync + 'static,
{
    /// Runs `f` once per element of the finished container. Every sub-future
    /// is created and started eagerly, with no bound on how many run
    /// concurrently. An empty container finishes immediately with the empty
    /// value. Results are concatenated in *completion* order, which is a
    /// multiset-equivalent aggregation of the per-element outputs, not an
    /// order-preserving one — callers that need the original order should
    /// write the element's index into the aggregate themselves.
    pub fn each<OutOther>(self, f: impl Fn(Out::Item, Future<OutOther>) + Send + Sync + 'static) -> Job<Out, In>
    where
        OutOther: Container<Item = Out::Item>,
    {
        self.each_with_concurrency(usize::MAX, f)
    }

    /// Bounded-fan-out variant of [`Job::each`]: at most `limit` sub-futures
    /// are in flight at once. Purely additive — `each` is `each_with_concurrency(usize::MAX, ..)`.
    pub fn each_with_concurrency<OutOther>(
        self,
        limit: usize,
        f: impl Fn(Out::Item, Future<OutOther>) + Send + Sync + 'static,
    ) -> Job<Out, In>
    where
        OutOther: Container<Item = Out::Item>,
    {
        let f = Arc::new(f);
        let limit = limit.max(1);
        self.then_async(move |container, result: Future<Out>| {
            let items: VecDeque<Out::Item> = container.into_items().into();
            if items.is_empty() {
                result.set_result(Out::from_items(Vec::new()));
                return;
            }
            let remaining = items.len();
            let state = Arc::new(Mutex::new(FanOutState {
                queue: items,
                in_flight: 0,
                remaining,
                collected: Vec::new(),
                first_error: None,
                watchers: Vec::new(),
            }));
            launch_ready(limit, &f, &state, &result);
        })
    }

    /// Same shape as [`Job::then`], but requires `Out` to be a [`Container`]
    /// whose element type is what `f` consumes. The constraint is purely
    /// compile-time: unlike `each`, `reduce` does not fan out — it hands the
    /// whole container to `f` at once.
    pub fn reduce<NewOut>(self, f: impl Fn(Out) -> NewOut + Send + Sync + 'static) -> Job<NewOut, In>
    where
        NewOut: Clone + Send + Sync + 'static,
    {
        self.then_fn(f)
    }
}

fn launch_ready<Item, OutOther, Out>(
    limit: usize,
    f: &Arc<dyn Fn(Item, Future<OutOther>) + Send + Sync>,
    state: &Arc<Mutex<FanOutState<Item, OutOther>>>,
    result: &Future<Out>,
) where
    Item: Clone + Send + Sync + 'static,
    OutOther: Container<Item = Item>,
    Out: Container<Item = Item>,
{
    loop {
        let item = {
            let mut guard = state.lock();
            if guard.in_flight >= limit {
                return;
            }
            match guard.queue.pop_front() {
                Some(item) => {
                    guard.in_flight += 1;
                    item
                }
                None => return,
            }
        };

        let sub: Future<OutOther> = Future::new();
        let watcher: FutureWatcher<OutOther> = FutureWatcher::new();
        let f2 = f.clone();
        let state2 = state.clone();
        let result2 = result.clone();
        watcher.on_ready(move |value, error| {
            let done = {
                let mut guard = state2.lock();
                guard.in_flight -= 1;
                guard.remaining -= 1;
                match error {
                    Some(e) => {
                        if guard.first_error.is_none() {
                            guard.first_error = Some(e);
                        }
                    }
                    None => guard
                        .collected
                        .extend(value.unwrap_or_else(|| unreachable!("finished without error but no value")).into_items()),
                }
                guard.remaining == 0
            };
            if done {
                finish(&state2, &result2);
            } else {
                launch_ready(limit, &f2, &state2, &result2);
            }
        });
        watcher.set_future(sub.clone());
        state.lock().watchers.push(watcher);
        f(item, sub);
    }
}

fn finish<Item, OutOther, Out>(state: &Arc<Mutex<FanOutState<Item, OutOther>>>, result: &Future<Out>)
where
    Item: Clone + Send + Sync + 'static,
    OutOther: Send + Sync + 'static,
    Out: Container<Item = Item>,
{
    let mut guard = state.lock();
    guard.watchers.clear();
    match guard.first_error.take() {
        Some(e) => result.set_error(e),
        None => result.set_result(Out::from_items(std::mem::take(&mut guard.collected))),
    }
}
