use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use super::{keepalive, Container};
use crate::error::Error;
use crate::future::{Future, FutureWatcher};
use crate::job::Job;

struct ForEachState<JobOut> {
    in_flight: usize,
    remaining: usize,
    collected: Vec<JobOut>,
    first_error: Option<Error>,
    /// Each sub-future retained alongside its watcher — see `launch_ready`'s
    /// comment on why the watcher alone isn't enough to keep it observed.
    watchers: Vec<(Future<JobOut>, FutureWatcher<JobOut>)>,
}

impl<Out, In> Job<Out, In>
where
    Out: Container,
    In: Clone + Send + Sync + 'static,
{
    /// Parallel variant: spawns an independent execution of `job` per
    /// element, all started eagerly. The first sub-job error becomes this
    /// stage's error; the rest still run to their own natural completion.
    pub fn for_each<JobOut>(self, job: Job<JobOut, Out::Item>) -> Job<Vec<JobOut>, In>
    where
        JobOut: Clone + Send + Sync + 'static,
    {
        self.for_each_with_concurrency(usize::MAX, job)
    }

    /// Bounded-fan-out variant of [`Job::for_each`]: at most `limit`
    /// sub-executions are in flight at once.
    pub fn for_each_with_concurrency<JobOut>(self, limit: usize, job: Job<JobOut, Out::Item>) -> Job<Vec<JobOut>, In>
    where
        JobOut: Clone + Send + Sync + 'static,
    {
        let job = Arc::new(job);
        let limit = limit.max(1);
        self.then_async(move |container, result: Future<Vec<JobOut>>| {
            let items: VecDeque<Out::Item> = container.into_items().into();
            if items.is_empty() {
                result.set_result(Vec::new());
                return;
            }
            let remaining = items.len();
            let queue = Arc::new(Mutex::new(items));
            let state = Arc::new(Mutex::new(ForEachState {
                in_flight: 0,
                remaining,
                collected: Vec::new(),
                first_error: None,
                watchers: Vec::new(),
            }));
            launch_ready(limit, &job, &queue, &state, &result);
        })
    }

    /// Serial variant of [`Job::for_each`]: element *N+1* only begins after
    /// element *N*'s own execution has finished. Error policy is identical
    /// to `for_each` (first error wins), but since launches are sequential
    /// the remaining elements never start once an error is seen.
    pub fn serial_for_each<JobOut>(self, job: Job<JobOut, Out::Item>) -> Job<Vec<JobOut>, In>
    where
        JobOut: Clone + Send + Sync + 'static,
    {
        let job = Arc::new(job);
        self.then_async(move |container, result: Future<Vec<JobOut>>| {
            let items: VecDeque<Out::Item> = container.into_items().into();
            run_serial(job.clone(), items, Vec::new(), None, result);
        })
    }
}

fn launch_ready<Item, JobOut>(
    limit: usize,
    job: &Arc<Job<JobOut, Item>>,
    queue: &Arc<Mutex<VecDeque<Item>>>,
    state: &Arc<Mutex<ForEachState<JobOut>>>,
    result: &Future<Vec<JobOut>>,
) where
    Item: Clone + Send + Sync + 'static,
    JobOut: Clone + Send + Sync + 'static,
{
    loop {
        let item = {
            let mut guard = state.lock();
            if guard.in_flight >= limit {
                return;
            }
            match queue.lock().pop_front() {
                Some(item) => {
                    guard.in_flight += 1;
                    item
                }
                None => return,
            }
        };

        let sub = job.exec_with(item);
        let watcher: FutureWatcher<JobOut> = FutureWatcher::new();
        let job2 = job.clone();
        let queue2 = queue.clone();
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
                        .push(value.unwrap_or_else(|| unreachable!("finished without error but no value"))),
                }
                guard.remaining == 0
            };
            if done {
                let mut guard = state2.lock();
                guard.watchers.clear();
                match guard.first_error.take() {
                    Some(e) => result2.set_error(e),
                    None => result2.set_result(std::mem::take(&mut guard.collected)),
                }
            } else {
                launch_ready(limit, &job2, &queue2, &state2, &result2);
            }
        });
        watcher.set_future(sub.clone());
        // Retain `sub` itself alongside its watcher: the watcher only holds a
        // `Weak` registration on it, and `sub`'s own keepalive is the only
        // strong reference holding the sub-job's `Execution` chain (and any
        // watcher it has pending on one of its own unfinished stages) alive.
        state.lock().watchers.push((sub, watcher));
    }
}

fn run_serial<Item, JobOut>(
    job: Arc<Job<JobOut, Item>>,
    mut queue: VecDeque<Item>,
    collected: Vec<JobOut>,
    first_error: Option<Error>,
    result: Future<Vec<JobOut>>,
) where
    Item: Clone + Send + Sync + 'static,
    JobOut: Clone + Send + Sync + 'static,
{
    if let Some(e) = first_error {
        result.set_error(e);
        return;
    }
    let item = match queue.pop_front() {
        Some(item) => item,
        None => {
            result.set_result(collected);
            return;
        }
    };
    let sub = job.exec_with(item);
    let id = keepalive::reserve();
    let watcher: FutureWatcher<JobOut> = FutureWatcher::new();
    let sub2 = sub.clone();
    watcher.on_ready(move |value, error| {
        keepalive::release(id);
        let mut collected = collected.clone();
        let mut first_error = None;
        match error {
            Some(e) => first_error = Some(e),
            None => collected.push(value.unwrap_or_else(|| unreachable!("finished without error but no value"))),
        }
        run_serial(job.clone(), queue.clone(), collected, first_error, result.clone());
    });
    watcher.set_future(sub);
    // Retain `sub` itself, not just `watcher` — see `launch_ready`'s comment.
    keepalive::hold(id, (sub2, watcher));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn for_each_runs_an_independent_sub_job_per_element() {
        let squares = Job::value(vec![1, 2, 3]).for_each(Job::seeded(|n: i32| n * n)).exec();
        let (value, error) = squares.wait_for_finished();
        let mut items = value.unwrap();
        items.sort_unstable();
        assert_eq!(items, vec![1, 4, 9]);
        assert!(error.is_none());
    }

    #[test]
    fn for_each_on_an_empty_container_finishes_with_an_empty_vec() {
        let result = Job::value(Vec::<i32>::new()).for_each(Job::seeded(|n: i32| n)).exec();
        assert_eq!(result.wait_for_finished(), (Some(Vec::new()), None));
    }

    #[test]
    fn for_each_reports_the_first_sub_job_error() {
        let failing = Job::<i32, i32>::seeded_async(|n, result: Future<i32>| {
            if n == 2 {
                result.set_error(Error::new(9, "bad element"));
            } else {
                result.set_result(n);
            }
        });
        let result = Job::value(vec![1, 2, 3]).for_each(failing).exec();
        let (value, error) = result.wait_for_finished();
        assert!(value.is_none());
        assert_eq!(error, Some(Error::new(9, "bad element")));
    }

    #[test]
    fn serial_for_each_runs_one_element_at_a_time_in_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let order2 = order.clone();
        let recording = Job::seeded_async(move |n: i32, result: Future<i32>| {
            order2.lock().push(n);
            result.set_result(n);
        });
        let result = Job::value(vec![1, 2, 3]).serial_for_each(recording).exec();
        let (value, error) = result.wait_for_finished();
        assert_eq!(value, Some(vec![1, 2, 3]));
        assert!(error.is_none());
        assert_eq!(*order.lock(), vec![1, 2, 3]);
    }

    /// A sub-job whose own predecessor stage finishes on a background thread
    /// instead of synchronously: the shape that hangs if a combinator only
    /// retains the sub-job's watcher and not the sub-job's future itself.
    fn async_predecessor_job() -> Job<i32, i32> {
        Job::seeded_async(|n: i32, result: Future<i32>| {
            std::thread::spawn(move || {
                std::thread::sleep(std::time::Duration::from_millis(5));
                result.set_result(n);
            });
        })
        .then(|n| n)
    }

    #[test]
    fn for_each_does_not_hang_on_a_sub_job_that_finishes_asynchronously() {
        let result = Job::value(vec![1, 2, 3]).for_each(async_predecessor_job()).exec();
        let (value, error) = result.wait_for_finished();
        let mut items = value.unwrap();
        items.sort_unstable();
        assert_eq!(items, vec![1, 2, 3]);
        assert!(error.is_none());
    }

    #[test]
    fn serial_for_each_does_not_hang_on_a_sub_job_that_finishes_asynchronously() {
        let result = Job::value(vec![1, 2, 3]).serial_for_each(async_predecessor_job()).exec();
        assert_eq!(result.wait_for_finished(), (Some(vec![1, 2, 3]), None));
    }

    #[test]
    fn serial_for_each_stops_launching_new_elements_once_an_error_is_seen() {
        let launched = Arc::new(Mutex::new(Vec::new()));
        let launched_in_job = launched.clone();
        let failing = Job::seeded_async(move |n: i32, result: Future<i32>| {
            launched_in_job.lock().push(n);
            if n == 2 {
                result.set_error(Error::new(5, "stop at 2"));
            } else {
                result.set_result(n);
            }
        });
        let result = Job::value(vec![1, 2, 3, 4]).serial_for_each(failing).exec();
        let (value, error) = result.wait_for_finished();
        assert!(value.is_none());
        assert_eq!(error, Some(Error::new(5, "stop at 2")));
        assert_eq!(*launched.lock(), vec![1, 2]);
    }
}
