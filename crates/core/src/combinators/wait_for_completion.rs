use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::Error;
use crate::future::{Future, FutureWatcher};
use crate::job::Job;

/// A utility job that finishes once every future in `futures` has finished.
/// Errors of sub-futures are ignored — upstream composition must inspect
/// them itself, e.g. with [`wait_for_completion_collecting`].
pub fn wait_for_completion<T>(futures: Vec<Future<T>>) -> Job<(), ()>
where
    T: Clone + Send + Sync + 'static,
{
    Job::start_async(move |result: Future<()>| {
        if futures.is_empty() {
            result.set_result(());
            return;
        }
        let remaining = Arc::new(Mutex::new(futures.len()));
        let watchers: Arc<Mutex<Vec<FutureWatcher<T>>>> = Arc::new(Mutex::new(Vec::with_capacity(futures.len())));
        for future in futures {
            let remaining2 = remaining.clone();
            let result2 = result.clone();
            let watchers2 = watchers.clone();
            let watcher: FutureWatcher<T> = FutureWatcher::new();
            watcher.on_ready(move |_value, _error| {
                let mut rem = remaining2.lock();
                *rem -= 1;
                if *rem == 0 {
                    result2.set_result(());
                    watchers2.lock().clear();
                }
            });
            watcher.set_future(future);
            watchers.lock().push(watcher);
        }
    })
}

/// Variant of [`wait_for_completion`] that preserves each future's own
/// outcome instead of discarding it, as a `Vec<Result<T, Error>>` in
/// completion order.
pub fn wait_for_completion_collecting<T>(futures: Vec<Future<T>>) -> Job<Vec<Result<T, Error>>, ()>
where
    T: Clone + Send + Sync + 'static,
{
    Job::start_async(move |result: Future<Vec<Result<T, Error>>>| {
        if futures.is_empty() {
            result.set_result(Vec::new());
            return;
        }
        let remaining = Arc::new(Mutex::new(futures.len()));
        let collected: Arc<Mutex<Vec<Result<T, Error>>>> = Arc::new(Mutex::new(Vec::with_capacity(futures.len())));
        let watchers: Arc<Mutex<Vec<FutureWatcher<T>>>> = Arc::new(Mutex::new(Vec::with_capacity(futures.len())));
        for future in futures {
            let remaining2 = remaining.clone();
            let collected2 = collected.clone();
            let result2 = result.clone();
            let watchers2 = watchers.clone();
            let watcher: FutureWatcher<T> = FutureWatcher::new();
            watcher.on_ready(move |value, error| {
                let outcome = match error {
                    Some(e) => Err(e),
                    None => Ok(value.unwrap_or_else(|| unreachable!("finished without error but no value"))),
                };
                collected2.lock().push(outcome);
                let mut rem = remaining2.lock();
                *rem -= 1;
                if *rem == 0 {
                    drop(rem);
                    result2.set_result(std::mem::take(&mut collected2.lock()));
                    watchers2.lock().clear();
                }
            });
            watcher.set_future(future);
            watchers.lock().push(watcher);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_for_completion_finishes_once_every_future_has() {
        let a: Future<i32> = Future::new();
        let b: Future<i32> = Future::new();
        let joined = wait_for_completion(vec![a.clone(), b.clone()]).exec();
        assert!(!joined.is_finished());
        a.set_result(1);
        assert!(!joined.is_finished());
        b.set_error(Error::new(1, "ignored"));
        assert_eq!(joined.wait_for_finished(), (Some(()), None));
    }

    #[test]
    fn wait_for_completion_on_an_empty_list_finishes_immediately() {
        let joined = wait_for_completion::<i32>(Vec::new()).exec();
        assert_eq!(joined.wait_for_finished(), (Some(()), None));
    }

    #[test]
    fn wait_for_completion_collecting_preserves_each_outcome() {
        let a: Future<i32> = Future::new();
        let b: Future<i32> = Future::new();
        a.set_result(1);
        b.set_error(Error::new(2, "bad"));
        let joined = wait_for_completion_collecting(vec![a, b]).exec();
        let (value, _error) = joined.wait_for_finished();
        let outcomes = value.unwrap();
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.contains(&Ok(1)));
        assert!(outcomes.contains(&Err(Error::new(2, "bad"))));
    }
}
