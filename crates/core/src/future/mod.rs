//! Single-assignment, watchable result of one stage of a job chain.
//!
//! A [`Future<T>`] is a cheap, `Clone`-able handle onto a shared slot that is
//! written at most once (`set_value`/`set_error`, then `set_finished`) and can
//! be observed any number of times, before or after it finishes, through a
//! [`FutureWatcher`].

mod watcher;
pub use watcher::FutureWatcher;

use std::any::Any;
use std::sync::Arc;
use std::sync::Weak;

use parking_lot::Mutex;

use crate::error::Error;

/// A fractional progress notification, always clamped to `[0.0, 1.0]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress(f64);

impl Progress {
    pub fn from_fraction(fraction: f64) -> Self {
        Progress(fraction.clamp(0.0, 1.0))
    }

    pub fn from_steps(done: u64, total: u64) -> Self {
        if total == 0 {
            Progress(1.0)
        } else {
            Progress((done as f64 / total as f64).clamp(0.0, 1.0))
        }
    }

    pub fn fraction(&self) -> f64 {
        self.0
    }
}

pub(crate) trait WatcherSink<T>: Send + Sync {
    fn notify_ready(&self, value: Option<T>, error: Option<Error>);
    fn notify_progress(&self, progress: Progress);
}

struct Inner<T> {
    finished: bool,
    value: Option<T>,
    errors: Vec<Error>,
    watchers: Vec<Weak<dyn WatcherSink<T>>>,
}

impl<T> Inner<T> {
    fn new() -> Self {
        Inner { finished: false, value: None, errors: Vec::new(), watchers: Vec::new() }
    }
}

/// A single-assignment result slot, shared by every clone.
///
/// `keepalive` is never read, only held: it is how a top-level `exec()` call
/// keeps the whole `Execution` ancestry (and any deferred watchers still
/// pending on it) alive for exactly as long as the caller holds this future,
/// without the `Inner` state itself (which every clone shares) referencing
/// its own owning execution and leaking a cycle.
#[derive(Clone)]
pub struct Future<T> {
    shared: Arc<Mutex<Inner<T>>>,
    keepalive: Option<Arc<dyn Any + Send + Sync>>,
}

impl<T: Clone + Send + Sync + 'static> Default for Future<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + Sync + 'static> Future<T> {
    pub fn new() -> Self {
        Future { shared: Arc::new(Mutex::new(Inner::new())), keepalive: None }
    }

    pub(crate) fn with_keepalive(mut self, keepalive: Arc<dyn Any + Send + Sync>) -> Self {
        self.keepalive = Some(keepalive);
        self
    }

    pub fn set_value(&self, value: T) {
        let mut inner = self.shared.lock();
        debug_assert!(!inner.finished, "set_value on an already-finished future");
        inner.value = Some(value);
    }

    pub fn set_error(&self, error: Error) {
        let mut inner = self.shared.lock();
        debug_assert!(!inner.finished, "set_error on an already-finished future");
        inner.errors.push(error);
        drop(inner);
        self.set_finished();
    }

    pub fn set_result(&self, value: T) {
        self.set_value(value);
        self.set_finished();
    }

    pub fn set_finished(&self) {
        let watchers = {
            let mut inner = self.shared.lock();
            if inner.finished {
                return;
            }
            inner.finished = true;
            std::mem::take(&mut inner.watchers)
        };
        let (value, error) = self.snapshot();
        for weak in watchers {
            if let Some(sink) = weak.upgrade() {
                sink.notify_ready(value.clone(), error.clone());
            }
        }
    }

    pub fn set_progress(&self, fraction: f64) {
        self.set_progress_value(Progress::from_fraction(fraction));
    }

    pub fn set_progress_steps(&self, done: u64, total: u64) {
        self.set_progress_value(Progress::from_steps(done, total));
    }

    fn set_progress_value(&self, progress: Progress) {
        let live: Vec<_> = {
            let mut inner = self.shared.lock();
            inner.watchers.retain(|w| w.strong_count() > 0);
            inner.watchers.iter().filter_map(|w| w.upgrade()).collect()
        };
        for sink in live {
            sink.notify_progress(progress);
        }
    }

    pub fn is_finished(&self) -> bool {
        self.shared.lock().finished
    }

    pub fn has_error(&self) -> bool {
        !self.shared.lock().errors.is_empty()
    }

    /// The value this future finished with, or `None` if it is not finished
    /// or finished with an error.
    pub fn value(&self) -> Option<T> {
        self.shared.lock().value.clone()
    }

    /// All errors recorded against this future, in the order they were set.
    pub fn errors(&self) -> Vec<Error> {
        self.shared.lock().errors.clone()
    }

    /// The error that should propagate downstream, if any: the first one
    /// recorded.
    pub fn first_error(&self) -> Option<Error> {
        self.shared.lock().errors.first().cloned()
    }

    pub(crate) fn snapshot(&self) -> (Option<T>, Option<Error>) {
        let inner = self.shared.lock();
        (inner.value.clone(), inner.errors.first().cloned())
    }

    pub(crate) fn register_watcher(&self, sink: Weak<dyn WatcherSink<T>>) {
        self.shared.lock().watchers.push(sink);
    }

    /// Blocks the calling thread until this future finishes. Prefer
    /// [`FutureWatcher`] wherever the caller has an event loop to return to;
    /// this exists for synchronous call sites (tests, `main`, CLI glue).
    pub fn wait_for_finished(&self) -> (Option<T>, Option<Error>) {
        if self.is_finished() {
            return self.snapshot();
        }
        let (tx, rx) = std::sync::mpsc::channel();
        let watcher = FutureWatcher::new();
        let tx = Mutex::new(Some(tx));
        watcher.on_ready(move |value, error| {
            if let Some(tx) = tx.lock().take() {
                let _ = tx.send((value, error));
            }
        });
        watcher.set_future(self.clone());
        rx.recv().unwrap_or((None, None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watcher_attached_after_finish_fires_immediately() {
        let future = Future::new();
        future.set_result(7);
        let seen = Arc::new(Mutex::new(None));
        let seen2 = seen.clone();
        let watcher = FutureWatcher::new();
        watcher.on_ready(move |value, error| *seen2.lock() = Some((value, error)));
        watcher.set_future(future);
        assert_eq!(*seen.lock(), Some((Some(7), None)));
    }

    #[test]
    fn watcher_attached_before_finish_fires_once_set() {
        let future = Future::new();
        let seen = Arc::new(Mutex::new(None));
        let seen2 = seen.clone();
        let watcher = FutureWatcher::new();
        watcher.on_ready(move |value, error| *seen2.lock() = Some((value, error)));
        watcher.set_future(future.clone());
        assert!(seen.lock().is_none());
        future.set_result("done");
        assert_eq!(*seen.lock(), Some((Some("done"), None)));
    }

    #[test]
    fn set_error_is_recorded_as_the_first_error() {
        let future: Future<i32> = Future::new();
        future.set_error(Error::new(1, "first"));
        assert_eq!(future.first_error(), Some(Error::new(1, "first")));
        assert_eq!(future.wait_for_finished(), (None, Some(Error::new(1, "first"))));
    }

    #[test]
    fn wait_for_finished_blocks_until_set_from_another_thread() {
        let future: Future<i32> = Future::new();
        let producer = future.clone();
        std::thread::spawn(move || producer.set_result(42));
        assert_eq!(future.wait_for_finished(), (Some(42), None));
    }

    #[test]
    fn progress_from_steps_clamps_when_total_is_zero() {
        assert_eq!(Progress::from_steps(0, 0).fraction(), 1.0);
        assert_eq!(Progress::from_fraction(2.0).fraction(), 1.0);
        assert_eq!(Progress::from_fraction(-1.0).fraction(), 0.0);
    }
}
