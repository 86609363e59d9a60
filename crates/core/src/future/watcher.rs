use std::sync::Arc;

use parking_lot::Mutex;

use super::{Future, Progress, WatcherSink};
use crate::error::Error;

type ReadyCallback<T> = Box<dyn FnMut(Option<T>, Option<Error>) + Send>;
type ProgressCallback = Box<dyn FnMut(Progress) + Send>;

struct Sink<T> {
    ready: Mutex<Option<ReadyCallback<T>>>,
    progress: Mutex<Option<ProgressCallback>>,
}

impl<T: Send + Sync + 'static> WatcherSink<T> for Sink<T> {
    fn notify_ready(&self, value: Option<T>, error: Option<Error>) {
        if let Some(cb) = self.ready.lock().as_mut() {
            cb(value, error);
        }
    }

    fn notify_progress(&self, progress: Progress) {
        if let Some(cb) = self.progress.lock().as_mut() {
            cb(progress);
        }
    }
}

/// Observes a [`Future`] without owning its value.
///
/// Binding a watcher to an already-finished future delivers the `on_ready`
/// callback immediately, synchronously, on the calling thread — there is no
/// "missed" window between a future finishing and a watcher attaching to it.
pub struct FutureWatcher<T> {
    sink: Arc<Sink<T>>,
}

impl<T: Clone + Send + Sync + 'static> Default for FutureWatcher<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + Sync + 'static> FutureWatcher<T> {
    pub fn new() -> Self {
        FutureWatcher { sink: Arc::new(Sink { ready: Mutex::new(None), progress: Mutex::new(None) }) }
    }

    pub fn on_ready(&self, callback: impl FnMut(Option<T>, Option<Error>) + Send + 'static) {
        *self.sink.ready.lock() = Some(Box::new(callback));
    }

    pub fn on_progress(&self, callback: impl FnMut(Progress) + Send + 'static) {
        *self.sink.progress.lock() = Some(Box::new(callback));
    }

    pub fn set_future(&self, future: Future<T>) {
        if future.is_finished() {
            let (value, error) = future.snapshot();
            self.sink.notify_ready(value, error);
        } else {
            let weak: std::sync::Weak<dyn WatcherSink<T>> = Arc::downgrade(&self.sink);
            future.register_watcher(weak);
        }
    }
}
