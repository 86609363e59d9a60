use std::sync::Arc;
use std::time::Duration;

use relay_core::EventLoop;
use tokio::runtime::Handle;

/// The event-loop adapter for `tokio`-hosted programs: every [`relay_core`]
/// job that schedules a delay (`Job::wait`) rides on this runtime's task
/// scheduler, realizing spec §6's abstract "single-shot timer" contract.
pub struct TokioEventLoop {
    handle: Handle,
}

impl TokioEventLoop {
    /// Captures the `Handle` of whichever tokio runtime is driving the
    /// calling task. Panics outside a tokio context, same as
    /// `Handle::current()`.
    pub fn current() -> Self {
        TokioEventLoop { handle: Handle::current() }
    }
}

impl EventLoop for TokioEventLoop {
    fn set_timeout(&self, delay: Duration, callback: Box<dyn FnOnce() + Send>) {
        self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            callback();
        });
    }
}

/// Installs a [`TokioEventLoop`] bound to the calling task's runtime as the
/// process-wide event loop, so `Job::wait` works. Call this once, early,
/// from inside a tokio runtime — typically the first line of `main`'s
/// `#[tokio::main]` body.
pub fn install() {
    relay_core::event_loop::install(Arc::new(TokioEventLoop::current()));
}
