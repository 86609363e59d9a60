//! The abstract "event loop" collaborator from spec §6: a single-shot timer
//! used only by [`crate::job::Job::wait`]. `relay_core` never schedules work
//! itself beyond that — the concrete adapter lives in `relay_runtime`, built
//! on `tokio`.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

/// A host-provided single-shot timer.
pub trait EventLoop: Send + Sync {
    /// Schedules `callback` to run after `delay`, on whatever thread the
    /// host's loop drives callbacks from.
    fn set_timeout(&self, delay: Duration, callback: Box<dyn FnOnce() + Send>);
}

static EVENT_LOOP: OnceLock<Arc<dyn EventLoop>> = OnceLock::new();

/// Registers the process-wide event loop. Idempotent after the first call —
/// later calls are silently ignored, matching `tracing`'s own
/// once-per-process subscriber registration. `relay_runtime::install` calls
/// this for `tokio`-backed hosts.
pub fn install(event_loop: Arc<dyn EventLoop>) {
    let _ = EVENT_LOOP.set(event_loop);
}

pub(crate) fn current() -> Arc<dyn EventLoop> {
    EVENT_LOOP
        .get()
        .expect("no EventLoop installed — call relay_runtime::install() before Job::wait")
        .clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct ImmediateLoop;

    impl EventLoop for ImmediateLoop {
        fn set_timeout(&self, _delay: Duration, callback: Box<dyn FnOnce() + Send>) {
            callback();
        }
    }

    #[test]
    fn job_wait_runs_its_callback_on_the_installed_event_loop() {
        install(Arc::new(ImmediateLoop));
        let ran = Arc::new(AtomicBool::new(false));
        let ran2 = ran.clone();
        current().set_timeout(Duration::from_secs(0), Box::new(move || ran2.store(true, Ordering::SeqCst)));
        assert!(ran.load(Ordering::SeqCst));
    }
}
