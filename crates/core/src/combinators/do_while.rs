use std::sync::Arc;

use super::keepalive;
use crate::future::{Future, FutureWatcher};
use crate::job::Job;

/// The two outcomes a [`do_while`] body can return: keep looping, or stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlFlow {
    Continue,
    Break,
}

/// Repeatedly runs a fresh `body()` job until it returns [`ControlFlow::Break`]
/// or fails. Each iteration's job starts only after the previous one's
/// result future has finished.
pub fn do_while(body: impl Fn() -> Job<ControlFlow> + Send + Sync + 'static) -> Job<(), ()> {
    let body = Arc::new(body);
    Job::start_async(move |result: Future<()>| {
        run_iteration(body.clone(), result);
    })
}

fn run_iteration(body: Arc<dyn Fn() -> Job<ControlFlow> + Send + Sync>, result: Future<()>) {
    let sub = body().exec();
    let id = keepalive::reserve();
    let watcher: FutureWatcher<ControlFlow> = FutureWatcher::new();
    watcher.on_ready(move |value, error| {
        keepalive::release(id);
        if let Some(e) = error {
            result.set_error(e);
            return;
        }
        match value {
            Some(ControlFlow::Continue) => run_iteration(body.clone(), result.clone()),
            Some(ControlFlow::Break) | None => result.set_result(()),
        }
    });
    watcher.set_future(sub.clone());
    // Retain `sub` itself, not just `watcher`: the watcher only holds a
    // `Weak` registration on it, and `sub`'s own keepalive is the only
    // strong reference holding a multi-stage body's `Execution` chain alive
    // until it actually finishes.
    keepalive::hold(id, (sub, watcher));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};

    #[test]
    fn do_while_repeats_the_body_until_it_breaks() {
        let counter = Arc::new(AtomicI32::new(0));
        let body_counter = counter.clone();
        let loop_job = do_while(move || {
            let counter = body_counter.clone();
            Job::start(move || {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                if n >= 5 {
                    ControlFlow::Break
                } else {
                    ControlFlow::Continue
                }
            })
        });
        let finished = loop_job.exec();
        assert_eq!(finished.wait_for_finished(), (Some(()), None));
        assert_eq!(counter.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn do_while_runs_the_body_exactly_once_when_it_breaks_immediately() {
        let count = Arc::new(AtomicI32::new(0));
        let body_count = count.clone();
        let loop_job = do_while(move || {
            body_count.fetch_add(1, Ordering::SeqCst);
            Job::value(ControlFlow::Break)
        });
        loop_job.exec().wait_for_finished();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn do_while_propagates_a_body_error() {
        let loop_job = do_while(|| Job::<ControlFlow>::error(crate::error::Error::new(3, "stop")));
        let finished = loop_job.exec();
        assert_eq!(finished.wait_for_finished(), (None, Some(crate::error::Error::new(3, "stop"))));
    }

    #[test]
    fn do_while_handles_a_body_whose_own_predecessor_finishes_asynchronously() {
        // The body's first stage doesn't finish synchronously (it hands off
        // to a background thread); its second stage depends on that first
        // stage's result. This is the shape that hangs if `run_iteration`
        // only retains the sub-job's watcher and not the sub-job's future
        // itself.
        let counter = Arc::new(AtomicI32::new(0));
        let body_counter = counter.clone();
        let loop_job = do_while(move || {
            let counter = body_counter.clone();
            Job::start_async(move |result: Future<ControlFlow>| {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                let flow = if n >= 3 { ControlFlow::Break } else { ControlFlow::Continue };
                std::thread::spawn(move || {
                    std::thread::sleep(std::time::Duration::from_millis(5));
                    result.set_result(flow);
                });
            })
            .then(|flow| flow)
        });
        let finished = loop_job.exec();
        assert_eq!(finished.wait_for_finished(), (Some(()), None));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }
}
