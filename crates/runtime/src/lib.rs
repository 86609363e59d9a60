//! `relay_runtime`: the concrete realization of the host collaborators
//! `relay_core` treats abstractly — a `tokio`-backed [`EventLoop`] for
//! `Job::wait`, plus the panic/logging setup every `relay`-hosted binary
//! wants.

mod diagnostics;
mod event_loop;

pub use diagnostics::install_panic_handler;
pub use event_loop::{install, TokioEventLoop};

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::Job;
    use std::time::Duration;

    #[tokio::test]
    async fn wait_job_finishes_after_its_delay() {
        install();
        let started = std::time::Instant::now();
        let result = Job::wait(Duration::from_millis(20)).exec();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(result.is_finished());
        assert!(started.elapsed() >= Duration::from_millis(20));
    }
}
