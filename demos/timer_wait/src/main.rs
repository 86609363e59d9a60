//! `Job::wait` schedules onto whatever `EventLoop` the host installed;
//! `relay_runtime::install()` wires up the tokio-backed one.

use std::time::{Duration, Instant};

use relay::Job;

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    relay::install();

    let started = Instant::now();
    let timer = Job::wait(Duration::from_millis(20))
        .then_job(Job::seeded(|_: ()| "tick"))
        .exec();
    let (value, error) = timer.wait_for_finished();
    println!("waited {:?}, got {:?} (error = {:?})", started.elapsed(), value, error);
    assert_eq!(value, Some("tick"));
    assert!(started.elapsed() >= Duration::from_millis(20));
}
