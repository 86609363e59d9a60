//! `do_while` drives a body job repeatedly until it reports
//! [`relay::ControlFlow::Break`], with no bound on the number of iterations.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use relay::{do_while, ControlFlow, Job};

fn main() {
    let counter = Arc::new(AtomicI32::new(0));
    let body_counter = counter.clone();

    let loop_job = do_while(move || {
        let counter = body_counter.clone();
        Job::start(move || {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            if n >= 3 {
                ControlFlow::Break
            } else {
                ControlFlow::Continue
            }
        })
    });

    let finished = loop_job.exec();
    let (value, error) = finished.wait_for_finished();
    println!("do_while stopped after {} iterations (error = {:?})", counter.load(Ordering::SeqCst), error);
    assert_eq!(value, Some(()));
    assert_eq!(counter.load(Ordering::SeqCst), 3);
}
