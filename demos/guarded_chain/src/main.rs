//! A `guarded` stage is skipped, without error, once its guard's owner is
//! dropped — coarse cancellation with no preemption of in-flight work.

use std::sync::Arc;

use relay::{guard_of, Job};

fn main() {
    let owner = Arc::new(());
    let guard = guard_of(&owner);

    let alive = Job::start(|| 1).then(|v| v + 1).guarded(guard.clone()).exec();
    let (value, error) = alive.wait_for_finished();
    println!("guard intact: value = {:?}, error = {:?}", value, error);
    assert_eq!(value, Some(2));
    assert!(error.is_none());

    drop(owner);
    assert!(guard.is_broken());

    let skipped = Job::start(|| 1).then(|v| v + 1).guarded(guard).exec();
    let (value, error) = skipped.wait_for_finished();
    println!("guard broken: value = {:?}, error = {:?}", value, error);
    assert_eq!(value, None);
    assert_eq!(error, None);
}
