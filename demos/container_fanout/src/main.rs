//! `each` fans a vector out into one sub-future per element and concatenates
//! the results; `for_each` drives an independent sub-job per element; and
//! `serial_for_each` runs those sub-jobs one at a time, in order.

use std::sync::{Arc, Mutex};

use relay::{Future, Job};

fn main() {
    let squared = Job::value(vec![1, 2, 3])
        .each(|n, future| future.set_result(vec![n * n]))
        .exec();
    let (value, _error) = squared.wait_for_finished();
    let mut squares = value.unwrap_or_default();
    squares.sort_unstable();
    println!("each([1,2,3], n*n) = {:?}", squares);
    assert_eq!(squares, vec![1, 4, 9]);

    let square_job = Job::seeded(|n: i32| n * n);
    let all_squares = Job::value(vec![1, 2, 3]).for_each(square_job).exec();
    let (value, _error) = all_squares.wait_for_finished();
    let mut squares = value.unwrap_or_default();
    squares.sort_unstable();
    println!("for_each([1,2,3], n*n) = {:?}", squares);
    assert_eq!(squares, vec![1, 4, 9]);

    let order: Arc<Mutex<Vec<i32>>> = Arc::new(Mutex::new(Vec::new()));
    let order_for_job = order.clone();
    let recording_job = Job::seeded_async(move |n: i32, result: Future<i32>| {
        order_for_job.lock().unwrap().push(n);
        result.set_result(n);
    });
    let recorded = Job::value(vec![1, 2, 3]).serial_for_each(recording_job).exec();
    let (value, error) = recorded.wait_for_finished();
    println!("serial_for_each([1,2,3]) = {:?} (error = {:?})", value, error);
    assert_eq!(*order.lock().unwrap(), vec![1, 2, 3]);
}
