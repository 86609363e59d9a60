//! Three linear chains: a plain success path, an error tunneling through an
//! untouched stage, and an `on_error` stage recovering from it.

use relay::{Error, Job};

fn main() {
    relay::install_panic_handler();

    let doubled_then_plus_three = Job::start(|| 2).then(|v| v + 3).then(|v| v * 4).exec();
    let (value, error) = doubled_then_plus_three.wait_for_finished();
    println!("2 -> +3 -> *4 = {:?} (error = {:?})", value, error);
    assert_eq!(value, Some(20));
    assert!(error.is_none());

    let tunneled = Job::<i32>::start_async(|result| result.set_error(Error::new(7, "boom")))
        .then(|v| v + 1)
        .exec();
    let (value, error) = tunneled.wait_for_finished();
    println!("error tunnels through: value = {:?}, error = {:?}", value, error);
    assert_eq!(value, None);
    assert_eq!(error, Some(Error::new(7, "boom")));

    let recovered = Job::<i32>::error(Error::new(7, "boom")).on_error(|_e| 42).exec();
    let (value, error) = recovered.wait_for_finished();
    println!("on_error recovers: value = {:?}, error = {:?}", value, error);
    assert_eq!(value, Some(42));
    assert!(error.is_none());
}
