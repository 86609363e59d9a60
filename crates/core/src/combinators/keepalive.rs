//! Parks a one-shot watcher that has no other owner between the moment it
//! attaches to a future and the moment it fires.
//!
//! `do_while` and `serial_for_each` only know their *next* step once the
//! current sub-future resolves, so there is no natural place upstream to
//! hold the intermediate `FutureWatcher` — it would otherwise be dropped
//! (and its weak registration on the future orphaned) the instant the
//! function that created it returns. This mirrors the job-bridge registry in
//! `executor::bridge_job`.

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

use parking_lot::Mutex;

fn registry() -> &'static Mutex<HashMap<u64, Box<dyn Any + Send + Sync>>> {
    static REGISTRY: OnceLock<Mutex<HashMap<u64, Box<dyn Any + Send + Sync>>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) fn reserve() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

pub(crate) fn hold(id: u64, value: impl Any + Send + Sync) {
    registry().lock().insert(id, Box::new(value));
}

pub(crate) fn release(id: u64) {
    registry().lock().remove(&id);
}
