use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_EXECUTION_ID: AtomicU64 = AtomicU64::new(1);

/// Per-`Execution` trace handle: a monotonic id plus the stage's depth and
/// name, emitted as `tracing` spans at stage start and stage end. The id
/// counter only ever climbs — earlier source notes about reusing ids from a
/// decrementing counter do not apply here, since wraparound at `u64` scale
/// within a process lifetime is not a practical concern.
pub(crate) struct Tracer {
    id: u64,
    depth: usize,
    name: &'static str,
}

impl Tracer {
    pub(crate) fn start(depth: usize, name: &'static str) -> Self {
        let id = NEXT_EXECUTION_ID.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(execution_id = id, depth, stage = name, "stage start");
        Tracer { id, depth, name }
    }
}

impl Drop for Tracer {
    fn drop(&mut self) {
        tracing::trace!(execution_id = self.id, depth = self.depth, stage = self.name, "stage end");
    }
}
