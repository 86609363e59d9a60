use std::any::Any;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::executor::ExecutorDyn;
use crate::future::Future;
use crate::guard::Guard;

/// Per-`exec()` bookkeeping threaded down through the chain-up recursion:
/// the accumulated guards from every stage visited so far, and the current
/// depth (for trace records). Built once per top-level `exec()`/`exec_with`
/// call and dropped once chain-up finishes.
pub(crate) struct ExecutionContext {
    pub(crate) guards: Vec<Guard>,
    pub(crate) depth: usize,
}

impl ExecutionContext {
    pub(crate) fn new() -> Self {
        ExecutionContext { guards: Vec::new(), depth: 0 }
    }
}

/// Type-erased view of an `Execution<T>` for arbitrary `T`, used only to
/// keep a predecessor node (and transitively its own predecessor, and so on
/// back to the head of the chain) alive without leaking its value type into
/// `Execution<Out>`'s own signature.
pub(crate) trait AnyExecution: Send + Sync {}

/// A single built stage of a chain: the executor that produced it, its own
/// predecessor (if any), and the result future it will eventually finish.
///
/// `pending` holds whatever needs to stay alive until that result finishes —
/// typically a one-shot watcher on the predecessor's future — type-erased
/// since its concrete type depends on a node-local `In` this struct doesn't
/// name.
pub struct Execution<Out> {
    #[allow(dead_code)]
    executor: Arc<dyn ExecutorDyn<Out>>,
    #[allow(dead_code)]
    prev_execution: Option<Arc<dyn AnyExecution>>,
    result: Future<Out>,
    #[allow(dead_code)]
    pending: Mutex<Option<Box<dyn Any + Send + Sync>>>,
}

impl<Out: Clone + Send + Sync + 'static> AnyExecution for Execution<Out> {}

impl<Out: Clone + Send + Sync + 'static> Execution<Out> {
    pub(crate) fn new(
        executor: Arc<dyn ExecutorDyn<Out>>,
        prev_execution: Option<Arc<dyn AnyExecution>>,
        result: Future<Out>,
        pending: Option<Box<dyn Any + Send + Sync>>,
    ) -> Self {
        Execution { executor, prev_execution, result, pending: Mutex::new(pending) }
    }

    pub(crate) fn result(&self) -> &Future<Out> {
        &self.result
    }
}
