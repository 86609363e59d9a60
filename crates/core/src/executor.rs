use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Error, RelayError};
use crate::execution::{AnyExecution, Execution, ExecutionContext};
use crate::future::{Future, FutureWatcher};
use crate::guard::{self, Guard};
use crate::job::Job;

/// Which of the three ways a stage reacts to its predecessor's outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Runs only when the predecessor finished without an error; an error
    /// tunnels straight through to this stage's own result untouched.
    GoodCase,
    /// Runs only when the predecessor finished with an error; on success the
    /// predecessor's value passes through unchanged.
    ErrorCase,
    /// Always runs, seeing both the predecessor's error (if any) and value
    /// (if any).
    Always,
}

pub(crate) enum Continuation<In, Out> {
    Sync(Arc<dyn Fn(In) -> Out + Send + Sync>),
    SyncError(Arc<dyn Fn(Error) -> Out + Send + Sync>),
    Async(Arc<dyn Fn(In, Future<Out>) + Send + Sync>),
    AsyncError(Arc<dyn Fn(Error, Future<Out>) + Send + Sync>),
    Job(Arc<dyn Fn(In) -> Job<Out> + Send + Sync>),
    JobError(Arc<dyn Fn(Error) -> Job<Out> + Send + Sync>),
    Always(Arc<dyn Fn(Option<Error>, Option<In>, Future<Out>) + Send + Sync>),
}

impl<In, Out> Clone for Continuation<In, Out> {
    fn clone(&self) -> Self {
        match self {
            Continuation::Sync(f) => Continuation::Sync(f.clone()),
            Continuation::SyncError(f) => Continuation::SyncError(f.clone()),
            Continuation::Async(f) => Continuation::Async(f.clone()),
            Continuation::AsyncError(f) => Continuation::AsyncError(f.clone()),
            Continuation::Job(f) => Continuation::Job(f.clone()),
            Continuation::JobError(f) => Continuation::JobError(f.clone()),
            Continuation::Always(f) => Continuation::Always(f.clone()),
        }
    }
}

/// Object-safe view of an `Executor<In, Out>` used to link it as somebody
/// else's predecessor without naming `In` in the caller's own type.
pub(crate) trait ExecutorDyn<Out>: Send + Sync {
    fn exec_dyn(&self, self_arc: Arc<dyn ExecutorDyn<Out>>, ctx: &mut ExecutionContext) -> Arc<Execution<Out>>;
}

/// Object-safe view used to link a predecessor onto the true head of a
/// chain, after the chain was already built (structural job splicing, or the
/// temporary seed injected by `exec(initialValue)`).
pub(crate) trait ExecutorRoot<In>: Send + Sync {
    /// Permanently links `prev` as this node's predecessor. Fails if a
    /// predecessor is already linked — an `Executor` may be spliced into at
    /// most one chain.
    fn link(&self, prev: Arc<dyn ExecutorDyn<In>>) -> Result<(), RelayError>;

    /// Temporarily swaps in `prev`, returning whatever was linked before (if
    /// anything) so the caller can restore it afterward.
    fn swap(&self, prev: Arc<dyn ExecutorDyn<In>>) -> Option<Arc<dyn ExecutorDyn<In>>>;

    fn restore(&self, prev: Option<Arc<dyn ExecutorDyn<In>>>);
}

pub(crate) struct Executor<In, Out> {
    prev: Mutex<Option<Arc<dyn ExecutorDyn<In>>>>,
    continuation: Continuation<In, Out>,
    mode: Mode,
    /// Only set (and only used) for `Mode::ErrorCase` stages: the identity
    /// copy run when the predecessor did *not* fail. Kept as ordinary data
    /// instead of special-cased control flow so this struct stays generic
    /// over `In`/`Out` without requiring `In = Out` at the type level.
    passthrough: Option<Arc<dyn Fn(In) -> Out + Send + Sync>>,
    guards: Vec<Guard>,
    name: &'static str,
}

impl<In, Out> Executor<In, Out>
where
    In: Clone + Send + Sync + 'static,
    Out: Clone + Send + Sync + 'static,
{
    pub(crate) fn new_root(continuation: Continuation<In, Out>, mode: Mode, name: &'static str) -> Arc<Self> {
        Arc::new(Executor {
            prev: Mutex::new(None),
            continuation,
            mode,
            passthrough: None,
            guards: Vec::new(),
            name,
        })
    }

    pub(crate) fn new_linked(
        prev: Arc<dyn ExecutorDyn<In>>,
        continuation: Continuation<In, Out>,
        mode: Mode,
        guards: Vec<Guard>,
        name: &'static str,
    ) -> Arc<Self> {
        Arc::new(Executor {
            prev: Mutex::new(Some(prev)),
            continuation,
            mode,
            passthrough: None,
            guards,
            name,
        })
    }

    pub(crate) fn new_error_case(
        prev: Arc<dyn ExecutorDyn<In>>,
        continuation: Continuation<In, Out>,
        passthrough: Arc<dyn Fn(In) -> Out + Send + Sync>,
        guards: Vec<Guard>,
        name: &'static str,
    ) -> Arc<Self> {
        Arc::new(Executor {
            prev: Mutex::new(Some(prev)),
            continuation,
            mode: Mode::ErrorCase,
            passthrough: Some(passthrough),
            guards,
            name,
        })
    }
}

impl<In, Out> ExecutorDyn<Out> for Executor<In, Out>
where
    In: Clone + Send + Sync + 'static,
    Out: Clone + Send + Sync + 'static,
{
    fn exec_dyn(&self, self_arc: Arc<dyn ExecutorDyn<Out>>, ctx: &mut ExecutionContext) -> Arc<Execution<Out>> {
        ctx.guards.extend(self.guards.iter().cloned());
        let tracer = crate::tracer::Tracer::start(ctx.depth, self.name);
        ctx.depth += 1;

        let prev = self.prev.lock().clone();
        let prev_execution: Option<Arc<Execution<In>>> = prev.map(|p| {
            let p2 = p.clone();
            p.exec_dyn(p2, ctx)
        });

        ctx.depth -= 1;
        drop(tracer);

        let result: Future<Out> = Future::new();
        // Snapshot the accumulated guard set now, but re-evaluate
        // `any_broken` at the moment the stage actually dispatches rather
        // than once here: spec.md §4.3 step 7 passes a freshly computed
        // `guardIsBroken()` into `runExecution` on each call, not a value
        // captured once at chain-build time. A guard can break any time
        // between this call and an async predecessor's future finishing, so
        // the check below is repeated inside the deferred watcher too.
        let guards: Vec<Guard> = ctx.guards.clone();

        let pending: Option<Box<dyn std::any::Any + Send + Sync>> = if let Some(prev_exec) = &prev_execution {
            let prev_future = prev_exec.result().clone();
            if prev_future.is_finished() {
                if guard::any_broken(&guards) {
                    result.set_finished();
                } else {
                    let (value, error) = prev_future.snapshot();
                    run_stage(self.mode, &self.continuation, &self.passthrough, error, value, &result);
                }
                None
            } else {
                let mode = self.mode;
                let continuation = self.continuation.clone();
                let passthrough = self.passthrough.clone();
                let result2 = result.clone();
                let watcher: FutureWatcher<In> = FutureWatcher::new();
                watcher.on_ready(move |value, error| {
                    if guard::any_broken(&guards) {
                        result2.set_finished();
                    } else {
                        run_stage(mode, &continuation, &passthrough, error, value, &result2);
                    }
                });
                watcher.set_future(prev_future);
                Some(Box::new(watcher))
            }
        } else if guard::any_broken(&guards) {
            result.set_finished();
            None
        } else {
            // Never linked: a programming error elsewhere left this node
            // without a predecessor. There is nothing to run against, so the
            // result simply never finishes.
            None
        };

        Arc::new(Execution::new(
            self_arc,
            prev_execution.map(|e| e as Arc<dyn AnyExecution>),
            result,
            pending,
        ))
    }
}

impl<In, Out> ExecutorRoot<In> for Executor<In, Out>
where
    In: Clone + Send + Sync + 'static,
    Out: Clone + Send + Sync + 'static,
{
    fn link(&self, prev: Arc<dyn ExecutorDyn<In>>) -> Result<(), RelayError> {
        let mut slot = self.prev.lock();
        if slot.is_some() {
            return Err(RelayError::AlreadyLinked);
        }
        *slot = Some(prev);
        Ok(())
    }

    fn swap(&self, prev: Arc<dyn ExecutorDyn<In>>) -> Option<Arc<dyn ExecutorDyn<In>>> {
        self.prev.lock().replace(prev)
    }

    fn restore(&self, prev: Option<Arc<dyn ExecutorDyn<In>>>) {
        *self.prev.lock() = prev;
    }
}

fn run_stage<In, Out>(
    mode: Mode,
    continuation: &Continuation<In, Out>,
    passthrough: &Option<Arc<dyn Fn(In) -> Out + Send + Sync>>,
    error: Option<Error>,
    value: Option<In>,
    result: &Future<Out>,
) where
    In: Clone + Send + Sync + 'static,
    Out: Clone + Send + Sync + 'static,
{
    match mode {
        Mode::GoodCase => match error {
            Some(e) => result.set_error(e),
            None => {
                let value = value.unwrap_or_else(|| unreachable!("GoodCase stage with no error but no value"));
                invoke(continuation, value, result);
            }
        },
        Mode::ErrorCase => match error {
            Some(e) => invoke_error(continuation, e, result),
            None => {
                let value = value.unwrap_or_else(|| unreachable!("ErrorCase stage with no error but no value"));
                let passthrough = passthrough.as_ref().expect("ErrorCase stage without a passthrough");
                result.set_result(passthrough(value));
            }
        },
        Mode::Always => {
            if let Continuation::Always(f) = continuation {
                f(error, value, result.clone());
            } else {
                unreachable!("Always mode stage built without an Always continuation");
            }
        }
    }
}

fn invoke<In, Out>(continuation: &Continuation<In, Out>, value: In, result: &Future<Out>)
where
    In: Clone + Send + Sync + 'static,
    Out: Clone + Send + Sync + 'static,
{
    match continuation {
        Continuation::Sync(f) => {
            let f = f.clone();
            match std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || f(value))) {
                Ok(out) => result.set_result(out),
                Err(payload) => result.set_error(crate::error::panic_to_error(payload)),
            }
        }
        Continuation::Async(f) => f(value, result.clone()),
        Continuation::Job(f) => bridge_job(f(value), result.clone()),
        _ => unreachable!("GoodCase stage built with a non-GoodCase continuation"),
    }
}

fn invoke_error<In, Out>(continuation: &Continuation<In, Out>, error: Error, result: &Future<Out>)
where
    In: Clone + Send + Sync + 'static,
    Out: Clone + Send + Sync + 'static,
{
    match continuation {
        Continuation::SyncError(f) => {
            let f = f.clone();
            match std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || f(error))) {
                Ok(out) => result.set_result(out),
                Err(payload) => result.set_error(crate::error::panic_to_error(payload)),
            }
        }
        Continuation::AsyncError(f) => f(error, result.clone()),
        Continuation::JobError(f) => bridge_job(f(error), result.clone()),
        _ => unreachable!("ErrorCase stage built with a non-ErrorCase continuation"),
    }
}

/// Keeps a job-bridge's forwarding watcher alive between the moment it is
/// attached and the moment it fires. The watcher can't live inside the
/// `Execution` of either side of the bridge without creating a reference
/// cycle (its callback closes over the outer result future, which the
/// `Execution` itself already owns), so instead it parks here under a
/// throwaway id and removes itself once notified.
fn bridge_registry() -> &'static Mutex<std::collections::HashMap<u64, Box<dyn std::any::Any + Send + Sync>>> {
    static REGISTRY: std::sync::OnceLock<Mutex<std::collections::HashMap<u64, Box<dyn std::any::Any + Send + Sync>>>> =
        std::sync::OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(std::collections::HashMap::new()))
}

pub(crate) fn bridge_job<Out: Clone + Send + Sync + 'static>(sub: Job<Out>, result: Future<Out>) {
    let sub_result = sub.exec();
    if sub_result.is_finished() {
        forward(&sub_result, &result);
        return;
    }

    static NEXT_BRIDGE_ID: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(1);
    let id = NEXT_BRIDGE_ID.fetch_add(1, std::sync::atomic::Ordering::Relaxed);

    let watcher: FutureWatcher<Out> = FutureWatcher::new();
    let result2 = result.clone();
    watcher.on_ready(move |value, error| {
        match error {
            Some(e) => result2.set_error(e),
            None => result2.set_result(value.unwrap_or_else(|| unreachable!("finished without error but no value"))),
        }
        bridge_registry().lock().remove(&id);
    });
    watcher.set_future(sub_result.clone());
    // Retain `sub_result` itself, not just `watcher`: the watcher only holds
    // a `Weak` registration on it, and `sub_result`'s own keepalive is the
    // only strong reference holding a multi-stage sub-job's `Execution`
    // chain alive until it actually finishes.
    bridge_registry().lock().insert(id, Box::new((sub_result, watcher)));
}

/// A leaf node that already knows its outcome: the head of every trivial job
/// (`value`, `null`, `error`) and the temporary seed spliced in for
/// `exec(initialValue)`.
pub(crate) struct ConstSource<T> {
    outcome: Result<T, Error>,
}

impl<T: Clone + Send + Sync + 'static> ConstSource<T> {
    pub(crate) fn value(value: T) -> Arc<Self> {
        Arc::new(ConstSource { outcome: Ok(value) })
    }

    pub(crate) fn error(error: Error) -> Arc<Self> {
        Arc::new(ConstSource { outcome: Err(error) })
    }
}

impl<T: Clone + Send + Sync + 'static> ExecutorDyn<T> for ConstSource<T> {
    fn exec_dyn(&self, self_arc: Arc<dyn ExecutorDyn<T>>, _ctx: &mut ExecutionContext) -> Arc<Execution<T>> {
        let result = Future::new();
        match &self.outcome {
            Ok(value) => result.set_result(value.clone()),
            Err(error) => result.set_error(error.clone()),
        }
        Arc::new(Execution::new(self_arc, None, result, None))
    }
}

/// `ConstSource` never reads a predecessor, so acting as a root for `In = ()`
/// is a pure no-op; this exists only so trivial jobs can share the same
/// `Job<T, In>` shape as every other job.
impl<T: Clone + Send + Sync + 'static> ExecutorRoot<()> for ConstSource<T> {
    fn link(&self, _prev: Arc<dyn ExecutorDyn<()>>) -> Result<(), RelayError> {
        Ok(())
    }

    fn swap(&self, _prev: Arc<dyn ExecutorDyn<()>>) -> Option<Arc<dyn ExecutorDyn<()>>> {
        None
    }

    fn restore(&self, _prev: Option<Arc<dyn ExecutorDyn<()>>>) {}
}

fn forward<Out: Clone + Send + Sync + 'static>(from: &Future<Out>, to: &Future<Out>) {
    let (value, error) = from.snapshot();
    match error {
        Some(e) => to.set_error(e),
        None => to.set_result(value.unwrap_or_else(|| unreachable!("finished without error but no value"))),
    }
}
