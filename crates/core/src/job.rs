use std::sync::Arc;

use crate::error::{Error, RelayError};
use crate::execution::ExecutionContext;
use crate::executor::{ConstSource, Continuation, Executor, ExecutorDyn, ExecutorRoot, Mode};
use crate::future::Future;
use crate::guard::Guard;

/// A declarative, reusable chain of continuations. Building a `Job` (`start`,
/// `then`, `on_error`, ...) never runs anything; each `exec()`/`exec_with`
/// call builds one independent [`crate::execution::Execution`] chain and
/// returns its result as a fresh [`Future`].
///
/// `In` defaults to `()` — most jobs are built with `start` and need no
/// external seed. Jobs with a genuine `In` are built with `seeded`/
/// `seeded_async` and driven with `exec_with`, or spliced onto a preceding
/// job with `then_job`.
pub struct Job<Out, In = ()> {
    tail: Arc<dyn ExecutorDyn<Out>>,
    root: Arc<dyn ExecutorRoot<In>>,
}

impl<Out> Job<Out, ()>
where
    Out: Clone + Send + Sync + 'static,
{
    /// Builds a job whose head ignores its (unit) input.
    pub fn start(f: impl Fn() -> Out + Send + Sync + 'static) -> Self {
        Self::seeded(move |_: ()| f())
    }

    /// Async-shaped variant of [`Job::start`]: the continuation finishes
    /// `result` itself, synchronously or later.
    pub fn start_async(f: impl Fn(Future<Out>) + Send + Sync + 'static) -> Self {
        Self::seeded_async(move |_: (), result| f(result))
    }

    pub fn value(value: Out) -> Self {
        let source = ConstSource::value(value);
        Job { tail: source.clone(), root: source }
    }

    pub fn error(error: Error) -> Self {
        let source = ConstSource::<Out>::error(error);
        Job { tail: source.clone(), root: source }
    }
}

impl<Out> Job<Out, ()>
where
    Out: Clone + Send + Sync + 'static + Default,
{
    pub fn null() -> Self {
        Self::value(Out::default())
    }
}

impl<Out, In> Job<Out, In>
where
    Out: Clone + Send + Sync + 'static,
    In: Clone + Send + Sync + 'static,
{
    pub fn seeded(f: impl Fn(In) -> Out + Send + Sync + 'static) -> Self {
        let executor = Executor::new_root(Continuation::Sync(Arc::new(f)), Mode::GoodCase, "start");
        Job { tail: executor.clone(), root: executor }
    }

    pub fn seeded_async(f: impl Fn(In, Future<Out>) + Send + Sync + 'static) -> Self {
        let executor = Executor::new_root(Continuation::Async(Arc::new(f)), Mode::GoodCase, "start_async");
        Job { tail: executor.clone(), root: executor }
    }

    /// Appends a synchronous continuation. Alias for [`Job::then_fn`].
    pub fn then<NewOut>(self, f: impl Fn(Out) -> NewOut + Send + Sync + 'static) -> Job<NewOut, In>
    where
        NewOut: Clone + Send + Sync + 'static,
    {
        self.then_fn(f)
    }

    pub fn then_fn<NewOut>(self, f: impl Fn(Out) -> NewOut + Send + Sync + 'static) -> Job<NewOut, In>
    where
        NewOut: Clone + Send + Sync + 'static,
    {
        let executor = Executor::new_linked(self.tail, Continuation::Sync(Arc::new(f)), Mode::GoodCase, Vec::new(), "then");
        Job { tail: executor.clone(), root: self.root }
    }

    pub fn then_async<NewOut>(self, f: impl Fn(Out, Future<NewOut>) + Send + Sync + 'static) -> Job<NewOut, In>
    where
        NewOut: Clone + Send + Sync + 'static,
    {
        let executor =
            Executor::new_linked(self.tail, Continuation::Async(Arc::new(f)), Mode::GoodCase, Vec::new(), "then_async");
        Job { tail: executor.clone(), root: self.root }
    }

    /// Appends a continuation that produces a fresh sub-job per invocation;
    /// the outer stage finishes once that sub-job's own `exec()` does.
    pub fn then_with_job<NewOut>(self, f: impl Fn(Out) -> Job<NewOut> + Send + Sync + 'static) -> Job<NewOut, In>
    where
        NewOut: Clone + Send + Sync + 'static,
    {
        let executor = Executor::new_linked(self.tail, Continuation::Job(Arc::new(f)), Mode::GoodCase, Vec::new(), "then_with_job");
        Job { tail: executor.clone(), root: self.root }
    }

    /// Structurally splices `next`'s head onto this job's tail, producing one
    /// linear chain. Panics if `next` is already linked into another chain —
    /// use [`Job::try_then_job`] to handle that case instead of panicking.
    pub fn then_job<NewOut>(self, next: Job<NewOut, Out>) -> Job<NewOut, In>
    where
        NewOut: Clone + Send + Sync + 'static,
    {
        self.try_then_job(next).expect("then_job: the spliced job's head is already linked into another chain")
    }

    /// Fallible variant of [`Job::then_job`]: an `Executor` may be spliced
    /// into at most one chain (§3's "referenced by at most one next
    /// Executor" invariant), so reusing a `next` that already has an
    /// upstream link returns [`RelayError::AlreadyLinked`] instead of
    /// panicking.
    pub fn try_then_job<NewOut>(self, next: Job<NewOut, Out>) -> Result<Job<NewOut, In>, RelayError>
    where
        NewOut: Clone + Send + Sync + 'static,
    {
        next.root.link(self.tail)?;
        Ok(Job { tail: next.tail, root: self.root })
    }

    pub fn on_error(self, f: impl Fn(Error) -> Out + Send + Sync + 'static) -> Job<Out, In> {
        let identity: Arc<dyn Fn(Out) -> Out + Send + Sync> = Arc::new(|v: Out| v);
        let executor =
            Executor::new_error_case(self.tail, Continuation::SyncError(Arc::new(f)), identity, Vec::new(), "on_error");
        Job { tail: executor.clone(), root: self.root }
    }

    pub fn on_error_async(self, f: impl Fn(Error, Future<Out>) + Send + Sync + 'static) -> Job<Out, In> {
        let identity: Arc<dyn Fn(Out) -> Out + Send + Sync> = Arc::new(|v: Out| v);
        let executor = Executor::new_error_case(
            self.tail,
            Continuation::AsyncError(Arc::new(f)),
            identity,
            Vec::new(),
            "on_error_async",
        );
        Job { tail: executor.clone(), root: self.root }
    }

    pub fn on_error_job(self, f: impl Fn(Error) -> Job<Out> + Send + Sync + 'static) -> Job<Out, In> {
        let identity: Arc<dyn Fn(Out) -> Out + Send + Sync> = Arc::new(|v: Out| v);
        let executor =
            Executor::new_error_case(self.tail, Continuation::JobError(Arc::new(f)), identity, Vec::new(), "on_error_job");
        Job { tail: executor.clone(), root: self.root }
    }

    /// Appends a stage that always runs, seeing both the predecessor's error
    /// (if any) and value (if any).
    pub fn always<NewOut>(self, f: impl Fn(Option<Error>, Option<Out>) -> NewOut + Send + Sync + 'static) -> Job<NewOut, In>
    where
        NewOut: Clone + Send + Sync + 'static,
    {
        self.always_async(move |error, value, result| result.set_result(f(error, value)))
    }

    pub fn always_async<NewOut>(
        self,
        f: impl Fn(Option<Error>, Option<Out>, Future<NewOut>) + Send + Sync + 'static,
    ) -> Job<NewOut, In>
    where
        NewOut: Clone + Send + Sync + 'static,
    {
        let executor = Executor::new_linked(self.tail, Continuation::Always(Arc::new(f)), Mode::Always, Vec::new(), "always");
        Job { tail: executor.clone(), root: self.root }
    }

    /// Appends a guard: once `guard` reports broken, this stage and every
    /// stage after it in the chain are skipped without error.
    pub fn guarded(self, guard: Guard) -> Job<Out, In> {
        let identity: Arc<dyn Fn(Out) -> Out + Send + Sync> = Arc::new(|v: Out| v);
        let executor =
            Executor::new_linked(self.tail, Continuation::Sync(identity), Mode::GoodCase, vec![guard], "guarded");
        Job { tail: executor.clone(), root: self.root }
    }

    /// Temporarily injects `initial` as the head's input, builds one
    /// independent execution chain, then restores whatever predecessor (if
    /// any) was linked before the call. Not safe to call concurrently with
    /// another `exec`/`exec_with` on the same job sharing an unlinked head.
    pub fn exec_with(&self, initial: In) -> Future<Out> {
        let seed: Arc<dyn ExecutorDyn<In>> = ConstSource::value(initial);
        let saved = self.root.swap(seed);
        let mut ctx = ExecutionContext::new();
        let self_arc = self.tail.clone();
        let execution = self.tail.exec_dyn(self_arc, &mut ctx);
        self.root.restore(saved);

        let result = execution.result().clone();
        let keepalive: Arc<dyn std::any::Any + Send + Sync> = execution;
        result.with_keepalive(keepalive)
    }
}

impl Job<(), ()> {
    /// A job that finishes after `delay`, scheduled on the host's event
    /// loop (see [`crate::event_loop`]). Panics if no [`crate::EventLoop`]
    /// has been installed — call `relay_runtime::install()` first.
    pub fn wait(delay: std::time::Duration) -> Self {
        Job::start_async(move |result: Future<()>| {
            crate::event_loop::current().set_timeout(delay, Box::new(move || result.set_result(())));
        })
    }
}

impl<Out> Job<Out, ()>
where
    Out: Clone + Send + Sync + 'static,
{
    pub fn exec(&self) -> Future<Out> {
        self.exec_with(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_of_sync_stages_finishes_with_the_final_value() {
        let chain = Job::start(|| 2).then(|v| v + 3).then(|v| v * 4).exec();
        assert_eq!(chain.wait_for_finished(), (Some(20), None));
    }

    #[test]
    fn an_error_tunnels_through_an_untouched_stage() {
        let chain = Job::<i32>::error(Error::new(7, "boom")).then(|v| v + 1).exec();
        assert_eq!(chain.wait_for_finished(), (None, Some(Error::new(7, "boom"))));
    }

    #[test]
    fn on_error_recovers_exactly_once() {
        let chain = Job::<i32>::error(Error::new(7, "boom")).on_error(|_e| 42).exec();
        assert_eq!(chain.wait_for_finished(), (Some(42), None));
    }

    #[test]
    fn on_error_is_skipped_on_the_success_path() {
        let chain = Job::value(9).on_error(|_e| 0).exec();
        assert_eq!(chain.wait_for_finished(), (Some(9), None));
    }

    #[test]
    fn always_observes_both_outcomes() {
        let ok = Job::value(1).always(|error, value| (error.is_none(), value)).exec();
        assert_eq!(ok.wait_for_finished(), (Some((true, Some(1))), None));

        let err = Job::<i32>::error(Error::new(1, "x")).always(|error, value| (error.is_some(), value)).exec();
        assert_eq!(err.wait_for_finished(), (Some((true, None)), None));
    }

    #[test]
    fn guarded_stage_is_skipped_without_error_once_its_owner_drops() {
        let owner = Arc::new(());
        let guard = crate::guard::guard_of(&owner);
        drop(owner);
        let chain = Job::start(|| 1).guarded(guard).exec();
        assert_eq!(chain.wait_for_finished(), (None, None));
    }

    #[test]
    fn guarded_stage_is_skipped_when_its_owner_drops_while_the_predecessor_is_still_in_flight() {
        // The predecessor's future is still unfinished when `exec()` returns
        // (it resolves later, from another thread), so the guard check must
        // be re-evaluated when that future actually finishes, not frozen at
        // the value it had when the chain was built.
        let owner = Arc::new(());
        let guard = crate::guard::guard_of(&owner);
        let pending: Future<i32> = Future::new();
        let chain = Job::start_async({
            let pending = pending.clone();
            move |result: Future<i32>| {
                let pending = pending.clone();
                std::thread::spawn(move || {
                    result.set_result(pending.wait_for_finished().0.unwrap());
                });
            }
        })
        .guarded(guard)
        .exec();

        drop(owner);
        pending.set_result(1);

        assert_eq!(chain.wait_for_finished(), (None, None));
    }

    #[test]
    fn then_job_splices_one_job_onto_another() {
        let head: Job<i32> = Job::start(|| 1);
        let tail: Job<i32, i32> = Job::seeded(|v: i32| v + 41);
        let chain = head.then_job(tail).exec();
        assert_eq!(chain.wait_for_finished(), (Some(42), None));
    }

    #[test]
    fn try_then_job_reports_an_error_instead_of_panicking_when_the_spliced_job_is_already_linked() {
        let tail: Job<i32, i32> = Job::seeded(|v: i32| v + 1);
        // A second `Job` handle sharing the same underlying tail/root
        // executors as `tail`, standing in for whatever caller-side mistake
        // would hand the already-linked chain to `try_then_job` a second
        // time.
        let duplicate = Job { tail: tail.tail.clone(), root: tail.root.clone() };

        let first = Job::start(|| 1).try_then_job(tail);
        assert!(first.is_ok());

        let second = Job::start(|| 2).try_then_job(duplicate);
        assert!(matches!(second, Err(RelayError::AlreadyLinked)));
    }

    #[test]
    fn exec_is_reusable_and_every_call_is_independent() {
        let job = Job::start(|| 1).then(|v| v + 1);
        let first = job.exec();
        let second = job.exec();
        assert_eq!(first.wait_for_finished(), (Some(2), None));
        assert_eq!(second.wait_for_finished(), (Some(2), None));
    }

    #[test]
    fn exec_with_seeds_a_job_that_takes_input() {
        let job = Job::seeded(|n: i32| n * n);
        assert_eq!(job.exec_with(6).wait_for_finished(), (Some(36), None));
        assert_eq!(job.exec_with(7).wait_for_finished(), (Some(49), None));
    }
}
