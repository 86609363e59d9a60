//! `relay_core`: a composable, statically-typed graph of lazy job chains.
//!
//! A [`Job`] describes a chain of continuations without running anything;
//! calling [`Job::exec`] (or [`Job::exec_with`]) builds one independent
//! [`Execution`](execution::Execution) and returns its outcome as a
//! [`Future`].

mod error;
mod execution;
mod executor;
mod guard;
mod tracer;

pub mod combinators;
pub mod event_loop;
pub mod future;
pub mod job;

pub use error::{Error, RelayError, PANIC_ERROR_CODE};
pub use event_loop::EventLoop;
pub use executor::Mode;
pub use future::{Future, FutureWatcher, Progress};
pub use guard::{guard_of, Guard, GuardToken};
pub use job::Job;

pub use combinators::{
    do_while, wait_for_completion, wait_for_completion_collecting, Container, ControlFlow,
};
