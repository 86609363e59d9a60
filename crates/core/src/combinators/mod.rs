//! Container-aware combinators over [`crate::job::Job`]: the fan-out/fan-in
//! operations (`each`, `for_each`, `serial_for_each`), the aggregation
//! utility `wait_for_completion`, and the `do_while` loop combinator.
//!
//! `each`/`reduce`/`for_each`/`serial_for_each` are added as inherent `impl`
//! blocks on `Job` in their own modules rather than re-exported here — only
//! the free functions and public types need a re-export.

mod container;
mod do_while;
mod each;
mod for_each;
mod keepalive;
mod wait_for_completion;

pub use container::Container;
pub use do_while::{do_while, ControlFlow};
pub use wait_for_completion::{wait_for_completion, wait_for_completion_collecting};
