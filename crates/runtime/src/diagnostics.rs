//! Process-wide panic and logging setup for `relay`-hosted programs.
//!
//! Debug builds get `better_panic`'s verbose, immediate stack traces;
//! release builds get `human_panic`'s user-facing crash report instead of a
//! raw backtrace. Either way a `tracing` subscriber is installed first, so
//! continuations that log through `tracing` (or the `trace!`/`debug!` spans
//! emitted by [`relay_core::job::Job`] executions) have somewhere to go.

use std::io;
use std::panic;
use std::sync::Once;

use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

static INIT: Once = Once::new();

/// Installs the panic hook and a stderr `tracing` subscriber. Idempotent —
/// only the first call takes effect, the same way `tracing`'s own
/// `try_init` behaves when a subscriber is already set.
pub fn install_panic_handler() {
    INIT.call_once(|| {
        let env_filter = EnvFilter::from_default_env().add_directive(LevelFilter::INFO.into());
        let console_layer = fmt::Layer::new().with_writer(io::stderr);
        let _ = tracing_subscriber::registry().with(env_filter).with(console_layer).try_init();

        #[cfg(debug_assertions)]
        {
            better_panic::Settings::auto().most_recent_first(false).lineno_suffix(true).install();
        }

        #[cfg(not(debug_assertions))]
        {
            human_panic::setup_panic!();
        }

        let original_hook = panic::take_hook();
        panic::set_hook(Box::new(move |panic_info| {
            tracing::error!(
                target: "panic_handler",
                location = %panic_info.location().map_or_else(|| "unknown".to_string(), |l| l.to_string()),
                "application panicked"
            );
            original_hook(panic_info);
        }));
    });
}
