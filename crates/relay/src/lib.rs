//! `relay`: re-exports [`relay_core`] and [`relay_runtime`] as a single
//! dependency, so downstream consumers don't need to depend on both crates
//! separately.

pub use relay_core::*;
pub use relay_runtime::*;

pub mod prelude {
    pub use super::*;
}
