//! Lifetime-driven coarse cancellation.
//!
//! A guard is a weak reference to some object the caller owns. When that
//! object is gone, any stage carrying the guard is skipped without error the
//! next time its `Execution` is built — it does *not* interrupt work already
//! in flight, since the library has no way to preempt a running continuation.

use std::sync::Arc;
use std::sync::Weak;

pub trait GuardToken: Send + Sync {
    fn is_broken(&self) -> bool;
}

pub type Guard = Arc<dyn GuardToken>;

struct WeakGuard<T: ?Sized>(Weak<T>);

impl<T: Send + Sync + ?Sized> GuardToken for WeakGuard<T> {
    fn is_broken(&self) -> bool {
        self.0.upgrade().is_none()
    }
}

/// Builds a [`Guard`] tied to `owner`'s lifetime: once every `Arc<T>` handle
/// to `owner` is dropped, the guard reports broken.
pub fn guard_of<T: Send + Sync + 'static>(owner: &Arc<T>) -> Guard {
    Arc::new(WeakGuard(Arc::downgrade(owner)))
}

pub(crate) fn any_broken(guards: &[Guard]) -> bool {
    guards.iter().any(|g| g.is_broken())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_breaks_when_owner_drops() {
        let owner = Arc::new(42);
        let guard = guard_of(&owner);
        assert!(!guard.is_broken());
        drop(owner);
        assert!(guard.is_broken());
    }

    #[test]
    fn guard_stays_alive_while_owner_has_other_handles() {
        let owner = Arc::new("x".to_string());
        let guard = guard_of(&owner);
        let owner2 = owner.clone();
        drop(owner);
        assert!(!guard.is_broken());
        drop(owner2);
        assert!(guard.is_broken());
    }
}
