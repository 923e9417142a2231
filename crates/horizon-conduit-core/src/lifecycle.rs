//! Two-state lifecycle for transport objects.
//!
//! Every transport object is either active or disposed, and the transition
//! happens at most once. Public operations call [`Lifecycle::ensure_active`]
//! first so that post-disposal access fails fast with a [`DisposedError`]
//! instead of operating on torn-down resources.

use std::sync::atomic::{AtomicBool, Ordering};

/// Current state of a disposable object.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleState {
    /// The object is live and usable.
    Active,
    /// The object has been torn down; all operations fail fast.
    Disposed,
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "Active"),
            Self::Disposed => write!(f, "Disposed"),
        }
    }
}

/// Access to an object after it was disposed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot access {component} after disposal")]
pub struct DisposedError {
    /// Name of the component that rejected the access.
    pub component: &'static str,
}

/// The shared active/disposed state of one transport object.
///
/// Disposal is idempotent and thread-safe: [`dispose`](Self::dispose) returns
/// `true` for exactly one caller, which is the caller responsible for ordered
/// teardown (stopping loops, emitting the final event).
pub struct Lifecycle {
    component: &'static str,
    disposed: AtomicBool,
}

impl Lifecycle {
    /// Create an active lifecycle for the named component.
    ///
    /// The name appears in [`DisposedError`] messages.
    pub fn new(component: &'static str) -> Self {
        Self {
            component,
            disposed: AtomicBool::new(false),
        }
    }

    /// The current state.
    pub fn state(&self) -> LifecycleState {
        if self.is_disposed() {
            LifecycleState::Disposed
        } else {
            LifecycleState::Active
        }
    }

    /// Whether the object has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Fail-fast guard for public operations.
    pub fn ensure_active(&self) -> Result<(), DisposedError> {
        if self.is_disposed() {
            Err(DisposedError {
                component: self.component,
            })
        } else {
            Ok(())
        }
    }

    /// Transition to disposed.
    ///
    /// Returns `true` iff this call performed the transition. Later calls
    /// (and racing calls on other threads) return `false`.
    pub fn dispose(&self) -> bool {
        let first = !self.disposed.swap(true, Ordering::SeqCst);
        if first {
            tracing::debug!(
                target: "horizon_conduit_core::lifecycle",
                component = self.component,
                "disposed"
            );
        }
        first
    }
}

impl std::fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lifecycle")
            .field("component", &self.component)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_active() {
        let lifecycle = Lifecycle::new("Widget");
        assert_eq!(lifecycle.state(), LifecycleState::Active);
        assert!(!lifecycle.is_disposed());
        assert!(lifecycle.ensure_active().is_ok());
    }

    #[test]
    fn dispose_transitions_once() {
        let lifecycle = Lifecycle::new("Widget");
        assert!(lifecycle.dispose());
        assert!(!lifecycle.dispose());
        assert_eq!(lifecycle.state(), LifecycleState::Disposed);
    }

    #[test]
    fn ensure_active_fails_after_dispose() {
        let lifecycle = Lifecycle::new("Widget");
        lifecycle.dispose();

        let err = lifecycle.ensure_active().unwrap_err();
        assert_eq!(err.component, "Widget");
        assert_eq!(err.to_string(), "cannot access Widget after disposal");
    }
}
