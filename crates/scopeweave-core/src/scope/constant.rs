//! Scopes whose state never changes.

use std::rc::Rc;

use crate::channel::EventStream;
use crate::scheduler::Scheduler;

use super::{Channels, Scope, SharedScope};

/// A scope that is always entered or never entered. It never emits.
pub struct ConstantScope<P = ()> {
    inner: Rc<ConstantInner<P>>,
}

struct ConstantInner<P> {
    entered: bool,
    channels: Channels<P>,
}

impl<P> Clone for ConstantScope<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<P: Clone + 'static> ConstantScope<P> {
    /// A scope that is entered forever.
    #[must_use]
    pub fn always(scheduler: &Scheduler) -> Self {
        Self::with_state(scheduler, true)
    }

    /// A scope that is never entered.
    #[must_use]
    pub fn never(scheduler: &Scheduler) -> Self {
        Self::with_state(scheduler, false)
    }

    fn with_state(scheduler: &Scheduler, entered: bool) -> Self {
        Self {
            inner: Rc::new(ConstantInner {
                entered,
                channels: Channels::new(scheduler, "constant.enter", "constant.exit"),
            }),
        }
    }

    /// A type-erased handle to this scope.
    #[must_use]
    pub fn shared(&self) -> SharedScope<P> {
        SharedScope::new(self.clone())
    }
}

impl<P: Clone + 'static> Scope<P> for ConstantScope<P> {
    fn is_entered(&self) -> bool {
        self.inner.entered
    }

    fn on_enter(&self) -> EventStream<P> {
        self.inner.channels.enter.stream()
    }

    fn on_exit(&self) -> EventStream<P> {
        self.inner.channels.exit.stream()
    }

    fn scheduler(&self) -> &Scheduler {
        self.inner.channels.enter.scheduler()
    }

    fn dispose(&self) {
        self.inner.channels.close();
    }

    fn constant(&self) -> Option<bool> {
        Some(self.inner.entered)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    #[test]
    fn test_always_when_true_yields_itself() {
        let scheduler = Scheduler::new();
        let always = ConstantScope::<()>::always(&scheduler).shared();

        let gated = always.when(|| true);

        assert!(gated.ptr_eq(&always));
        assert!(gated.is_entered());
    }

    #[test]
    fn test_always_when_false_yields_never() {
        let scheduler = Scheduler::new();
        let always = ConstantScope::<()>::always(&scheduler).shared();

        let gated = always.when(|| false);

        assert!(!gated.ptr_eq(&always));
        assert!(!gated.is_entered());
    }

    #[test]
    fn test_predicate_on_constant_scope_is_evaluated_once() {
        // Arrange
        let scheduler = Scheduler::new();
        let always = ConstantScope::<()>::always(&scheduler).shared();
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);

        // Act
        let gated = always.when(move || {
            counter.set(counter.get() + 1);
            true
        });
        let _ = (gated.is_entered(), gated.is_entered());

        // Assert
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_never_ignores_predicate() {
        let scheduler = Scheduler::new();
        let never = ConstantScope::<()>::never(&scheduler).shared();

        let gated = never.when(|| true);

        assert!(gated.ptr_eq(&never));
        assert!(!gated.is_entered());
        assert_eq!(never.on_enter().listener_count(), 0);
    }
}
