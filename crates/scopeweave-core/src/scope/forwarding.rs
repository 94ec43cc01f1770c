//! A scope that mirrors a replaceable delegate.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use tracing::debug;

use crate::channel::{EventStream, Subscription};
use crate::scheduler::Scheduler;

use super::{Channels, Scope, SharedScope, watch};

/// Mirrors whichever delegate it currently points at.
///
/// Re-targeting drops the registrations on the previous delegate and
/// registers on the new one. If the new delegate is already entered, an
/// enter is emitted right away even though the delegate itself did not
/// transition. If the mirror was entered and the new delegate is not, an
/// exit is emitted. Synthesized notifications carry `P::default()`.
///
/// Without a delegate the scope is not entered.
pub struct ForwardingScope<P = ()> {
    inner: Rc<ForwardingInner<P>>,
}

struct ForwardingInner<P> {
    delegate: RefCell<Option<SharedScope<P>>>,
    channels: Channels<P>,
    subscriptions: RefCell<Vec<Subscription>>,
}

impl<P> Clone for ForwardingScope<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<P: Clone + Default + 'static> ForwardingScope<P> {
    /// Creates a mirror without a delegate.
    #[must_use]
    pub fn new(scheduler: &Scheduler) -> Self {
        Self {
            inner: Rc::new(ForwardingInner {
                delegate: RefCell::new(None),
                channels: Channels::new(scheduler, "forwarding.enter", "forwarding.exit"),
                subscriptions: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Creates a mirror of `delegate`.
    #[must_use]
    pub fn of(delegate: &SharedScope<P>) -> Self {
        let scope = Self::new(delegate.scheduler());
        scope.set_delegate(delegate);
        scope
    }

    /// The current delegate, if any.
    #[must_use]
    pub fn delegate(&self) -> Option<SharedScope<P>> {
        self.inner.delegate.borrow().clone()
    }

    /// Points the mirror at `delegate`.
    pub fn set_delegate(&self, delegate: &SharedScope<P>) {
        let was_entered = self.is_entered();
        self.inner.subscriptions.borrow_mut().clear();
        *self.inner.delegate.borrow_mut() = Some(delegate.clone());

        // Register before emitting so a listener reacting to the synthesized
        // enter cannot slip a delegate transition past the mirror.
        let mut subscriptions = Vec::with_capacity(2);
        let weak = Rc::downgrade(&self.inner);
        subscriptions.extend(watch(
            &delegate.on_enter(),
            move |payload| with(&weak, |scope| scope.channels.emit_enter(payload.clone())),
            || {},
        ));
        let weak = Rc::downgrade(&self.inner);
        subscriptions.extend(watch(
            &delegate.on_exit(),
            move |payload| with(&weak, |scope| scope.channels.emit_exit(payload.clone())),
            || {},
        ));
        *self.inner.subscriptions.borrow_mut() = subscriptions;

        debug!(entered = delegate.is_entered(), "forwarding scope re-targeted");
        if delegate.is_entered() {
            self.inner.channels.emit_enter(P::default());
        } else if was_entered {
            self.inner.channels.emit_exit(P::default());
        }
    }

    /// Detaches from the current delegate, emitting an exit if the mirror
    /// was entered.
    pub fn clear_delegate(&self) {
        let was_entered = self.is_entered();
        self.inner.subscriptions.borrow_mut().clear();
        self.inner.delegate.borrow_mut().take();
        if was_entered {
            self.inner.channels.emit_exit(P::default());
        }
    }

    /// A type-erased handle to this scope.
    #[must_use]
    pub fn shared(&self) -> SharedScope<P> {
        SharedScope::new(self.clone())
    }
}

fn with<P>(inner: &Weak<ForwardingInner<P>>, f: impl FnOnce(&ForwardingInner<P>)) {
    if let Some(inner) = inner.upgrade() {
        f(&inner);
    }
}

impl<P: Clone + 'static> Scope<P> for ForwardingScope<P> {
    fn is_entered(&self) -> bool {
        self.inner
            .delegate
            .borrow()
            .as_ref()
            .is_some_and(SharedScope::is_entered)
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
        self.inner.subscriptions.borrow_mut().clear();
        self.inner.delegate.borrow_mut().take();
        self.inner.channels.close();
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::scope::SettableScope;

    fn counters(scope: &ForwardingScope) -> (Rc<Cell<u32>>, Rc<Cell<u32>>, Vec<Subscription>) {
        let (enters, exits) = (Rc::new(Cell::new(0)), Rc::new(Cell::new(0)));
        let sink = Rc::clone(&enters);
        let on_enter = scope
            .on_enter()
            .listen(move |_| sink.set(sink.get() + 1))
            .unwrap();
        let sink = Rc::clone(&exits);
        let on_exit = scope
            .on_exit()
            .listen(move |_| sink.set(sink.get() + 1))
            .unwrap();
        (enters, exits, vec![on_enter, on_exit])
    }

    #[test]
    fn test_retarget_to_entered_delegate_emits_enter() {
        // Arrange
        let scheduler = Scheduler::new();
        let first = SettableScope::new(&scheduler, true);
        let second = SettableScope::new(&scheduler, true);
        let mirror = ForwardingScope::of(&first.shared());
        let (enters, exits, _subs) = counters(&mirror);

        // Act
        mirror.set_delegate(&second.shared());

        // Assert
        assert_eq!(enters.get(), 1);
        assert_eq!(exits.get(), 0);
        assert!(mirror.is_entered());
    }

    #[test]
    fn test_old_delegate_is_no_longer_forwarded() {
        let scheduler = Scheduler::new();
        let first = SettableScope::new(&scheduler, false);
        let second = SettableScope::new(&scheduler, false);
        let mirror = ForwardingScope::of(&first.shared());
        let (enters, _exits, _subs) = counters(&mirror);

        mirror.set_delegate(&second.shared());
        first.enter(()).unwrap();
        assert_eq!(enters.get(), 0);
        second.enter(()).unwrap();

        assert_eq!(enters.get(), 1);
        assert_eq!(first.on_enter().listener_count(), 0);
    }

    #[test]
    fn test_retarget_from_entered_to_exited_delegate_emits_exit() {
        let scheduler = Scheduler::new();
        let open = SettableScope::new(&scheduler, true);
        let shut = SettableScope::new(&scheduler, false);
        let mirror = ForwardingScope::of(&open.shared());
        let (enters, exits, _subs) = counters(&mirror);

        mirror.set_delegate(&shut.shared());

        assert_eq!(enters.get(), 0);
        assert_eq!(exits.get(), 1);
        assert!(!mirror.is_entered());
    }

    #[test]
    fn test_detached_mirror_is_not_entered() {
        let scheduler = Scheduler::new();
        let open = SettableScope::new(&scheduler, true);
        let mirror = ForwardingScope::of(&open.shared());
        let (_enters, exits, _subs) = counters(&mirror);

        mirror.clear_delegate();

        assert!(!mirror.is_entered());
        assert!(mirror.delegate().is_none());
        assert_eq!(exits.get(), 1);
    }

    #[test]
    fn test_dispose_releases_delegate_listeners() {
        let scheduler = Scheduler::new();
        let delegate = SettableScope::<()>::new(&scheduler, true);
        let mirror = ForwardingScope::of(&delegate.shared());
        assert_eq!(delegate.on_exit().listener_count(), 1);

        mirror.dispose();

        assert_eq!(delegate.on_enter().listener_count(), 0);
        assert_eq!(delegate.on_exit().listener_count(), 0);
        assert!(mirror.delegate().is_none());
        assert!(mirror.on_exit().is_closed());
    }
}
