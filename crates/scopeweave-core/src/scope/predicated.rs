//! A scope gated by a predicate.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use tracing::debug;

use crate::channel::{EventStream, Subscription};
use crate::scheduler::Scheduler;

use super::{Channels, Scope, SharedScope, watch};

/// Gates a delegate scope by a side-effect-free predicate.
///
/// The predicate is sampled at construction and again each time the
/// delegate enters; it is not re-evaluated on queries. A predicate that turns
/// false between delegate enters therefore does not exit this scope until the
/// delegate enters again.
///
/// Exits of the delegate are passed through unfiltered, including exits that
/// follow an enter the predicate suppressed.
pub struct PredicatedScope<P = ()> {
    inner: Rc<PredicatedInner<P>>,
}

struct PredicatedInner<P> {
    predicate: Box<dyn Fn() -> bool>,
    delegate: SharedScope<P>,
    sampled: Cell<bool>,
    channels: Channels<P>,
    subscriptions: RefCell<Vec<Subscription>>,
}

impl<P> Clone for PredicatedScope<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<P: Clone + 'static> PredicatedScope<P> {
    /// Gates `delegate` by `predicate`.
    #[must_use]
    pub fn new(predicate: impl Fn() -> bool + 'static, delegate: SharedScope<P>) -> Self {
        let sampled = predicate();
        let channels = Channels::new(delegate.scheduler(), "predicated.enter", "predicated.exit");
        let inner = Rc::new(PredicatedInner {
            predicate: Box::new(predicate),
            delegate,
            sampled: Cell::new(sampled),
            channels,
            subscriptions: RefCell::new(Vec::new()),
        });

        let enter = inner.delegate.on_enter();
        let exit = inner.delegate.on_exit();
        let mut subscriptions = Vec::with_capacity(2);

        let (on_value, on_close) = (Rc::downgrade(&inner), Rc::downgrade(&inner));
        subscriptions.extend(watch(
            &enter,
            move |payload| with(&on_value, |scope| scope.delegate_entered(payload)),
            move || with(&on_close, |scope| scope.channels.enter.close()),
        ));

        let (on_value, on_close) = (Rc::downgrade(&inner), Rc::downgrade(&inner));
        subscriptions.extend(watch(
            &exit,
            move |payload| with(&on_value, |scope| scope.channels.emit_exit(payload.clone())),
            move || with(&on_close, |scope| scope.channels.exit.close()),
        ));
        inner.subscriptions.borrow_mut().extend(subscriptions);

        Self { inner }
    }

    /// A type-erased handle to this scope.
    #[must_use]
    pub fn shared(&self) -> SharedScope<P> {
        SharedScope::new(self.clone())
    }
}

fn with<P>(inner: &Weak<PredicatedInner<P>>, f: impl FnOnce(&PredicatedInner<P>)) {
    if let Some(inner) = inner.upgrade() {
        f(&inner);
    }
}

impl<P: Clone + 'static> PredicatedInner<P> {
    fn delegate_entered(&self, payload: &P) {
        let allowed = (self.predicate)();
        self.sampled.set(allowed);
        if allowed {
            self.channels.emit_enter(payload.clone());
        } else {
            debug!("delegate entered but predicate rejected it");
        }
    }
}

impl<P: Clone + 'static> Scope<P> for PredicatedScope<P> {
    fn is_entered(&self) -> bool {
        self.inner.sampled.get() && self.inner.delegate.is_entered()
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
        self.inner.channels.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::SettableScope;

    fn counter(stream: &EventStream<()>) -> (Rc<Cell<u32>>, Subscription) {
        let count = Rc::new(Cell::new(0));
        let sink = Rc::clone(&count);
        let sub = stream.listen(move |_| sink.set(sink.get() + 1)).unwrap();
        (count, sub)
    }

    #[test]
    fn test_false_predicate_over_entered_delegate_is_not_entered() {
        // Arrange
        let scheduler = Scheduler::new();
        let delegate = SettableScope::new(&scheduler, true);
        let allowed = Rc::new(Cell::new(false));
        let gate = Rc::clone(&allowed);

        // Act
        let scope = delegate.shared().when(move || gate.get());
        let (enters, _sub) = counter(&scope.on_enter());

        // Assert
        assert!(!scope.is_entered());
        allowed.set(true);
        assert!(!scope.is_entered(), "predicate is only re-sampled on enter");
        assert_eq!(enters.get(), 0);

        delegate.exit(()).unwrap();
        delegate.enter(()).unwrap();
        assert!(scope.is_entered());
        assert_eq!(enters.get(), 1);
    }

    #[test]
    fn test_rejected_enter_is_not_emitted() {
        let scheduler = Scheduler::new();
        let delegate = SettableScope::new(&scheduler, false);
        let scope = PredicatedScope::new(|| false, delegate.shared());
        let (enters, _sub) = counter(&scope.on_enter());

        delegate.enter(()).unwrap();

        assert_eq!(enters.get(), 0);
        assert!(!scope.is_entered());
    }

    #[test]
    fn test_predicate_turning_false_does_not_retroactively_exit() {
        let scheduler = Scheduler::new();
        let delegate = SettableScope::new(&scheduler, false);
        let allowed = Rc::new(Cell::new(true));
        let gate = Rc::clone(&allowed);
        let scope = PredicatedScope::new(move || gate.get(), delegate.shared());

        delegate.enter(()).unwrap();
        allowed.set(false);

        assert!(scope.is_entered());
    }

    // Known quirk: exits pass through even when the matching enter was
    // suppressed by the predicate.
    #[test]
    fn test_quirk_exit_passes_through_after_suppressed_enter() {
        // Arrange
        let scheduler = Scheduler::new();
        let delegate = SettableScope::new(&scheduler, false);
        let scope = PredicatedScope::new(|| false, delegate.shared());
        let (exits, _sub) = counter(&scope.on_exit());

        // Act
        delegate.enter(()).unwrap();
        delegate.exit(()).unwrap();

        // Assert
        assert_eq!(exits.get(), 1);
        assert!(!scope.is_entered());
    }

    #[test]
    fn test_delegate_close_closes_channels() {
        let scheduler = Scheduler::new();
        let delegate = SettableScope::<()>::new(&scheduler, false);
        let scope = PredicatedScope::new(|| true, delegate.shared());

        delegate.close();

        assert!(scope.on_enter().is_closed());
        assert!(scope.on_exit().is_closed());
    }

    #[test]
    fn test_dispose_releases_delegate_listeners() {
        let scheduler = Scheduler::new();
        let delegate = SettableScope::<()>::new(&scheduler, false);
        let scope = PredicatedScope::new(|| true, delegate.shared());
        assert_eq!(delegate.on_enter().listener_count(), 1);

        scope.dispose();

        assert_eq!(delegate.on_enter().listener_count(), 0);
        assert_eq!(delegate.on_exit().listener_count(), 0);
        assert!(scope.on_enter().is_closed());
    }
}
