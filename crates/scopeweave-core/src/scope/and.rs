//! Conjunction of two scopes.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use tracing::debug;

use crate::channel::{EventStream, Subscription};
use crate::scheduler::Scheduler;

use super::{Channels, Scope, SharedScope, watch};

/// Entered while both operands are entered.
///
/// The entered flag is tracked here rather than recomputed from the
/// operands, so an enter fires exactly once, when the second operand enters.
/// Each of the two channels closes once the matching channel of both
/// operands has closed.
pub struct AndScope<P = ()> {
    inner: Rc<AndInner<P>>,
}

struct AndInner<P> {
    first: SharedScope<P>,
    second: SharedScope<P>,
    entered: Cell<bool>,
    enter_done: Cell<u8>,
    exit_done: Cell<u8>,
    channels: Channels<P>,
    subscriptions: RefCell<Vec<Subscription>>,
}

impl<P> Clone for AndScope<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

#[derive(Clone, Copy)]
enum Operand {
    First,
    Second,
}

impl<P: Clone + 'static> AndScope<P> {
    /// Combines `first` and `second`.
    #[must_use]
    pub fn new(first: SharedScope<P>, second: SharedScope<P>) -> Self {
        let entered = first.is_entered() && second.is_entered();
        let channels = Channels::new(first.scheduler(), "and.enter", "and.exit");
        let inner = Rc::new(AndInner {
            first,
            second,
            entered: Cell::new(entered),
            enter_done: Cell::new(0),
            exit_done: Cell::new(0),
            channels,
            subscriptions: RefCell::new(Vec::new()),
        });

        let mut subscriptions = Vec::with_capacity(4);
        for operand in [Operand::First, Operand::Second] {
            let scope = inner.operand(operand).clone();

            let (on_value, on_close) = (Rc::downgrade(&inner), Rc::downgrade(&inner));
            subscriptions.extend(watch(
                &scope.on_enter(),
                move |payload| with(&on_value, |and| and.operand_entered(operand, payload)),
                move || with(&on_close, AndInner::enter_completed),
            ));

            let (on_value, on_close) = (Rc::downgrade(&inner), Rc::downgrade(&inner));
            subscriptions.extend(watch(
                &scope.on_exit(),
                move |payload| with(&on_value, |and| and.operand_exited(payload)),
                move || with(&on_close, AndInner::exit_completed),
            ));
        }
        inner.subscriptions.borrow_mut().extend(subscriptions);

        Self { inner }
    }

    /// A type-erased handle to this scope.
    #[must_use]
    pub fn shared(&self) -> SharedScope<P> {
        SharedScope::new(self.clone())
    }
}

fn with<P>(inner: &Weak<AndInner<P>>, f: impl FnOnce(&AndInner<P>)) {
    if let Some(inner) = inner.upgrade() {
        f(&inner);
    }
}

impl<P: Clone + 'static> AndInner<P> {
    fn operand(&self, operand: Operand) -> &SharedScope<P> {
        match operand {
            Operand::First => &self.first,
            Operand::Second => &self.second,
        }
    }

    fn operand_entered(&self, operand: Operand, payload: &P) {
        let other = match operand {
            Operand::First => &self.second,
            Operand::Second => &self.first,
        };
        if other.is_entered() && !self.entered.get() {
            self.entered.set(true);
            debug!("and scope entered");
            self.channels.emit_enter(payload.clone());
        }
    }

    fn operand_exited(&self, payload: &P) {
        if self.entered.get() {
            self.entered.set(false);
            debug!("and scope exited");
            self.channels.emit_exit(payload.clone());
        }
    }

    fn enter_completed(&self) {
        let done = self.enter_done.get() + 1;
        self.enter_done.set(done);
        if done == 2 {
            self.channels.enter.close();
        }
    }

    fn exit_completed(&self) {
        let done = self.exit_done.get() + 1;
        self.exit_done.set(done);
        if done == 2 {
            self.channels.exit.close();
        }
    }
}

impl<P: Clone + 'static> Scope<P> for AndScope<P> {
    fn is_entered(&self) -> bool {
        self.inner.entered.get()
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

    struct Fixture {
        left: SettableScope,
        right: SettableScope,
        and: SharedScope,
        enters: Rc<Cell<u32>>,
        exits: Rc<Cell<u32>>,
        _subs: Vec<Subscription>,
    }

    fn fixture(left_entered: bool, right_entered: bool) -> Fixture {
        let scheduler = Scheduler::new();
        let left = SettableScope::new(&scheduler, left_entered);
        let right = SettableScope::new(&scheduler, right_entered);
        let and = left.shared().and(&right.shared());
        let (enters, exits) = (Rc::new(Cell::new(0)), Rc::new(Cell::new(0)));
        let (observer, count) = (and.clone(), Rc::clone(&enters));
        let on_enter = and
            .on_enter()
            .listen(move |_: &()| {
                assert!(observer.is_entered());
                count.set(count.get() + 1);
            })
            .unwrap();
        let (observer, count) = (and.clone(), Rc::clone(&exits));
        let on_exit = and
            .on_exit()
            .listen(move |_: &()| {
                assert!(!observer.is_entered());
                count.set(count.get() + 1);
            })
            .unwrap();
        Fixture {
            left,
            right,
            and,
            enters,
            exits,
            _subs: vec![on_enter, on_exit],
        }
    }

    #[test]
    fn test_enters_once_when_second_operand_enters() {
        // Arrange
        let f = fixture(false, false);

        // Act
        f.left.enter(()).unwrap();
        assert!(!f.and.is_entered());
        f.right.enter(()).unwrap();

        // Assert
        assert!(f.and.is_entered());
        assert_eq!(f.enters.get(), 1);
    }

    #[test]
    fn test_exits_when_either_operand_exits() {
        let f = fixture(true, true);
        assert!(f.and.is_entered());

        f.right.exit(()).unwrap();
        f.left.exit(()).unwrap();

        assert!(!f.and.is_entered());
        assert_eq!(f.exits.get(), 1);
        assert_eq!(f.enters.get(), 0);
    }

    #[test]
    fn test_state_matches_operand_conjunction_through_sequence() {
        // Arrange
        let f = fixture(false, false);
        let steps: [(&SettableScope, bool); 6] = [
            (&f.left, true),
            (&f.right, true),
            (&f.left, false),
            (&f.left, true),
            (&f.right, false),
            (&f.right, true),
        ];

        // Act / Assert
        for (scope, enter) in steps {
            if enter {
                scope.enter(()).unwrap();
            } else {
                scope.exit(()).unwrap();
            }
            assert_eq!(
                f.and.is_entered(),
                f.left.is_entered() && f.right.is_entered()
            );
        }
        assert_eq!(f.enters.get(), 3);
        assert_eq!(f.exits.get(), 2);
    }

    #[test]
    fn test_channels_close_after_both_operands_close() {
        let f = fixture(false, false);

        f.left.close();
        assert!(!f.and.on_enter().is_closed());
        f.right.close();

        assert!(f.and.on_enter().is_closed());
        assert!(f.and.on_exit().is_closed());
    }

    #[test]
    fn test_dispose_releases_operand_listeners() {
        let f = fixture(false, false);
        assert_eq!(f.left.on_enter().listener_count(), 1);

        f.and.dispose();

        assert_eq!(f.left.on_enter().listener_count(), 0);
        assert_eq!(f.right.on_exit().listener_count(), 0);
    }
}
