//! Externally driven scopes.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use tracing::debug;

use crate::channel::EventStream;
use crate::error::ReactiveError;
use crate::scheduler::Scheduler;

use super::{Channels, Scope, SharedScope};

/// A scope entered and exited by explicit calls.
///
/// Pair it with an external timer to express time-bounded availability.
pub struct SettableScope<P = ()> {
    inner: Rc<SettableInner<P>>,
}

struct SettableInner<P> {
    entered: Cell<bool>,
    closed: Cell<bool>,
    channels: Channels<P>,
}

impl<P> Clone for SettableScope<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<P> fmt::Debug for SettableScope<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SettableScope")
            .field("entered", &self.inner.entered.get())
            .field("closed", &self.inner.closed.get())
            .finish()
    }
}

impl<P: Clone + 'static> SettableScope<P> {
    /// Creates an open scope in the given state.
    #[must_use]
    pub fn new(scheduler: &Scheduler, entered: bool) -> Self {
        Self {
            inner: Rc::new(SettableInner {
                entered: Cell::new(entered),
                closed: Cell::new(false),
                channels: Channels::new(scheduler, "settable.enter", "settable.exit"),
            }),
        }
    }

    /// Enters the scope and publishes `payload`. Returns `false` without
    /// publishing if the scope was already entered.
    ///
    /// # Errors
    ///
    /// Returns `ReactiveError::ScopeClosed` if the scope has been closed.
    pub fn enter(&self, payload: P) -> Result<bool, ReactiveError> {
        self.transition(true, payload)
    }

    /// Exits the scope and publishes `payload`. Returns `false` without
    /// publishing if the scope was not entered.
    ///
    /// # Errors
    ///
    /// Returns `ReactiveError::ScopeClosed` if the scope has been closed.
    pub fn exit(&self, payload: P) -> Result<bool, ReactiveError> {
        self.transition(false, payload)
    }

    /// Closes both channels. Later `enter`/`exit` calls fail.
    pub fn close(&self) {
        if !self.inner.closed.replace(true) {
            debug!("settable scope closed");
            self.inner.channels.close();
        }
    }

    /// Whether [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.get()
    }

    /// A type-erased handle to this scope.
    #[must_use]
    pub fn shared(&self) -> SharedScope<P> {
        SharedScope::new(self.clone())
    }

    fn transition(&self, enter: bool, payload: P) -> Result<bool, ReactiveError> {
        if self.inner.closed.get() {
            return Err(ReactiveError::ScopeClosed);
        }
        if self.inner.entered.get() == enter {
            return Ok(false);
        }
        self.inner.entered.set(enter);
        debug!(entered = enter, "settable scope transition");
        let channel = if enter {
            &self.inner.channels.enter
        } else {
            &self.inner.channels.exit
        };
        channel.publish(payload)?;
        Ok(true)
    }
}

impl<P: Clone + 'static> Scope<P> for SettableScope<P> {
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
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    #[test]
    fn test_enter_publishes_once_and_listener_sees_entered_state() {
        // Arrange
        let scheduler = Scheduler::new();
        let door = SettableScope::new(&scheduler, false);
        let observed = Rc::new(RefCell::new(Vec::new()));
        let (observer, sink) = (door.clone(), Rc::clone(&observed));
        let _sub = door
            .on_enter()
            .listen(move |who: &&str| sink.borrow_mut().push((*who, observer.is_entered())))
            .unwrap();

        // Act
        let first = door.enter("guard").unwrap();
        let second = door.enter("thief").unwrap();

        // Assert
        assert!(first);
        assert!(!second);
        assert_eq!(*observed.borrow(), vec![("guard", true)]);
    }

    #[test]
    fn test_exit_listener_sees_exited_state() {
        let scheduler = Scheduler::new();
        let door = SettableScope::new(&scheduler, true);
        let seen = Rc::new(Cell::new(true));
        let (observer, sink) = (door.clone(), Rc::clone(&seen));
        let _sub = door
            .on_exit()
            .listen(move |_: &()| sink.set(observer.is_entered()))
            .unwrap();

        assert!(door.exit(()).unwrap());

        assert!(!seen.get());
        assert!(!door.exit(()).unwrap());
    }

    #[test]
    fn test_closed_scope_rejects_transitions() {
        let scheduler = Scheduler::new();
        let door = SettableScope::<()>::new(&scheduler, false);

        door.close();

        assert_eq!(door.enter(()), Err(ReactiveError::ScopeClosed));
        assert_eq!(door.exit(()), Err(ReactiveError::ScopeClosed));
        assert!(door.on_enter().is_closed());
        assert!(door.on_exit().is_closed());
    }

    #[test]
    fn test_closing_from_enter_listener_still_notifies_later_listeners() {
        // Arrange
        let scheduler = Scheduler::new();
        let door = SettableScope::<()>::new(&scheduler, false);
        let log = Rc::new(RefCell::new(Vec::new()));
        let _closer = {
            let (door, log) = (door.clone(), Rc::clone(&log));
            door.on_enter()
                .listen(move |_: &()| {
                    log.borrow_mut().push("closer");
                    door.close();
                })
                .unwrap()
        };
        let _sync = {
            let log = Rc::clone(&log);
            door.on_enter()
                .listen(move |_: &()| log.borrow_mut().push("sync"))
                .unwrap()
        };
        let _deferred = {
            let log = Rc::clone(&log);
            door.on_enter()
                .listen_deferred(move |_: &()| log.borrow_mut().push("deferred"))
                .unwrap()
        };

        // Act
        door.enter(()).unwrap();
        scheduler.run_until_idle().unwrap();

        // Assert
        assert!(door.is_entered());
        assert!(door.is_closed());
        assert_eq!(*log.borrow(), vec!["closer", "sync", "deferred"]);
    }
}
